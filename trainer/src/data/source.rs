use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use flate2::read::GzDecoder;
use log::{debug, info};

use super::{
    InMemoryDataset,
    idx::{parse_images, parse_labels},
};
use crate::{Result, TrainErr};

/// The IDX datasets the driver knows how to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DatasetKind {
    #[default]
    FashionMnist,
    Mnist,
}

/// Which half of a dataset to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl DatasetKind {
    /// The directory name the dataset is cached under.
    pub fn name(self) -> &'static str {
        match self {
            DatasetKind::FashionMnist => "FashionMNIST",
            DatasetKind::Mnist => "MNIST",
        }
    }

    pub fn mirror(self) -> &'static str {
        match self {
            DatasetKind::FashionMnist => {
                "http://fashion-mnist.s3-website.eu-central-1.amazonaws.com/"
            }
            DatasetKind::Mnist => "https://ossci-datasets.s3.amazonaws.com/mnist/",
        }
    }
}

impl Split {
    /// The (images, labels) file names of this split.
    pub fn files(self) -> (&'static str, &'static str) {
        match self {
            Split::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
            Split::Test => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
        }
    }
}

/// Returns `<root>/<name>/raw`, where the dataset files are cached.
pub fn raw_dir(kind: DatasetKind, root: &Path) -> PathBuf {
    root.join(kind.name()).join("raw")
}

/// Loads one split of a dataset, downloading and decompressing what's missing from the cache.
///
/// # Arguments
/// * `kind` - The dataset to load.
/// * `root` - The data root directory.
/// * `split` - Which split to load.
///
/// # Returns
/// The dataset in memory, or an error if it can't be obtained or its files are malformed.
pub fn load(kind: DatasetKind, root: &Path, split: Split) -> Result<InMemoryDataset> {
    let dir = raw_dir(kind, root);
    let (images_file, labels_file) = split.files();

    let images_path = dir.join(images_file);
    let labels_path = dir.join(labels_file);

    let images = parse_images(&images_path, &fetch(kind, &dir, images_file)?)?;
    let labels = parse_labels(&labels_path, &fetch(kind, &dir, labels_file)?)?;

    if images.count != labels.len() {
        return Err(TrainErr::InvalidDataset {
            path: labels_path,
            detail: format!("{} labels for {} images", labels.len(), images.count),
        });
    }

    info!("loaded {} {split:?} samples of {}", labels.len(), kind.name());
    InMemoryDataset::new(images.pixels, labels, (images.rows, images.cols))
}

/// Returns the decompressed bytes of `file`, from the cache when possible.
fn fetch(kind: DatasetKind, dir: &Path, file: &str) -> Result<Vec<u8>> {
    let path = dir.join(file);
    if path.is_file() {
        debug!("cache hit for {}", path.display());
        return Ok(fs::read(path)?);
    }

    let gz_path = dir.join(format!("{file}.gz"));
    if !gz_path.is_file() {
        fs::create_dir_all(dir)?;
        let url = format!("{}{file}.gz", kind.mirror());
        download(&url, &gz_path)?;
    }

    let bytes = gunzip(&fs::read(&gz_path)?)?;
    fs::write(&path, &bytes)?;
    debug!("extracted {}", path.display());

    Ok(bytes)
}

fn download(url: &str, to: &Path) -> Result<()> {
    info!("downloading {url}");

    let download_err = |source| TrainErr::Download {
        url: url.to_string(),
        source,
    };

    let bytes = reqwest::blocking::get(url)
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.bytes())
        .map_err(download_err)?;

    fs::write(to, &bytes)?;
    Ok(())
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{Compression, write::GzEncoder};

    use super::*;
    use crate::data::idx::tests::{images_file, labels_file};

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn reads_the_raw_cache() {
        let root = tempfile::tempdir().unwrap();
        let dir = raw_dir(DatasetKind::FashionMnist, root.path());
        fs::create_dir_all(&dir).unwrap();

        fs::write(dir.join("t10k-images-idx3-ubyte"), images_file(2, 2, 2, &[255; 8])).unwrap();
        fs::write(dir.join("t10k-labels-idx1-ubyte"), labels_file(&[4, 7])).unwrap();

        let ds = load(DatasetKind::FashionMnist, root.path(), Split::Test).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.side(), (2, 2));
        assert_eq!(ds.labels(), [4, 7]);
        assert!(ds.images().iter().all(|&p| p == 1.0));
    }

    #[test]
    fn decompresses_cached_archives() {
        let root = tempfile::tempdir().unwrap();
        let dir = raw_dir(DatasetKind::Mnist, root.path());
        fs::create_dir_all(&dir).unwrap();

        fs::write(
            dir.join("train-images-idx3-ubyte.gz"),
            gzip(&images_file(1, 1, 1, &[0])),
        )
        .unwrap();
        fs::write(dir.join("train-labels-idx1-ubyte.gz"), gzip(&labels_file(&[2]))).unwrap();

        let ds = load(DatasetKind::Mnist, root.path(), Split::Train).unwrap();

        assert_eq!(ds.labels(), [2]);
        assert!(dir.join("train-images-idx3-ubyte").is_file());
    }

    #[test]
    fn count_mismatch_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let dir = raw_dir(DatasetKind::FashionMnist, root.path());
        fs::create_dir_all(&dir).unwrap();

        fs::write(dir.join("t10k-images-idx3-ubyte"), images_file(2, 1, 1, &[0, 0])).unwrap();
        fs::write(dir.join("t10k-labels-idx1-ubyte"), labels_file(&[1])).unwrap();

        assert!(matches!(
            load(DatasetKind::FashionMnist, root.path(), Split::Test),
            Err(TrainErr::InvalidDataset { .. })
        ));
    }
}
