use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::Result;

/// The file scalar events are appended to, inside the summary directory.
pub const SUMMARY_FILE: &str = "summaries.jsonl";

/// A single scalar summary record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarEvent {
    pub tag: String,
    pub step: usize,
    pub value: f32,
}

/// Appends scalar events as JSON lines to `<dir>/summaries.jsonl`.
///
/// Nothing touches the file system until the first event is written.
#[derive(Debug)]
pub struct SummaryWriter {
    dir: PathBuf,
    file: Option<BufWriter<File>>,
}

impl SummaryWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file: None,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    /// Appends one event and flushes it.
    ///
    /// # Arguments
    /// * `tag` - The name of the series.
    /// * `step` - The position of the value in the series.
    /// * `value` - The scalar itself.
    pub fn add_scalar(&mut self, tag: &str, step: usize, value: f32) -> Result<()> {
        let event = ScalarEvent {
            tag: tag.to_string(),
            step,
            value,
        };

        let file = match self.file.take() {
            Some(file) => file,
            None => self.open()?,
        };
        let file = self.file.insert(file);

        serde_json::to_writer(&mut *file, &event)?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    fn open(&self) -> Result<BufWriter<File>> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path();
        debug!("writing summaries to {}", path.display());

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }
}

/// Reads back every event of a summary file.
pub fn read_events(path: &Path) -> Result<Vec<ScalarEvent>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}
