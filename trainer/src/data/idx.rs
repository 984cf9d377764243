//! Readers for the big-endian IDX files the MNIST family ships in.

use std::path::Path;

use crate::{Result, TrainErr};

pub const IMAGES_MAGIC: u32 = 0x0000_0803;
pub const LABELS_MAGIC: u32 = 0x0000_0801;

/// The decoded content of an IDX images file.
#[derive(Debug, Clone, PartialEq)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    /// Pixels scaled to `[0, 1]`.
    pub pixels: Vec<f32>,
}

/// Decodes an images file, scaling every pixel by `1 / 255`.
///
/// # Arguments
/// * `path` - Where the bytes came from, only used for error reporting.
/// * `bytes` - The raw file content.
pub fn parse_images(path: &Path, bytes: &[u8]) -> Result<IdxImages> {
    let header = read_header(path, bytes, IMAGES_MAGIC, 3)?;
    let (count, rows, cols) = (header[0], header[1], header[2]);
    let body = &bytes[16..];

    let expected = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .ok_or_else(|| {
            invalid(
                path,
                format!("header dimensions {count}x{rows}x{cols} overflow"),
            )
        })?;
    if body.len() != expected {
        return Err(invalid(
            path,
            format!("expected {expected} pixel bytes, found {}", body.len()),
        ));
    }

    let pixels = body.iter().map(|&p| p as f32 / 255.).collect();
    Ok(IdxImages {
        count,
        rows,
        cols,
        pixels,
    })
}

/// Decodes a labels file.
pub fn parse_labels(path: &Path, bytes: &[u8]) -> Result<Vec<usize>> {
    let header = read_header(path, bytes, LABELS_MAGIC, 1)?;
    let body = &bytes[8..];

    if body.len() != header[0] {
        return Err(invalid(
            path,
            format!("expected {} labels, found {}", header[0], body.len()),
        ));
    }

    Ok(body.iter().map(|&l| l as usize).collect())
}

/// Reads the magic number followed by `dims` big-endian dimension sizes.
fn read_header(path: &Path, bytes: &[u8], magic: u32, dims: usize) -> Result<Vec<usize>> {
    let header_len = 4 * (dims + 1);
    if bytes.len() < header_len {
        return Err(invalid(path, format!("truncated header, {} bytes", bytes.len())));
    }

    let mut words = bytes[..header_len]
        .chunks_exact(4)
        .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]));

    let found = words.next().unwrap_or_default();
    if found != magic {
        return Err(invalid(
            path,
            format!("bad magic number {found:#06x}, expected {magic:#06x}"),
        ));
    }

    Ok(words.map(|w| w as usize).collect())
}

fn invalid(path: &Path, detail: String) -> TrainErr {
    TrainErr::InvalidDataset {
        path: path.to_path_buf(),
        detail,
    }
}
