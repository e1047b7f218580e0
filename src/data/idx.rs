//! IDX binary reader for MNIST label and image files.
//!
//! ## Format
//!
//! All header integers are big-endian `u32`:
//! ```text
//! labels: [magic 2049] [count]                 [count × u8]
//! images: [magic 2051] [count] [rows] [cols]   [count × rows × cols × u8]
//! ```
//! Pixels are binarized on load: any non-zero byte becomes `1.0`.

use ndarray::Array2;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use super::{PatternSet, MAX_PATTERNS};
use crate::core::{RbmError, MNIST_PIXELS};

/// Magic number of an IDX label file.
pub const LABEL_MAGIC: u32 = 2049;
/// Magic number of an IDX image file.
pub const IMAGE_MAGIC: u32 = 2051;

const PROGRESS_EVERY: usize = 800;

/// Errors raised while loading a dataset. All of them are fatal.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{file} file has wrong magic number: {found} (should be {expected})")]
    BadMagic {
        file: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("{file} file ended early")]
    Truncated { file: &'static str },

    #[error("images are {rows}x{cols}, expected {expected} pixels")]
    ImageSize {
        rows: usize,
        cols: usize,
        expected: usize,
    },

    #[error("label file holds {labels} records but image file holds {images}")]
    CountMismatch { labels: usize, images: usize },

    #[error("pattern set: {0}")]
    Pattern(#[from] RbmError),
}

/// Binarized images read from an IDX file.
#[derive(Debug, Clone)]
pub struct IdxImages {
    pub rows: usize,
    pub cols: usize,
    /// Count declared in the header (may exceed the rows read)
    pub declared: usize,
    /// Shape (num_read, rows × cols), values in {0.0, 1.0}
    pub pixels: Array2<f64>,
}

fn read_exact_or_truncated<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    file: &'static str,
) -> Result<(), DataError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => DataError::Truncated { file },
        _ => DataError::Io(e),
    })
}

fn read_u32<R: Read>(reader: &mut R, file: &'static str) -> Result<u32, DataError> {
    let mut buf = [0u8; 4];
    read_exact_or_truncated(reader, &mut buf, file)?;
    Ok(u32::from_be_bytes(buf))
}

fn check_magic<R: Read>(reader: &mut R, file: &'static str, expected: u32) -> Result<(), DataError> {
    let found = read_u32(reader, file)?;
    if found != expected {
        return Err(DataError::BadMagic {
            file,
            expected,
            found,
        });
    }
    Ok(())
}

/// Read up to `max` labels from an IDX label stream.
///
/// Returns the labels read and the count declared in the header. The buffer
/// grows with the bytes actually present, so a lying header cannot force a
/// large allocation.
///
/// # Errors
/// - `BadMagic` if the stream does not start with 2049
/// - `Truncated` if fewer bytes follow than the header promises
pub fn read_labels<R: Read>(mut reader: R, max: usize) -> Result<(Vec<u8>, usize), DataError> {
    check_magic(&mut reader, "Label", LABEL_MAGIC)?;
    let declared = read_u32(&mut reader, "Label")? as usize;

    let count = declared.min(max);
    let mut labels = Vec::new();
    reader.by_ref().take(count as u64).read_to_end(&mut labels)?;
    if labels.len() < count {
        return Err(DataError::Truncated { file: "Label" });
    }
    Ok((labels, declared))
}

/// Read up to `max` binarized images of exactly `pixels` pixels each.
///
/// The header dimensions are checked before any pixel storage is allocated.
///
/// # Errors
/// - `BadMagic` if the stream does not start with 2051
/// - `ImageSize` if `rows × cols` differs from `pixels`
/// - `Truncated` if an image record is cut short
pub fn read_images<R: Read>(mut reader: R, max: usize, pixels: usize) -> Result<IdxImages, DataError> {
    check_magic(&mut reader, "Image", IMAGE_MAGIC)?;
    let declared = read_u32(&mut reader, "Image")? as usize;
    let rows = read_u32(&mut reader, "Image")? as usize;
    let cols = read_u32(&mut reader, "Image")? as usize;

    if rows.checked_mul(cols) != Some(pixels) {
        return Err(DataError::ImageSize {
            rows,
            cols,
            expected: pixels,
        });
    }

    let count = declared.min(max);
    let mut flat: Vec<f64> = Vec::with_capacity(count.min(MAX_PATTERNS) * pixels);
    let mut record = vec![0u8; pixels];
    let start = Instant::now();

    for n in 0..count {
        read_exact_or_truncated(&mut reader, &mut record, "Image")?;
        flat.extend(record.iter().map(|&byte| if byte > 0 { 1.0 } else { 0.0 }));

        let done = n + 1;
        if done % PROGRESS_EVERY == 0 {
            debug!(
                read = done,
                declared,
                elapsed_secs = start.elapsed().as_secs_f32(),
                "reading images"
            );
        }
    }

    let pixels = Array2::from_shape_vec((count, pixels), flat)
        .map_err(|e| RbmError::InvalidConfig(format!("image matrix: {e}")))?;
    Ok(IdxImages {
        rows,
        cols,
        declared,
        pixels,
    })
}

fn open(path: &Path) -> Result<BufReader<File>, DataError> {
    Ok(BufReader::new(File::open(path)?))
}

/// Load an MNIST label/image file pair into a [`PatternSet`].
///
/// Keeps at most `max_patterns` records, capped at [`MAX_PATTERNS`]
/// before anything is read.
///
/// # Errors
/// - any [`DataError`]; the core must not run on a set that failed to load
pub fn load_mnist(
    labels_path: &Path,
    images_path: &Path,
    max_patterns: usize,
) -> Result<PatternSet, DataError> {
    let start = Instant::now();
    let max_patterns = max_patterns.min(MAX_PATTERNS);
    let (labels, declared_labels) = read_labels(open(labels_path)?, max_patterns)?;
    let images = read_images(open(images_path)?, max_patterns, MNIST_PIXELS)?;

    if declared_labels != images.declared {
        return Err(DataError::CountMismatch {
            labels: declared_labels,
            images: images.declared,
        });
    }

    let labels = labels.into_iter().map(i32::from).collect();
    let set = PatternSet::new(labels, images.pixels)?;
    info!(
        samples = set.len(),
        elapsed_secs = start.elapsed().as_secs_f32(),
        "loaded MNIST patterns"
    );
    Ok(set)
}
