//! Pattern storage and dataset loading.
//!
//! ## Submodules
//!
//! - [`idx`] — IDX (MNIST) label and image file reader

pub mod idx;

pub use idx::{load_mnist, read_images, read_labels, DataError, IdxImages};

use ndarray::{Array2, ArrayView1};

use crate::core::{RbmError, RbmResult};

/// Upper bound on patterns kept in memory.
pub const MAX_PATTERNS: usize = 1000;

/// Labelled binary images, aligned by index.
///
/// Read-only once built. Labels are kept signed so out-of-range values from
/// a caller survive intact; the training loop decides what to do with them.
#[derive(Debug, Clone)]
pub struct PatternSet {
    labels: Vec<i32>,
    /// Shape (num_patterns, pixels_per_image)
    images: Array2<f64>,
}

impl PatternSet {
    /// Build from parallel arrays, truncating to [`MAX_PATTERNS`].
    ///
    /// # Errors
    /// - `DimensionMismatch` if label and image counts differ
    pub fn new(mut labels: Vec<i32>, images: Array2<f64>) -> RbmResult<Self> {
        if labels.len() != images.nrows() {
            return Err(RbmError::DimensionMismatch {
                what: "pattern labels",
                expected: images.nrows(),
                actual: labels.len(),
            });
        }

        let keep = labels.len().min(MAX_PATTERNS);
        labels.truncate(keep);
        let images = images.slice(ndarray::s![..keep, ..]).to_owned();
        Ok(Self { labels, images })
    }

    /// Build from one `Vec` per image.
    ///
    /// # Errors
    /// - `DimensionMismatch` if rows differ in length or counts differ
    pub fn from_rows(labels: Vec<i32>, rows: &[Vec<f64>]) -> RbmResult<Self> {
        let width = rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(RbmError::DimensionMismatch {
                    what: "image row",
                    expected: width,
                    actual: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        let images = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|e| RbmError::InvalidConfig(format!("image matrix: {e}")))?;
        Self::new(labels, images)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Pixels per image.
    #[must_use]
    pub fn image_dim(&self) -> usize {
        self.images.ncols()
    }

    #[must_use]
    pub fn label(&self, index: usize) -> i32 {
        self.labels[index]
    }

    #[must_use]
    pub fn image(&self, index: usize) -> ArrayView1<'_, f64> {
        self.images.row(index)
    }

    #[must_use]
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    #[must_use]
    pub fn images(&self) -> &Array2<f64> {
        &self.images
    }
}
