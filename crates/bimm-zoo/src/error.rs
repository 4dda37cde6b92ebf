//! # Zoo Errors

use std::path::PathBuf;

/// Errors raised while loading datasets or resolving models.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested model name is not registered for the dataset.
    #[error("Undefined model [{model}] for {dataset}.")]
    UnsupportedModel {
        /// The offending model name.
        model: String,
        /// The dataset the lookup was made against.
        dataset: String,
    },

    /// The weights file could not be found, read, or decoded.
    #[error("failed to load weights from '{}': {reason}", path.display())]
    WeightsLoad {
        /// The path that was attempted.
        path: PathBuf,
        /// The recorder's failure description.
        reason: String,
    },

    /// The weights file could not be written.
    #[error("failed to save weights to '{}': {reason}", path.display())]
    WeightsSave {
        /// The path that was attempted.
        path: PathBuf,
        /// The recorder's failure description.
        reason: String,
    },

    /// An input range code outside of `{1, 2, 3}`.
    #[error("invalid input range type: {0}")]
    InvalidInputRange(u8),

    /// A dataset batch file is not a whole number of records.
    #[error(
        "corrupt batch file '{}': {len} bytes is not a multiple of the {record_size} byte record size",
        path.display()
    )]
    CorruptBatch {
        /// The batch file.
        path: PathBuf,
        /// The file length.
        len: usize,
        /// The expected record size.
        record_size: usize,
    },

    /// A label byte outside of `[0, num_classes)`.
    #[error("label {label} out of range for {num_classes} classes")]
    LabelOutOfRange {
        /// The label value.
        label: usize,
        /// The class count.
        num_classes: usize,
    },

    /// No home directory to root the disk cache in.
    #[error("unable to locate the home directory")]
    HomeDirNotFound,

    /// The dataset archive is malformed.
    #[error("archive error: {0}")]
    Archive(String),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
