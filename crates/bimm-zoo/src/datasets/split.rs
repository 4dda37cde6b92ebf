//! # Dataset Splits

use serde::{Deserialize, Serialize};

/// A named partition of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cifar10Split {
    /// The full training partition.
    Train,
    /// A prefix of the training partition.
    Validation,
    /// The held-out test partition.
    Test,
}

impl Cifar10Split {
    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Validation => "val",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for Cifar10Split {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
