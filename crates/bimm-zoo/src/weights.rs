//! # Pretrained Weights Paths
//!
//! Weight files are burn named-msgpack records:
//! ``<weights_dir>/<dataset>_<model>.mpk`` by default,
//! with `densenet` sharing one file per dataset.

use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use std::path::{Path, PathBuf};

/// Default directory holding pretrained weights.
pub const DEFAULT_WEIGHTS_DIR: &str = "downloads/trained_models";

/// Weight file extension.
pub const WEIGHTS_EXTENSION: &str = "mpk";

/// The recorder used for all zoo weights.
pub type WeightsRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// How a registry entry resolves its weights path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightsPathStrategy {
    /// ``<weights_dir>/<dataset>_<model>.mpk``
    PerModel,

    /// [`densenet_weights_path`]; keyed on the dataset only.
    SharedDenseNet,
}

impl WeightsPathStrategy {
    /// Resolve the weights path.
    pub fn resolve(
        &self,
        weights_dir: &Path,
        dataset_name: &str,
        model_name: &str,
    ) -> PathBuf {
        match self {
            Self::PerModel => model_weights_path(weights_dir, dataset_name, model_name),
            Self::SharedDenseNet => densenet_weights_path(weights_dir, dataset_name),
        }
    }
}

/// The generic per-model weights path.
pub fn model_weights_path(
    weights_dir: &Path,
    dataset_name: &str,
    model_name: &str,
) -> PathBuf {
    weights_dir.join(format!("{dataset_name}_{model_name}.{WEIGHTS_EXTENSION}"))
}

/// The shared `DenseNet-40-12` weights path for a dataset.
pub fn densenet_weights_path(
    weights_dir: &Path,
    dataset_name: &str,
) -> PathBuf {
    weights_dir.join(format!("DenseNet-40-12-{dataset_name}.{WEIGHTS_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_model_path() {
        let dir = Path::new(DEFAULT_WEIGHTS_DIR);
        assert_eq!(
            WeightsPathStrategy::PerModel.resolve(dir, "CIFAR-10", "cnn2"),
            PathBuf::from("downloads/trained_models/CIFAR-10_cnn2.mpk")
        );
        assert_eq!(
            WeightsPathStrategy::PerModel.resolve(dir, "CIFAR-10", "cnn2_adv_trained"),
            PathBuf::from("downloads/trained_models/CIFAR-10_cnn2_adv_trained.mpk")
        );
    }

    #[test]
    fn test_shared_densenet_path_ignores_model_name() {
        let dir = Path::new("weights");
        let a = WeightsPathStrategy::SharedDenseNet.resolve(dir, "CIFAR-10", "densenet");
        let b = WeightsPathStrategy::SharedDenseNet.resolve(dir, "CIFAR-10", "anything");
        assert_eq!(a, b);
        assert_eq!(a, densenet_weights_path(dir, "CIFAR-10"));
        assert_eq!(a, PathBuf::from("weights/DenseNet-40-12-CIFAR-10.mpk"));
    }
}
