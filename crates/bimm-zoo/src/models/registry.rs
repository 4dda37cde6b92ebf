//! # Model Registry
//!
//! A closed table from symbolic model name to construction and
//! weights-path policy.
//!
//! There is a `N:1` relationship between names and constructors:
//! `cnn2` and `cnn2_adv_trained` build the same network, and differ
//! only in the weights file they load.
//!
//! Constructors come in two flavors:
//! * [`ModelConstructor::Adaptive`] honors the caller's [`ClassifierOptions`].
//! * [`ModelConstructor::Fixed`] always builds with the default options.

use crate::error::Error;
use crate::models::architecture::ArchitectureConfig;
use crate::models::classifier::Classifier;
use crate::models::convnet::ConvNetConfig;
use crate::models::densenet::DenseNetConfig;
use crate::models::input::ClassifierOptions;
use crate::models::resnet::CifarResNetConfig;
use crate::weights::WeightsPathStrategy;
use burn::prelude::Backend;
use std::path::{Path, PathBuf};

/// Builder function for an [`ArchitectureConfig`].
pub type ConstructorFn = fn() -> ArchitectureConfig;

/// How a registry entry constructs its classifier.
#[derive(Debug, Clone, Copy)]
pub enum ModelConstructor {
    /// Takes `{logits, input_range, pre_filter}` from the caller.
    Adaptive(ConstructorFn),

    /// Takes no parameters; caller options are ignored.
    Fixed(ConstructorFn),
}

impl ModelConstructor {
    /// Does this constructor use the caller's options?
    pub fn honors_options(&self) -> bool {
        matches!(self, Self::Adaptive(_))
    }

    /// Build the architecture config.
    pub fn config(&self) -> ArchitectureConfig {
        match self {
            Self::Adaptive(builder) | Self::Fixed(builder) => builder(),
        }
    }

    /// Construct a classifier with fresh weights.
    pub fn construct<B: Backend>(
        &self,
        name: &str,
        options: ClassifierOptions<B>,
        device: &B::Device,
    ) -> Classifier<B> {
        let options = match self {
            Self::Adaptive(_) => options,
            Self::Fixed(_) => {
                log::debug!("{name} has a fixed constructor; ignoring {options:?}");
                ClassifierOptions::default()
            }
        };
        Classifier::new(name, self.config(), options, device)
    }
}

/// A registered zoo model.
#[derive(Debug)]
pub struct StaticModelEntry {
    /// Symbolic name.
    pub name: &'static str,

    /// Description of the model.
    pub description: &'static str,

    /// Construction policy.
    pub constructor: ModelConstructor,

    /// Weights path policy.
    pub weights: WeightsPathStrategy,
}

impl StaticModelEntry {
    /// Resolve this entry's weights path.
    pub fn weights_path(
        &self,
        weights_dir: &Path,
        dataset_name: &str,
    ) -> PathBuf {
        self.weights.resolve(weights_dir, dataset_name, self.name)
    }

    /// Construct the classifier, then load its weights.
    pub fn load<B: Backend>(
        &self,
        dataset_name: &str,
        weights_dir: &Path,
        options: ClassifierOptions<B>,
        device: &B::Device,
    ) -> Result<Classifier<B>, Error> {
        let weights_path = self.weights_path(weights_dir, dataset_name);

        let model = self.constructor.construct(self.name, options, device);
        log::info!(
            "Defined {} model graph: {} parameters.",
            self.name,
            model.num_params()
        );

        let model = model.load_weights(&weights_path, device)?;
        log::info!(
            "Loaded {dataset_name}-{} model from {}.",
            self.name,
            weights_path.display()
        );

        Ok(model)
    }
}

/// A closed set of [`StaticModelEntry`]s for one dataset.
#[derive(Debug)]
pub struct StaticModelRegistry {
    /// The dataset the entries are trained on.
    pub dataset_name: &'static str,

    /// The entries.
    pub items: &'static [&'static StaticModelEntry],
}

impl StaticModelRegistry {
    /// Registered names, in table order.
    pub fn names(&self) -> Vec<&'static str> {
        self.items.iter().map(|entry| entry.name).collect()
    }

    /// Lookup an entry by name.
    pub fn lookup_by_name(
        &self,
        name: &str,
    ) -> Option<&'static StaticModelEntry> {
        self.items.iter().copied().find(|entry| entry.name == name)
    }

    /// Lookup an entry by name.
    ///
    /// Fails with [`Error::UnsupportedModel`] naming `name` and the dataset.
    pub fn try_lookup_by_name(
        &self,
        name: &str,
    ) -> Result<&'static StaticModelEntry, Error> {
        self.lookup_by_name(name)
            .ok_or_else(|| Error::UnsupportedModel {
                model: name.to_string(),
                dataset: self.dataset_name.to_string(),
            })
    }

    /// Resolve the weights path for a name, without constructing anything.
    pub fn resolve_weights_path(
        &self,
        name: &str,
        weights_dir: &Path,
    ) -> Result<PathBuf, Error> {
        Ok(self
            .try_lookup_by_name(name)?
            .weights_path(weights_dir, self.dataset_name))
    }

    /// Construct and load a model by name.
    pub fn load_model<B: Backend>(
        &self,
        name: &str,
        weights_dir: &Path,
        options: ClassifierOptions<B>,
        device: &B::Device,
    ) -> Result<Classifier<B>, Error> {
        self.try_lookup_by_name(name)?
            .load(self.dataset_name, weights_dir, options, device)
    }
}

/// The CIFAR-10 class count.
const CLASSES: usize = 10;

/// The CIFAR-10 model zoo.
pub static CIFAR10_MODEL_REGISTRY: StaticModelRegistry = StaticModelRegistry {
    dataset_name: "CIFAR-10",
    items: &[
        &StaticModelEntry {
            name: "cnn2",
            description: "Two-stage 64/128 CNN with a 256-256 dense head",
            constructor: ModelConstructor::Adaptive(|| ConvNetConfig::cnn2(CLASSES).into()),
            weights: WeightsPathStrategy::PerModel,
        },
        &StaticModelEntry {
            name: "cnn2_adv_trained",
            description: "cnn2, adversarially trained",
            constructor: ModelConstructor::Adaptive(|| ConvNetConfig::cnn2(CLASSES).into()),
            weights: WeightsPathStrategy::PerModel,
        },
        &StaticModelEntry {
            name: "cnn1",
            description: "Two-stage 32/64 CNN with a 512 dense head",
            constructor: ModelConstructor::Adaptive(|| ConvNetConfig::cnn1(CLASSES).into()),
            weights: WeightsPathStrategy::PerModel,
        },
        &StaticModelEntry {
            name: "densenet",
            description: "DenseNet-40-12",
            constructor: ModelConstructor::Adaptive(|| {
                DenseNetConfig::densenet40_12(CLASSES).into()
            }),
            weights: WeightsPathStrategy::SharedDenseNet,
        },
        &StaticModelEntry {
            name: "resnet20",
            description: "ResNet-20",
            constructor: ModelConstructor::Fixed(|| CifarResNetConfig::resnet20(CLASSES).into()),
            weights: WeightsPathStrategy::PerModel,
        },
        &StaticModelEntry {
            name: "resnet32",
            description: "ResNet-32",
            constructor: ModelConstructor::Fixed(|| CifarResNetConfig::resnet32(CLASSES).into()),
            weights: WeightsPathStrategy::PerModel,
        },
        &StaticModelEntry {
            name: "resnet44",
            description: "ResNet-44",
            constructor: ModelConstructor::Fixed(|| CifarResNetConfig::resnet44(CLASSES).into()),
            weights: WeightsPathStrategy::PerModel,
        },
        &StaticModelEntry {
            name: "resnet56",
            description: "ResNet-56",
            constructor: ModelConstructor::Fixed(|| CifarResNetConfig::resnet56(CLASSES).into()),
            weights: WeightsPathStrategy::PerModel,
        },
        &StaticModelEntry {
            name: "resnet110",
            description: "ResNet-110",
            constructor: ModelConstructor::Fixed(|| {
                CifarResNetConfig::resnet110(CLASSES).into()
            }),
            weights: WeightsPathStrategy::PerModel,
        },
        &StaticModelEntry {
            name: "lenet",
            description: "LeNet-5 style CNN",
            constructor: ModelConstructor::Adaptive(|| ConvNetConfig::lenet(CLASSES).into()),
            weights: WeightsPathStrategy::PerModel,
        },
        &StaticModelEntry {
            name: "distillation",
            description: "Defensively distilled cnn2-geometry student",
            constructor: ModelConstructor::Fixed(|| {
                ConvNetConfig::distillation(CLASSES).into()
            }),
            weights: WeightsPathStrategy::PerModel,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::architecture::ArchitectureKind;
    use crate::models::input::{InputRangeType, PreFilter};
    use burn::backend::NdArray;
    use hamcrest::prelude::*;

    type B = NdArray<f32>;

    #[test]
    fn test_closed_name_set() {
        assert_eq!(
            CIFAR10_MODEL_REGISTRY.names(),
            vec![
                "cnn2",
                "cnn2_adv_trained",
                "cnn1",
                "densenet",
                "resnet20",
                "resnet32",
                "resnet44",
                "resnet56",
                "resnet110",
                "lenet",
                "distillation",
            ]
        );
        for name in CIFAR10_MODEL_REGISTRY.names() {
            assert_that!(CIFAR10_MODEL_REGISTRY.lookup_by_name(name).is_some(), is(equal_to(true)));
        }
    }

    #[test]
    fn test_unsupported_model() {
        let err = CIFAR10_MODEL_REGISTRY
            .try_lookup_by_name("bogus_name")
            .unwrap_err();
        match &err {
            Error::UnsupportedModel { model, dataset } => {
                assert_eq!(model, "bogus_name");
                assert_eq!(dataset, "CIFAR-10");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "Undefined model [bogus_name] for CIFAR-10.");
    }

    #[test]
    fn test_cnn2_variants_share_a_constructor() {
        let plain = CIFAR10_MODEL_REGISTRY.lookup_by_name("cnn2").unwrap();
        let adv = CIFAR10_MODEL_REGISTRY
            .lookup_by_name("cnn2_adv_trained")
            .unwrap();
        assert_eq!(plain.constructor.config(), adv.constructor.config());

        let dir = Path::new("w");
        assert_eq!(
            plain.weights_path(dir, "CIFAR-10"),
            PathBuf::from("w/CIFAR-10_cnn2.mpk")
        );
        assert_eq!(
            adv.weights_path(dir, "CIFAR-10"),
            PathBuf::from("w/CIFAR-10_cnn2_adv_trained.mpk")
        );
    }

    #[test]
    fn test_weights_strategies() {
        for entry in CIFAR10_MODEL_REGISTRY.items {
            let expected = if entry.name == "densenet" {
                WeightsPathStrategy::SharedDenseNet
            } else {
                WeightsPathStrategy::PerModel
            };
            assert_eq!(entry.weights, expected, "{}", entry.name);
        }
        assert_eq!(
            CIFAR10_MODEL_REGISTRY
                .resolve_weights_path("densenet", Path::new("w"))
                .unwrap(),
            PathBuf::from("w/DenseNet-40-12-CIFAR-10.mpk")
        );
    }

    #[test]
    fn test_fixed_constructors() {
        let fixed: Vec<&str> = CIFAR10_MODEL_REGISTRY
            .items
            .iter()
            .filter(|entry| !entry.constructor.honors_options())
            .map(|entry| entry.name)
            .collect();
        assert_eq!(
            fixed,
            vec![
                "resnet20",
                "resnet32",
                "resnet44",
                "resnet56",
                "resnet110",
                "distillation"
            ]
        );
    }

    #[test]
    fn test_fixed_constructor_ignores_options() {
        let device = Default::default();
        let entry = CIFAR10_MODEL_REGISTRY.lookup_by_name("resnet20").unwrap();

        let plain: Classifier<B> =
            entry
                .constructor
                .construct(entry.name, ClassifierOptions::default(), &device);
        let custom: Classifier<B> = entry.constructor.construct(
            entry.name,
            ClassifierOptions::default()
                .with_logits(true)
                .with_input_range(InputRangeType::Symmetric)
                .with_pre_filter(PreFilter::new(|x| x.mul_scalar(0.0))),
            &device,
        );

        for model in [&plain, &custom] {
            assert_eq!(model.architecture(), ArchitectureKind::ResNet);
            assert!(!model.logits());
            assert_eq!(model.input_range(), InputRangeType::ZeroOne);
            assert!(!model.has_pre_filter());
        }
        assert_eq!(plain.config(), custom.config());
        assert_eq!(plain.num_params(), custom.num_params());
    }

    #[test]
    fn test_adaptive_constructor_honors_options() {
        let device = Default::default();
        let entry = CIFAR10_MODEL_REGISTRY.lookup_by_name("lenet").unwrap();

        let model: Classifier<B> = entry.constructor.construct(
            entry.name,
            ClassifierOptions::default()
                .with_logits(true)
                .with_input_range(InputRangeType::CenteredHalf)
                .with_pre_filter(PreFilter::new(|x| x)),
            &device,
        );
        assert!(model.logits());
        assert_eq!(model.input_range(), InputRangeType::CenteredHalf);
        assert!(model.has_pre_filter());
    }

    #[test]
    fn test_load_model_missing_weights_reports_path() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();

        let err = CIFAR10_MODEL_REGISTRY
            .load_model::<B>("lenet", dir.path(), ClassifierOptions::default(), &device)
            .unwrap_err();
        match err {
            Error::WeightsLoad { path, .. } => {
                assert_eq!(path, dir.path().join("CIFAR-10_lenet.mpk"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_model_stale_weights_from_other_depth() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();

        let resnet20 = CIFAR10_MODEL_REGISTRY.lookup_by_name("resnet20").unwrap();
        let path = CIFAR10_MODEL_REGISTRY
            .resolve_weights_path("resnet32", dir.path())
            .unwrap();
        resnet20
            .constructor
            .construct::<B>(resnet20.name, ClassifierOptions::default(), &device)
            .save_weights(&path)
            .unwrap();

        let err = CIFAR10_MODEL_REGISTRY
            .load_model::<B>("resnet32", dir.path(), ClassifierOptions::default(), &device)
            .unwrap_err();
        match err {
            Error::WeightsLoad { path: attempted, .. } => assert_eq!(attempted, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
