//! # Architecture Dispatch
//!
//! [`ArchitectureConfig`] is the tagged union of the zoo's model configs,
//! and [`Network`] the matching union of initialized modules.

use crate::models::convnet::{ConvNet, ConvNetConfig};
use crate::models::densenet::{DenseNet, DenseNetConfig};
use crate::models::resnet::{CifarResNet, CifarResNetConfig};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::record::{FileRecorder, Recorder, RecorderError};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;

/// Architecture family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchitectureKind {
    /// [`ConvNet`]
    ConvNet,
    /// [`CifarResNet`]
    ResNet,
    /// [`DenseNet`]
    DenseNet,
}

/// Config for any zoo architecture.
#[derive(Config, Debug, PartialEq)]
pub enum ArchitectureConfig {
    /// A [`ConvNetConfig`].
    ConvNet(ConvNetConfig),
    /// A [`CifarResNetConfig`].
    ResNet(CifarResNetConfig),
    /// A [`DenseNetConfig`].
    DenseNet(DenseNetConfig),
}

impl From<ConvNetConfig> for ArchitectureConfig {
    fn from(config: ConvNetConfig) -> Self {
        Self::ConvNet(config)
    }
}

impl From<CifarResNetConfig> for ArchitectureConfig {
    fn from(config: CifarResNetConfig) -> Self {
        Self::ResNet(config)
    }
}

impl From<DenseNetConfig> for ArchitectureConfig {
    fn from(config: DenseNetConfig) -> Self {
        Self::DenseNet(config)
    }
}

impl ArchitectureConfig {
    /// The family tag.
    pub fn kind(&self) -> ArchitectureKind {
        match self {
            Self::ConvNet(_) => ArchitectureKind::ConvNet,
            Self::ResNet(_) => ArchitectureKind::ResNet,
            Self::DenseNet(_) => ArchitectureKind::DenseNet,
        }
    }

    /// Expected input channels.
    pub fn in_channels(&self) -> usize {
        match self {
            Self::ConvNet(config) => config.in_channels,
            Self::ResNet(config) => config.in_channels,
            Self::DenseNet(config) => config.in_channels,
        }
    }

    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        match self {
            Self::ConvNet(config) => config.num_classes,
            Self::ResNet(config) => config.num_classes,
            Self::DenseNet(config) => config.num_classes,
        }
    }

    /// Initialize a [`Network`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Network<B> {
        match self {
            Self::ConvNet(config) => Network::ConvNet(config.init(device)),
            Self::ResNet(config) => Network::ResNet(config.init(device)),
            Self::DenseNet(config) => Network::DenseNet(config.init(device)),
        }
    }
}

/// An initialized zoo network body.
///
/// Consumes ``[batch, channels, height, width]``, emits pre-softmax scores.
#[derive(Debug, Clone)]
pub enum Network<B: Backend> {
    /// A [`ConvNet`].
    ConvNet(ConvNet<B>),
    /// A [`CifarResNet`].
    ResNet(CifarResNet<B>),
    /// A [`DenseNet`].
    DenseNet(DenseNet<B>),
}

impl<B: Backend> Network<B> {
    /// The family tag.
    pub fn kind(&self) -> ArchitectureKind {
        match self {
            Self::ConvNet(_) => ArchitectureKind::ConvNet,
            Self::ResNet(_) => ArchitectureKind::ResNet,
            Self::DenseNet(_) => ArchitectureKind::DenseNet,
        }
    }

    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        match self {
            Self::ConvNet(model) => model.forward(input),
            Self::ResNet(model) => model.forward(input),
            Self::DenseNet(model) => model.forward(input),
        }
    }

    /// Number of parameters.
    pub fn num_params(&self) -> usize {
        match self {
            Self::ConvNet(model) => model.num_params(),
            Self::ResNet(model) => model.num_params(),
            Self::DenseNet(model) => model.num_params(),
        }
    }

    /// Load a record file into the network.
    ///
    /// A record whose structure does not match the network is a
    /// [`RecorderError::DeserializeError`], not a panic.
    pub fn load_file<R: FileRecorder<B>>(
        self,
        path: PathBuf,
        recorder: &R,
        device: &B::Device,
    ) -> Result<Self, RecorderError> {
        Ok(match self {
            Self::ConvNet(model) => Self::ConvNet(load_module_file(model, path, recorder, device)?),
            Self::ResNet(model) => Self::ResNet(load_module_file(model, path, recorder, device)?),
            Self::DenseNet(model) => {
                Self::DenseNet(load_module_file(model, path, recorder, device)?)
            }
        })
    }

    /// Save the network to a record file.
    pub fn save_file<R: FileRecorder<B>>(
        &self,
        path: PathBuf,
        recorder: &R,
    ) -> Result<(), RecorderError> {
        match self {
            Self::ConvNet(model) => model.clone().save_file(path, recorder),
            Self::ResNet(model) => model.clone().save_file(path, recorder),
            Self::DenseNet(model) => model.clone().save_file(path, recorder),
        }
    }
}

/// Load a record file into a module, checking the record fits it.
///
/// burn asserts on structural mismatches (such as layer counts) while
/// applying a record; those are caught and reported as errors, as are
/// records whose parameter shapes change the module's size.
pub fn load_module_file<B: Backend, M: Module<B>, R: FileRecorder<B>>(
    module: M,
    path: PathBuf,
    recorder: &R,
    device: &B::Device,
) -> Result<M, RecorderError> {
    let record = recorder.load::<M::Record>(path, device)?;

    let expected_params = module.num_params();
    let loaded = catch_unwind(AssertUnwindSafe(|| module.load_record(record))).map_err(|panic| {
        let message = panic
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| panic.downcast_ref::<&str>().copied())
            .unwrap_or("record does not match the module");
        RecorderError::DeserializeError(message.to_string())
    })?;

    if loaded.num_params() != expected_params {
        return Err(RecorderError::DeserializeError(format!(
            "record holds {} parameters, module expects {expected_params}",
            loaded.num_params()
        )));
    }
    Ok(loaded)
}
