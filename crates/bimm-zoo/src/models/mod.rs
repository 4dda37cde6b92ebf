//! # Zoo Models
//!
//! * [`architecture`] - config and module dispatch over the families below.
//! * [`convnet`] - plain conv stacks: `cnn1`, `cnn2`, `lenet`, `distillation`.
//! * [`resnet`] - CIFAR `ResNet-{20,32,44,56,110}`.
//! * [`densenet`] - `DenseNet-40-12`.
//! * [`input`] - input range and pre-filter options.
//! * [`classifier`] - the options-aware classifier wrapper.
//! * [`registry`] - the name table.

pub mod architecture;
pub mod classifier;
pub mod convnet;
pub mod densenet;
pub mod input;
pub mod registry;
pub mod resnet;
