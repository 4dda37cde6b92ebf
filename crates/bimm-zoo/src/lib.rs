#![warn(missing_docs)]
//!# bimm-zoo - Burn Image Model Zoo
//!
//! CIFAR-10 loading and pretrained classifier resolution.
//!
//! ## Notable Components
//!
//! * [`datasets`] - dataset loaders.
//!   * [`datasets::cifar10::Cifar10Dataset`] - CIFAR-10 splits and `load_model_by_name`.
//! * [`models`] - classifier families.
//!   * [`models::classifier::Classifier`] - input adaptation, body, softmax.
//!   * [`models::registry::CIFAR10_MODEL_REGISTRY`] - the model name table.
//! * [`weights`] - weights-path resolution and record format.
//! * [`cache`] - download cache.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod cache;
pub mod datasets;
pub mod error;
pub mod models;
pub mod weights;

pub use error::Error;
