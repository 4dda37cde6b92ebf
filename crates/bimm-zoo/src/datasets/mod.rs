//! # Datasets
//!
//! * [`cifar10`] - the CIFAR-10 loader and model resolver.
//! * [`encoders`] - label encoders.
//! * [`split`] - split names.

pub mod cifar10;
pub mod encoders;
pub mod split;
