//! # Classifier Input Adaptation
//!
//! Classifiers are trained on ``[0, 1]`` pixels.
//! [`InputRangeType`] declares the range a caller will feed in,
//! and the classifier maps it back to ``[0, 1]`` before applying
//! the optional [`PreFilter`].

use crate::error::Error;
use burn::prelude::{Backend, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// The numeric range a classifier expects its pixel inputs in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputRangeType {
    /// ``[0, 1]``
    #[default]
    ZeroOne = 1,

    /// ``[-0.5, 0.5]``
    CenteredHalf = 2,

    /// ``[-1, 1]``
    Symmetric = 3,
}

impl InputRangeType {
    /// Parse the numeric range code.
    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            1 => Ok(Self::ZeroOne),
            2 => Ok(Self::CenteredHalf),
            3 => Ok(Self::Symmetric),
            _ => Err(Error::InvalidInputRange(code)),
        }
    }

    /// The numeric range code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The ``(low, high)`` bounds of the range.
    pub fn bounds(self) -> (f32, f32) {
        match self {
            Self::ZeroOne => (0.0, 1.0),
            Self::CenteredHalf => (-0.5, 0.5),
            Self::Symmetric => (-1.0, 1.0),
        }
    }

    /// Map a tensor in this range onto ``[0, 1]``.
    pub fn to_unit_range<B: Backend, const D: usize>(
        self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Self::ZeroOne => input,
            Self::CenteredHalf => input.add_scalar(0.5),
            Self::Symmetric => input.add_scalar(1.0).div_scalar(2.0),
        }
    }
}

impl TryFrom<u8> for InputRangeType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

/// Signature of a [`PreFilter`] transform.
pub type PreFilterFn<B> = dyn Fn(Tensor<B, 4>) -> Tensor<B, 4> + Send + Sync;

/// An optional transform applied to ``[batch, height, width, channels]``
/// inputs before the network body.
pub struct PreFilter<B: Backend> {
    filter: Option<Arc<PreFilterFn<B>>>,
}

impl<B: Backend> PreFilter<B> {
    /// The identity filter.
    pub fn identity() -> Self {
        Self { filter: None }
    }

    /// Wrap a transform.
    pub fn new<F>(filter: F) -> Self
    where
        F: Fn(Tensor<B, 4>) -> Tensor<B, 4> + Send + Sync + 'static,
    {
        Self {
            filter: Some(Arc::new(filter)),
        }
    }

    /// Is this the identity filter?
    pub fn is_identity(&self) -> bool {
        self.filter.is_none()
    }

    /// Apply the filter.
    pub fn apply(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match &self.filter {
            Some(filter) => filter(input),
            None => input,
        }
    }
}

impl<B: Backend> Clone for PreFilter<B> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
        }
    }
}

impl<B: Backend> Default for PreFilter<B> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<B: Backend> Debug for PreFilter<B> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self.filter {
            Some(_) => f.write_str("PreFilter(<fn>)"),
            None => f.write_str("PreFilter(identity)"),
        }
    }
}

/// Construction options for an adaptive classifier.
#[derive(Debug)]
pub struct ClassifierOptions<B: Backend> {
    /// Return pre-softmax scores instead of probabilities.
    pub logits: bool,

    /// The input range the caller will feed in.
    pub input_range: InputRangeType,

    /// Transform applied after range adaptation.
    pub pre_filter: PreFilter<B>,
}

impl<B: Backend> Default for ClassifierOptions<B> {
    fn default() -> Self {
        Self {
            logits: false,
            input_range: InputRangeType::default(),
            pre_filter: PreFilter::identity(),
        }
    }
}

impl<B: Backend> Clone for ClassifierOptions<B> {
    fn clone(&self) -> Self {
        Self {
            logits: self.logits,
            input_range: self.input_range,
            pre_filter: self.pre_filter.clone(),
        }
    }
}

impl<B: Backend> ClassifierOptions<B> {
    /// Set `logits`.
    pub fn with_logits(
        self,
        logits: bool,
    ) -> Self {
        Self { logits, ..self }
    }

    /// Set `input_range`.
    pub fn with_input_range(
        self,
        input_range: InputRangeType,
    ) -> Self {
        Self {
            input_range,
            ..self
        }
    }

    /// Set `pre_filter`.
    pub fn with_pre_filter(
        self,
        pre_filter: PreFilter<B>,
    ) -> Self {
        Self { pre_filter, ..self }
    }
}
