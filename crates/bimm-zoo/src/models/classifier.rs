//! # Zoo Classifier
//!
//! A [`Classifier`] wraps a [`Network`] body with the input adaptation
//! stage and the output activation:
//!
//! ``[batch, h, w, c] -> to [0, 1] -> pre_filter -> [batch, c, h, w] -> body -> (softmax)``

use crate::error::Error;
use crate::models::architecture::{ArchitectureConfig, ArchitectureKind, Network};
use crate::models::input::{ClassifierOptions, InputRangeType, PreFilter};
use crate::weights::WeightsRecorder;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Int, Tensor};
use burn::tensor::activation::softmax;
use std::path::Path;

/// A constructed zoo classifier.
#[derive(Debug, Clone)]
pub struct Classifier<B: Backend> {
    name: String,
    config: ArchitectureConfig,
    network: Network<B>,
    logits: bool,
    input_range: InputRangeType,
    pre_filter: PreFilter<B>,
}

impl<B: Backend> Classifier<B> {
    /// Initialize a classifier with fresh weights.
    pub fn new(
        name: &str,
        config: ArchitectureConfig,
        options: ClassifierOptions<B>,
        device: &B::Device,
    ) -> Self {
        let network = config.init(device);
        Self {
            name: name.to_string(),
            config,
            network,
            logits: options.logits,
            input_range: options.input_range,
            pre_filter: options.pre_filter,
        }
    }

    /// The zoo name this classifier was built for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The architecture config.
    pub fn config(&self) -> &ArchitectureConfig {
        &self.config
    }

    /// The architecture family.
    pub fn architecture(&self) -> ArchitectureKind {
        self.network.kind()
    }

    /// The network body.
    pub fn network(&self) -> &Network<B> {
        &self.network
    }

    /// Does `forward` return pre-softmax scores?
    pub fn logits(&self) -> bool {
        self.logits
    }

    /// The declared input range.
    pub fn input_range(&self) -> InputRangeType {
        self.input_range
    }

    /// Is a non-identity pre-filter installed?
    pub fn has_pre_filter(&self) -> bool {
        !self.pre_filter.is_identity()
    }

    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        self.config.num_classes()
    }

    /// Number of parameters.
    pub fn num_params(&self) -> usize {
        self.network.num_params()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `images`: ``[batch, height, width, channels]``, in [`Self::input_range`].
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``; probabilities, or scores when [`Self::logits`].
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let [batch] = unpack_shape_contract!(
            ["batch", "height", "width", "channels"],
            &images,
            &["batch"],
            &[("channels", self.config.in_channels())]
        );

        let x = self.input_range.to_unit_range(images);
        let x = self.pre_filter.apply(x);
        let x = x.permute([0, 3, 1, 2]);

        let x = self.network.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes())]
        );

        if self.logits { x } else { softmax(x, 1) }
    }

    /// Predicted class per image.
    ///
    /// ``[batch, height, width, channels] -> [batch]``
    pub fn predict_classes(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 1, Int> {
        self.forward(images).argmax(1).squeeze::<1>(1)
    }

    /// Load weights into the network body.
    pub fn load_weights(
        self,
        path: &Path,
        device: &B::Device,
    ) -> Result<Self, Error> {
        let load_error = |reason: String| Error::WeightsLoad {
            path: path.to_path_buf(),
            reason,
        };
        if !path.is_file() {
            return Err(load_error("file not found".to_string()));
        }

        let network = self
            .network
            .load_file(path.to_path_buf(), &WeightsRecorder::new(), device)
            .map_err(|err| load_error(format!("{err:?}")))?;

        Ok(Self { network, ..self })
    }

    /// Save the network body's weights.
    pub fn save_weights(
        &self,
        path: &Path,
    ) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.network
            .save_file(path.to_path_buf(), &WeightsRecorder::new())
            .map_err(|err| Error::WeightsSave {
                path: path.to_path_buf(),
                reason: format!("{err:?}"),
            })
    }
}
