//! # Plain Convolutional Classifiers
//!
//! [`ConvNet`] is a stack of conv stages (``conv+relu ... -> maxpool -> dropout``)
//! followed by a dense head. The `cnn1`, `cnn2`, `lenet` and `distillation`
//! zoo entries are all [`ConvNetConfig`] presets.
//!
//! [`ConvNetConfig`] implements [`Config`], and provides
//! [`ConvNetConfig::init`] to initialize a [`ConvNet`].
//!
//! [`ConvNet`] implements [`Module`], and provides
//! [`ConvNet::forward`].

use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation::relu;

/// A single conv layer in a [`ConvStageConfig`].
#[derive(Config, Debug, PartialEq)]
pub struct ConvLayerConfig {
    /// Output channels.
    pub out_channels: usize,

    /// Square kernel size.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// Pad to preserve resolution; otherwise no padding.
    #[config(default = false)]
    pub same_padding: bool,
}

impl ConvLayerConfig {
    /// Output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: usize,
    ) -> usize {
        if self.same_padding {
            input_resolution
        } else {
            input_resolution + 1 - self.kernel_size
        }
    }
}

/// A run of conv layers closed by a ``2x2`` max pool and dropout.
#[derive(Config, Debug, PartialEq)]
pub struct ConvStageConfig {
    /// The conv layers.
    pub layers: Vec<ConvLayerConfig>,

    /// Dropout probability after the pool.
    #[config(default = 0.0)]
    pub dropout: f64,
}

/// [`ConvNet`] Config.
#[derive(Config, Debug, PartialEq)]
pub struct ConvNetConfig {
    /// Conv stages.
    pub stages: Vec<ConvStageConfig>,

    /// Hidden dense layer widths.
    pub hidden: Vec<usize>,

    /// Number of classification classes.
    pub num_classes: usize,

    /// Dropout probability after each hidden dense layer.
    #[config(default = 0.0)]
    pub hidden_dropout: f64,

    /// Input channels.
    #[config(default = 3)]
    pub in_channels: usize,

    /// Square input resolution.
    #[config(default = 32)]
    pub image_size: usize,
}

impl ConvNetConfig {
    /// The `cnn1` preset.
    ///
    /// ``[32 same, 32] -> pool -> [64 same, 64] -> pool -> 512 -> classes``
    pub fn cnn1(num_classes: usize) -> Self {
        Self::new(
            vec![
                ConvStageConfig::new(vec![
                    ConvLayerConfig::new(32).with_same_padding(true),
                    ConvLayerConfig::new(32),
                ])
                .with_dropout(0.25),
                ConvStageConfig::new(vec![
                    ConvLayerConfig::new(64).with_same_padding(true),
                    ConvLayerConfig::new(64),
                ])
                .with_dropout(0.25),
            ],
            vec![512],
            num_classes,
        )
        .with_hidden_dropout(0.5)
    }

    /// The `cnn2` preset.
    ///
    /// ``[64, 64] -> pool -> [128, 128] -> pool -> 256 -> 256 -> classes``
    pub fn cnn2(num_classes: usize) -> Self {
        Self::new(
            vec![
                ConvStageConfig::new(vec![ConvLayerConfig::new(64), ConvLayerConfig::new(64)]),
                ConvStageConfig::new(vec![ConvLayerConfig::new(128), ConvLayerConfig::new(128)]),
            ],
            vec![256, 256],
            num_classes,
        )
        .with_hidden_dropout(0.5)
    }

    /// The `lenet` preset.
    ///
    /// ``[6 5x5] -> pool -> [16 5x5] -> pool -> 120 -> 84 -> classes``
    pub fn lenet(num_classes: usize) -> Self {
        Self::new(
            vec![
                ConvStageConfig::new(vec![ConvLayerConfig::new(6).with_kernel_size(5)]),
                ConvStageConfig::new(vec![ConvLayerConfig::new(16).with_kernel_size(5)]),
            ],
            vec![120, 84],
            num_classes,
        )
    }

    /// The `distillation` preset.
    ///
    /// The distilled student shares the `cnn2` geometry.
    pub fn distillation(num_classes: usize) -> Self {
        Self::cnn2(num_classes)
    }

    /// Spatial resolution after the last stage.
    ///
    /// # Panics
    ///
    /// If a valid-padded kernel is larger than its input.
    pub fn feature_resolution(&self) -> usize {
        self.stages.iter().fold(self.image_size, |size, stage| {
            let size = stage.layers.iter().fold(size, |size, layer| {
                assert!(
                    layer.same_padding || layer.kernel_size <= size,
                    "kernel {} does not fit resolution {}",
                    layer.kernel_size,
                    size
                );
                layer.output_resolution(size)
            });
            size / 2
        })
    }

    /// Channels after the last stage.
    pub fn feature_channels(&self) -> usize {
        self.stages
            .iter()
            .flat_map(|stage| stage.layers.last())
            .last()
            .map(|layer| layer.out_channels)
            .unwrap_or(self.in_channels)
    }

    /// Flattened feature width entering the dense head.
    pub fn feature_size(&self) -> usize {
        let resolution = self.feature_resolution();
        self.feature_channels() * resolution * resolution
    }

    /// Initialize a [`ConvNet`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConvNet<B> {
        let mut in_channels = self.in_channels;
        let stages = self
            .stages
            .iter()
            .map(|stage| {
                let convs = stage
                    .layers
                    .iter()
                    .map(|layer| {
                        let padding = if layer.same_padding {
                            let pad = layer.kernel_size / 2;
                            PaddingConfig2d::Explicit(pad, pad)
                        } else {
                            PaddingConfig2d::Valid
                        };
                        let conv = Conv2dConfig::new(
                            [in_channels, layer.out_channels],
                            [layer.kernel_size, layer.kernel_size],
                        )
                        .with_padding(padding)
                        .init(device);
                        in_channels = layer.out_channels;
                        conv
                    })
                    .collect();

                ConvStage {
                    convs,
                    pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
                    dropout: DropoutConfig::new(stage.dropout).init(),
                }
            })
            .collect();

        let mut width = self.feature_size();
        let hidden = self
            .hidden
            .iter()
            .map(|&out| {
                let linear = LinearConfig::new(width, out).init(device);
                width = out;
                linear
            })
            .collect();

        ConvNet {
            in_channels: self.in_channels,
            num_classes: self.num_classes,
            stages,
            hidden,
            hidden_dropout: DropoutConfig::new(self.hidden_dropout).init(),
            output: LinearConfig::new(width, self.num_classes).init(device),
        }
    }
}

/// One conv stage of a [`ConvNet`].
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    /// Conv layers, each followed by a relu.
    pub convs: Vec<Conv2d<B>>,

    /// Closing pool.
    pub pool: MaxPool2d,

    /// Post-pool dropout.
    pub dropout: Dropout,
}

impl<B: Backend> ConvStage<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self
            .convs
            .iter()
            .fold(input, |x, conv| relu(conv.forward(x)));
        let x = self.pool.forward(x);
        self.dropout.forward(x)
    }
}

/// Plain convolutional classifier.
#[derive(Module, Debug)]
pub struct ConvNet<B: Backend> {
    /// Input channels.
    pub in_channels: usize,

    /// Output classes.
    pub num_classes: usize,

    /// Conv stages.
    pub stages: Vec<ConvStage<B>>,

    /// Hidden dense layers, each followed by a relu.
    pub hidden: Vec<Linear<B>>,

    /// Dropout after each hidden layer.
    pub hidden_dropout: Dropout,

    /// Class score layer.
    pub output: Linear<B>,
}

impl<B: Backend> ConvNet<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` pre-softmax scores.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels)]
        );

        let x = self
            .stages
            .iter()
            .fold(input, |x, stage| stage.forward(x));

        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.hidden.iter().fold(x, |x, linear| {
            self.hidden_dropout.forward(relu(linear.forward(x)))
        });
        let x = self.output.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes)]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_preset_geometry() {
        assert_eq!(ConvNetConfig::cnn1(10).feature_resolution(), 6);
        assert_eq!(ConvNetConfig::cnn1(10).feature_size(), 64 * 6 * 6);

        assert_eq!(ConvNetConfig::cnn2(10).feature_resolution(), 5);
        assert_eq!(ConvNetConfig::cnn2(10).feature_size(), 128 * 5 * 5);

        assert_eq!(ConvNetConfig::lenet(10).feature_size(), 16 * 5 * 5);

        assert_eq!(ConvNetConfig::distillation(10), ConvNetConfig::cnn2(10));
    }

    #[test]
    #[should_panic(expected = "does not fit resolution")]
    fn test_kernel_too_large() {
        ConvNetConfig::lenet(10).with_image_size(8).feature_resolution();
    }

    #[test]
    fn test_lenet_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ConvNet<B> = ConvNetConfig::lenet(10).init(&device);
        let input = Tensor::ones([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "classes"],
            &output,
            &[("batch", 2), ("classes", 10)]
        );
    }

    #[test]
    fn test_small_same_padded_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = ConvNetConfig::new(
            vec![ConvStageConfig::new(vec![
                ConvLayerConfig::new(4).with_same_padding(true),
            ])],
            vec![8],
            3,
        )
        .with_image_size(8);
        assert_eq!(config.feature_size(), 4 * 4 * 4);

        let model: ConvNet<B> = config.init(&device);
        let output = model.forward(Tensor::ones([1, 3, 8, 8], &device));
        assert_eq!(output.dims(), [1, 3]);
    }
}
