//! # `DenseNet`
//!
//! The CIFAR `DenseNet` (default: `DenseNet-40-12`): a ``3x3`` stem,
//! three dense blocks joined by ``1x1`` transitions with average pooling,
//! then a final norm, global pooling and a linear head.

use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, AvgPool2d, AvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation::relu;

/// [`DenseNet`] Config.
#[derive(Config, Debug, PartialEq)]
pub struct DenseNetConfig {
    /// Number of classification classes.
    pub num_classes: usize,

    /// Total depth; must be ``3n+4``.
    #[config(default = 40)]
    pub depth: usize,

    /// Channels added by each dense layer.
    #[config(default = 12)]
    pub growth_rate: usize,

    /// Stem output channels.
    #[config(default = 16)]
    pub initial_filters: usize,

    /// Input channels.
    #[config(default = 3)]
    pub in_channels: usize,
}

impl DenseNetConfig {
    /// `DenseNet-40-12`.
    pub fn densenet40_12(num_classes: usize) -> Self {
        Self::new(num_classes)
    }

    /// Dense layers in each of the three blocks.
    ///
    /// # Panics
    ///
    /// If `depth` is not ``3n+4``.
    pub fn layers_per_block(&self) -> usize {
        assert!(
            self.depth > 4 && (self.depth - 4) % 3 == 0,
            "DenseNet depth must be 3n+4, got {}",
            self.depth
        );
        (self.depth - 4) / 3
    }

    /// Channels entering the head.
    pub fn feature_channels(&self) -> usize {
        self.initial_filters + 3 * self.layers_per_block() * self.growth_rate
    }

    /// Initialize a [`DenseNet`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> DenseNet<B> {
        let n = self.layers_per_block();

        let mut channels = self.initial_filters;
        let mut blocks = Vec::with_capacity(3);
        let mut transitions = Vec::with_capacity(2);
        for idx in 0..3 {
            let layers = (0..n)
                .map(|_| {
                    let layer = DenseLayerConfig::new(channels, self.growth_rate).init(device);
                    channels += self.growth_rate;
                    layer
                })
                .collect();
            blocks.push(DenseBlock { layers });

            if idx < 2 {
                transitions.push(TransitionConfig::new(channels).init(device));
            }
        }

        DenseNet {
            in_channels: self.in_channels,
            num_classes: self.num_classes,
            stem: Conv2dConfig::new([self.in_channels, self.initial_filters], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device),
            blocks,
            transitions,
            norm: BatchNormConfig::new(channels).init(device),
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(channels, self.num_classes).init(device),
        }
    }
}

/// [`DenseLayer`] Config.
#[derive(Config, Debug)]
pub struct DenseLayerConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Channels added by the layer.
    pub growth_rate: usize,
}

impl DenseLayerConfig {
    /// Channels after concatenation.
    pub fn out_channels(&self) -> usize {
        self.in_channels + self.growth_rate
    }

    /// Initialize a [`DenseLayer`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> DenseLayer<B> {
        DenseLayer {
            norm: BatchNormConfig::new(self.in_channels).init(device),
            conv: Conv2dConfig::new([self.in_channels, self.growth_rate], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device),
        }
    }
}

/// ``BN -> relu -> 3x3 conv``, concatenated onto its input.
#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    /// Pre-activation norm.
    pub norm: BatchNorm<B, 2>,

    /// Growth conv.
    pub conv: Conv2d<B>,
}

impl<B: Backend> DenseLayer<B> {
    /// Forward Pass.
    ///
    /// ``[batch, c, h, w] -> [batch, c + growth_rate, h, w]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.conv.forward(relu(self.norm.forward(input.clone())));
        Tensor::cat(vec![input, x], 1)
    }
}

/// A run of [`DenseLayer`]s.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    /// The layers.
    pub layers: Vec<DenseLayer<B>>,
}

impl<B: Backend> DenseBlock<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.layers.iter().fold(input, |x, layer| layer.forward(x))
    }
}

/// [`Transition`] Config.
#[derive(Config, Debug)]
pub struct TransitionConfig {
    /// Channels in and out.
    pub channels: usize,
}

impl TransitionConfig {
    /// Initialize a [`Transition`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Transition<B> {
        Transition {
            norm: BatchNormConfig::new(self.channels).init(device),
            conv: Conv2dConfig::new([self.channels, self.channels], [1, 1])
                .with_bias(false)
                .init(device),
            pool: AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

/// ``BN -> relu -> 1x1 conv -> 2x2 avg pool``.
#[derive(Module, Debug)]
pub struct Transition<B: Backend> {
    /// Pre-activation norm.
    pub norm: BatchNorm<B, 2>,

    /// Channel-preserving conv.
    pub conv: Conv2d<B>,

    /// Downsample.
    pub pool: AvgPool2d,
}

impl<B: Backend> Transition<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.conv.forward(relu(self.norm.forward(input)));
        self.pool.forward(x)
    }
}

/// CIFAR `DenseNet` model.
#[derive(Module, Debug)]
pub struct DenseNet<B: Backend> {
    /// Input channels.
    pub in_channels: usize,

    /// Output classes.
    pub num_classes: usize,

    /// Stem conv.
    pub stem: Conv2d<B>,

    /// Dense blocks.
    pub blocks: Vec<DenseBlock<B>>,

    /// Transitions between consecutive blocks.
    pub transitions: Vec<Transition<B>>,

    /// Final norm.
    pub norm: BatchNorm<B, 2>,

    /// Global pool.
    pub avgpool: AdaptiveAvgPool2d,

    /// Class score layer.
    pub fc: Linear<B>,
}

impl<B: Backend> DenseNet<B> {
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

        let mut x = self.stem.forward(input);
        for (idx, block) in self.blocks.iter().enumerate() {
            x = block.forward(x);
            if let Some(transition) = self.transitions.get(idx) {
                x = transition.forward(x);
            }
        }

        let x = relu(self.norm.forward(x));
        let x = self.avgpool.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.fc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes)]
        );

        x
    }
}
