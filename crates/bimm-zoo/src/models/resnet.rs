//! # CIFAR `ResNet`
//!
//! The ``6n+2`` layer `ResNet` family for ``32x32`` inputs:
//! a ``3x3`` stem, three stages of `n` [`ResidualBlock`]s at
//! ``16``, ``32`` and ``64`` planes, then global pooling and a linear head.
//!
//! [`CifarResNetConfig`] implements [`Config`], and provides
//! [`CifarResNetConfig::init`] to initialize a [`CifarResNet`].

use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation::relu;

/// `ResNet-20` depth.
pub const RESNET20_DEPTH: usize = 20;
/// `ResNet-32` depth.
pub const RESNET32_DEPTH: usize = 32;
/// `ResNet-44` depth.
pub const RESNET44_DEPTH: usize = 44;
/// `ResNet-56` depth.
pub const RESNET56_DEPTH: usize = 56;
/// `ResNet-110` depth.
pub const RESNET110_DEPTH: usize = 110;

/// [`ConvNorm`] Config.
///
/// A bias-free ``3x3`` conv with unit padding, followed by a norm.
#[derive(Config, Debug)]
pub struct ConvNormConfig {
    /// Input planes.
    pub in_planes: usize,

    /// Output planes.
    pub out_planes: usize,

    /// Conv stride.
    #[config(default = 1)]
    pub stride: usize,
}

impl ConvNormConfig {
    /// Initialize a [`ConvNorm`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConvNorm<B> {
        ConvNorm {
            conv: Conv2dConfig::new([self.in_planes, self.out_planes], [3, 3])
                .with_stride([self.stride, self.stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device),
            norm: BatchNormConfig::new(self.out_planes).init(device),
        }
    }
}

/// ``Conv2d + BatchNorm`` block.
#[derive(Module, Debug)]
pub struct ConvNorm<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm Layer.
    pub norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvNorm<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.norm.forward(self.conv.forward(input))
    }
}

/// [`ResidualBlock`] Config.
#[derive(Config, Debug)]
pub struct ResidualBlockConfig {
    /// Input planes.
    pub in_planes: usize,

    /// Output planes.
    pub out_planes: usize,

    /// Stride of the first conv.
    #[config(default = 1)]
    pub stride: usize,
}

impl ResidualBlockConfig {
    /// Does the residual need a ``1x1`` projection?
    pub fn needs_shortcut(&self) -> bool {
        self.stride != 1 || self.in_planes != self.out_planes
    }

    /// Initialize a [`ResidualBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualBlock<B> {
        let shortcut = self.needs_shortcut().then(|| {
            Conv2dConfig::new([self.in_planes, self.out_planes], [1, 1])
                .with_stride([self.stride, self.stride])
                .init(device)
        });

        ResidualBlock {
            in_planes: self.in_planes,
            out_planes: self.out_planes,
            stride: self.stride,
            cn1: ConvNormConfig::new(self.in_planes, self.out_planes)
                .with_stride(self.stride)
                .init(device),
            cn2: ConvNormConfig::new(self.out_planes, self.out_planes).init(device),
            shortcut,
        }
    }
}

/// Two-conv residual block.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    /// Input planes.
    pub in_planes: usize,

    /// Output planes.
    pub out_planes: usize,

    /// Stride of the first conv.
    pub stride: usize,

    /// First Conv/Norm.
    pub cn1: ConvNorm<B>,

    /// Second Conv/Norm.
    pub cn2: ConvNorm<B>,

    /// ``1x1`` projection for the residual, when the shape changes.
    pub shortcut: Option<Conv2d<B>>,
}

impl<B: Backend> ResidualBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, out_height, out_width] = unpack_shape_contract!(
            [
                "batch",
                "in_planes",
                "in_height" = "out_height" * "stride",
                "in_width" = "out_width" * "stride"
            ],
            &input,
            &["batch", "out_height", "out_width"],
            &[("in_planes", self.in_planes), ("stride", self.stride)],
        );

        let identity = match &self.shortcut {
            Some(shortcut) => shortcut.forward(input.clone()),
            None => input.clone(),
        };

        let x = relu(self.cn1.forward(input));
        let x = relu(self.cn2.forward(x) + identity);

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes),
                ("out_height", out_height),
                ("out_width", out_width),
            ]
        );

        x
    }
}

/// [`CifarResNet`] Config.
#[derive(Config, Debug, PartialEq)]
pub struct CifarResNetConfig {
    /// Total layer depth; must be ``6n+2``.
    pub depth: usize,

    /// Number of classification classes.
    pub num_classes: usize,

    /// Planes of the stem and first stage.
    #[config(default = 16)]
    pub stem_width: usize,

    /// Input channels.
    #[config(default = 3)]
    pub in_channels: usize,
}

impl CifarResNetConfig {
    /// `ResNet-20`.
    pub fn resnet20(num_classes: usize) -> Self {
        Self::new(RESNET20_DEPTH, num_classes)
    }

    /// `ResNet-32`.
    pub fn resnet32(num_classes: usize) -> Self {
        Self::new(RESNET32_DEPTH, num_classes)
    }

    /// `ResNet-44`.
    pub fn resnet44(num_classes: usize) -> Self {
        Self::new(RESNET44_DEPTH, num_classes)
    }

    /// `ResNet-56`.
    pub fn resnet56(num_classes: usize) -> Self {
        Self::new(RESNET56_DEPTH, num_classes)
    }

    /// `ResNet-110`.
    pub fn resnet110(num_classes: usize) -> Self {
        Self::new(RESNET110_DEPTH, num_classes)
    }

    /// Residual blocks per stage.
    ///
    /// # Panics
    ///
    /// If `depth` is not ``6n+2``.
    pub fn blocks_per_stage(&self) -> usize {
        assert!(
            self.depth >= 8 && (self.depth - 2) % 6 == 0,
            "CifarResNet depth must be 6n+2, got {}",
            self.depth
        );
        (self.depth - 2) / 6
    }

    /// Initialize a [`CifarResNet`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> CifarResNet<B> {
        let n = self.blocks_per_stage();

        let mut blocks = Vec::with_capacity(3 * n);
        let mut in_planes = self.stem_width;
        for stage in 0..3 {
            let out_planes = self.stem_width << stage;
            for idx in 0..n {
                let stride = if stage > 0 && idx == 0 { 2 } else { 1 };
                blocks.push(
                    ResidualBlockConfig::new(in_planes, out_planes)
                        .with_stride(stride)
                        .init(device),
                );
                in_planes = out_planes;
            }
        }

        CifarResNet {
            in_channels: self.in_channels,
            num_classes: self.num_classes,
            stem: ConvNormConfig::new(self.in_channels, self.stem_width).init(device),
            blocks,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(in_planes, self.num_classes).init(device),
        }
    }
}

/// CIFAR `ResNet` model.
#[derive(Module, Debug)]
pub struct CifarResNet<B: Backend> {
    /// Input channels.
    pub in_channels: usize,

    /// Output classes.
    pub num_classes: usize,

    /// Stem Conv/Norm.
    pub stem: ConvNorm<B>,

    /// Residual blocks, all three stages in order.
    pub blocks: Vec<ResidualBlock<B>>,

    /// Global pool.
    pub avgpool: AdaptiveAvgPool2d,

    /// Class score layer.
    pub fc: Linear<B>,
}

impl<B: Backend> CifarResNet<B> {
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

        let x = relu(self.stem.forward(input));
        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));

        let x = self.avgpool.forward(x);
        // Reshape [B, C, 1, 1] -> [B, C]
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

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::{Autodiff, NdArray};

    #[test]
    fn test_depths() {
        assert_eq!(CifarResNetConfig::resnet20(10).blocks_per_stage(), 3);
        assert_eq!(CifarResNetConfig::resnet32(10).blocks_per_stage(), 5);
        assert_eq!(CifarResNetConfig::resnet44(10).blocks_per_stage(), 7);
        assert_eq!(CifarResNetConfig::resnet56(10).blocks_per_stage(), 9);
        assert_eq!(CifarResNetConfig::resnet110(10).blocks_per_stage(), 18);
    }

    #[test]
    #[should_panic(expected = "CifarResNet depth must be 6n+2, got 21")]
    fn test_bad_depth() {
        CifarResNetConfig::new(21, 10).blocks_per_stage();
    }

    #[test]
    fn test_residual_block_downsample() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let block: ResidualBlock<B> = ResidualBlockConfig::new(4, 8).with_stride(2).init(&device);
        assert!(block.shortcut.is_some());

        let output = block.forward(Tensor::ones([2, 4, 8, 8], &device));
        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_planes", 8),
                ("out_height", 4),
                ("out_width", 4)
            ],
        );

        let config = ResidualBlockConfig::new(4, 4);
        assert!(!config.needs_shortcut());
        let block: ResidualBlock<B> = config.init(&device);
        assert!(block.shortcut.is_none());
    }

    #[test]
    fn test_resnet_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: CifarResNet<B> = CifarResNetConfig::new(8, 10)
            .with_stem_width(4)
            .init(&device);
        assert_eq!(model.blocks.len(), 3);
        assert_eq!(model.blocks[2].out_planes, 16);

        let output = model.forward(Tensor::ones([2, 3, 32, 32], &device));
        assert_eq!(output.dims(), [2, 10]);
    }
}
