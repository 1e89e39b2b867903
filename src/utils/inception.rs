//! Inception-v2 style network assembly.
//!
//! The network is a stem, three stages of inception modules separated by two
//! grid reductions, and a pooled linear classifier. Every block states the
//! channel count it expects; assembly fails with `Error::Architecture` when
//! that disagrees with what the previous block produces or when a kernel
//! no longer fits the feature map.

use crate::utils::concat::BranchConcat;
use crate::utils::conv2d::Conv2d;
use crate::utils::dropout::Dropout;
use crate::utils::error::{Error, Result};
use crate::utils::head::SoftMaxCrossEntropy;
use crate::utils::linear::LinearLayer;
use crate::utils::misc::SeedRng;
use crate::utils::network::Network;
use crate::utils::nn_trait::Layer;
use crate::utils::pad::ZeroPad2d;
use crate::utils::pool::{AvgPool2d, GlobalAvgPool, MaxPool2d};
use crate::utils::relu::ReluLayer;
use crate::utils::sequential::Sequential;
use crate::utils::shape::Shape;
use serde::{Deserialize, Serialize};

/// Filters of one inception module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InceptionConfig {
    pub input_channels: usize,
    /// 1x1 branch.
    pub b1: usize,
    /// 1x1 reduce then 3x3.
    pub b2_reduce: usize,
    pub b2: usize,
    /// 1x1 reduce then two stacked 3x3.
    pub b3_reduce: usize,
    pub b3_mid: usize,
    pub b3: usize,
    /// 3x3 average pool then 1x1 projection.
    pub pool_proj: usize,
}

impl InceptionConfig {
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        input_channels: usize,
        b1: usize,
        b2_reduce: usize,
        b2: usize,
        b3_reduce: usize,
        b3_mid: usize,
        b3: usize,
        pool_proj: usize,
    ) -> Self {
        Self {
            input_channels,
            b1,
            b2_reduce,
            b2,
            b3_reduce,
            b3_mid,
            b3,
            pool_proj,
        }
    }

    pub const fn output_channels(&self) -> usize {
        self.b1 + self.b2 + self.b3 + self.pool_proj
    }
}

/// Filters of one grid-reduction block. The pooling branch keeps the
/// input channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridReductionConfig {
    pub input_channels: usize,
    /// 1x1 reduce then strided 3x3.
    pub b1_reduce: usize,
    pub b1: usize,
    /// 1x1 reduce, 3x3, strided 3x3.
    pub b2_reduce: usize,
    pub b2_mid: usize,
    pub b2: usize,
}

impl GridReductionConfig {
    pub const fn new(
        input_channels: usize,
        b1_reduce: usize,
        b1: usize,
        b2_reduce: usize,
        b2_mid: usize,
        b2: usize,
    ) -> Self {
        Self {
            input_channels,
            b1_reduce,
            b1,
            b2_reduce,
            b2_mid,
            b2,
        }
    }

    pub const fn output_channels(&self) -> usize {
        self.b1 + self.b2 + self.input_channels
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemConfig {
    pub pad: usize,
    pub conv1: usize,
    pub reduce: usize,
    pub conv2: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InceptionV2Config {
    pub stem: StemConfig,
    pub stage1: Vec<InceptionConfig>,
    pub reduction1: GridReductionConfig,
    pub stage2: Vec<InceptionConfig>,
    pub reduction2: GridReductionConfig,
    pub stage3: Vec<InceptionConfig>,
    pub dropout: f32,
    pub num_classes: usize,
}

impl InceptionV2Config {
    pub fn standard(num_classes: usize) -> Self {
        Self {
            stem: StemConfig {
                pad: 3,
                conv1: 64,
                reduce: 64,
                conv2: 192,
            },
            stage1: vec![
                InceptionConfig::new(192, 64, 64, 64, 64, 96, 96, 32),
                InceptionConfig::new(256, 64, 64, 96, 64, 96, 96, 64),
            ],
            reduction1: GridReductionConfig::new(320, 128, 160, 64, 96, 96),
            stage2: vec![
                InceptionConfig::new(576, 224, 64, 96, 96, 128, 128, 128),
                InceptionConfig::new(576, 224, 64, 96, 96, 128, 128, 128),
                InceptionConfig::new(576, 160, 128, 160, 128, 160, 160, 96),
                InceptionConfig::new(576, 96, 128, 192, 160, 192, 192, 96),
            ],
            reduction2: GridReductionConfig::new(576, 128, 192, 192, 256, 256),
            stage3: vec![
                InceptionConfig::new(1024, 352, 192, 320, 224, 224, 224, 128),
                InceptionConfig::new(1024, 352, 192, 320, 192, 224, 224, 128),
            ],
            dropout: 0.4,
            num_classes,
        }
    }
}

fn conv_relu(
    seq: &mut Sequential,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    rng: &mut SeedRng,
) -> Result<()> {
    let conv = Conv2d::new(seq.current_shape(), out_channels, kernel, stride, padding, rng)?;
    let relu = ReluLayer::new(conv.output_shape());
    seq.push(conv).push(relu);
    Ok(())
}

fn check_channels(block: &str, expected: usize, shape: Shape) -> Result<()> {
    if expected != shape.channels {
        return Err(Error::Architecture(format!(
            "{block} expects {expected} input channels but receives {shape}"
        )));
    }
    Ok(())
}

pub fn stem(in_shape: Shape, cfg: &StemConfig, rng: &mut SeedRng) -> Result<Sequential> {
    let mut seq = Sequential::new(in_shape);
    seq.push(ZeroPad2d::new(in_shape, cfg.pad));
    conv_relu(&mut seq, cfg.conv1, 7, 2, 0, rng)?;
    let pool = MaxPool2d::new(seq.current_shape(), 3, 2)?;
    seq.push(pool);
    conv_relu(&mut seq, cfg.reduce, 1, 1, 0, rng)?;
    conv_relu(&mut seq, cfg.conv2, 3, 1, 1, rng)?;
    let pool = MaxPool2d::new(seq.current_shape(), 3, 2)?;
    seq.push(pool);
    Ok(seq)
}

pub fn inception_module(
    in_shape: Shape,
    cfg: &InceptionConfig,
    rng: &mut SeedRng,
) -> Result<BranchConcat> {
    check_channels("inception module", cfg.input_channels, in_shape)?;

    let mut branch1 = Sequential::new(in_shape);
    conv_relu(&mut branch1, cfg.b1, 1, 1, 0, rng)?;

    let mut branch2 = Sequential::new(in_shape);
    conv_relu(&mut branch2, cfg.b2_reduce, 1, 1, 0, rng)?;
    conv_relu(&mut branch2, cfg.b2, 3, 1, 1, rng)?;

    let mut branch3 = Sequential::new(in_shape);
    conv_relu(&mut branch3, cfg.b3_reduce, 1, 1, 0, rng)?;
    conv_relu(&mut branch3, cfg.b3_mid, 3, 1, 1, rng)?;
    conv_relu(&mut branch3, cfg.b3, 3, 1, 1, rng)?;

    let mut branch4 = Sequential::new(in_shape);
    branch4.push(AvgPool2d::new(in_shape, 3, 1, 1)?);
    conv_relu(&mut branch4, cfg.pool_proj, 1, 1, 0, rng)?;

    BranchConcat::new(in_shape, vec![branch1, branch2, branch3, branch4])
}

pub fn grid_reduction(
    in_shape: Shape,
    cfg: &GridReductionConfig,
    rng: &mut SeedRng,
) -> Result<BranchConcat> {
    check_channels("grid reduction", cfg.input_channels, in_shape)?;

    let mut branch1 = Sequential::new(in_shape);
    conv_relu(&mut branch1, cfg.b1_reduce, 1, 1, 0, rng)?;
    conv_relu(&mut branch1, cfg.b1, 3, 2, 0, rng)?;

    let mut branch2 = Sequential::new(in_shape);
    conv_relu(&mut branch2, cfg.b2_reduce, 1, 1, 0, rng)?;
    conv_relu(&mut branch2, cfg.b2_mid, 3, 1, 1, rng)?;
    conv_relu(&mut branch2, cfg.b2, 3, 2, 0, rng)?;

    let mut branch3 = Sequential::new(in_shape);
    branch3.push(MaxPool2d::new(in_shape, 3, 2)?);

    BranchConcat::new(in_shape, vec![branch1, branch2, branch3])
}

/// Auxiliary head for an intermediate feature map. It is not wired into
/// the main network.
pub fn auxiliary_classifier(
    in_shape: Shape,
    num_classes: usize,
    rng: &mut SeedRng,
) -> Result<Sequential> {
    let mut seq = Sequential::new(in_shape);
    seq.push(AvgPool2d::new(in_shape, 5, 3, 1)?);
    conv_relu(&mut seq, 128, 1, 1, 0, rng)?;
    let pooled = GlobalAvgPool::new(seq.current_shape());
    seq.push(pooled);
    seq.push(LinearLayer::new(128, num_classes, rng));
    Ok(seq)
}

pub fn classifier(
    in_shape: Shape,
    dropout: f32,
    num_classes: usize,
    rng: &mut SeedRng,
) -> Sequential {
    let mut seq = Sequential::new(in_shape);
    seq.push(GlobalAvgPool::new(in_shape));
    seq.push(Dropout::new(
        Shape::flat(in_shape.channels),
        dropout,
        rng.next_u32(),
    ));
    seq.push(LinearLayer::new(in_shape.channels, num_classes, rng));
    seq
}

/// Builds the full network for `in_shape` inputs with a softmax
/// cross-entropy head.
pub fn build_inception_v2(
    in_shape: Shape,
    cfg: &InceptionV2Config,
    seed: u32,
) -> Result<Network> {
    if cfg.num_classes == 0 {
        return Err(Error::Architecture("classifier needs at least one class".into()));
    }
    let mut rng = SeedRng::new(seed);
    let mut network = Network::new(in_shape, Box::new(SoftMaxCrossEntropy::new()));

    let block = stem(in_shape, &cfg.stem, &mut rng)?;
    let mut shape = block.output_shape();
    network.push("stem", Box::new(block));

    let stages = [
        (&cfg.stage1, &cfg.reduction1, "reduction1"),
        (&cfg.stage2, &cfg.reduction2, "reduction2"),
    ];
    let mut index = 1;
    for (stage, reduction, name) in stages {
        for block_cfg in stage.iter() {
            let block = inception_module(shape, block_cfg, &mut rng)?;
            shape = block.output_shape();
            network.push(format!("inception{index}"), Box::new(block));
            index += 1;
        }
        let block = grid_reduction(shape, reduction, &mut rng)?;
        shape = block.output_shape();
        network.push(name, Box::new(block));
    }
    for block_cfg in cfg.stage3.iter() {
        let block = inception_module(shape, block_cfg, &mut rng)?;
        shape = block.output_shape();
        network.push(format!("inception{index}"), Box::new(block));
        index += 1;
    }

    let head = classifier(shape, cfg.dropout, cfg.num_classes, &mut rng);
    network.push("classifier", Box::new(head));
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_channel_plan_is_consistent() {
        let cfg = InceptionV2Config::standard(5);
        let mut channels = cfg.stem.conv2;
        for block in cfg.stage1.iter() {
            assert_eq!(block.input_channels, channels);
            channels = block.output_channels();
        }
        assert_eq!(cfg.reduction1.input_channels, channels);
        channels = cfg.reduction1.output_channels();
        for block in cfg.stage2.iter() {
            assert_eq!(block.input_channels, channels);
            channels = block.output_channels();
        }
        assert_eq!(cfg.reduction2.input_channels, channels);
        channels = cfg.reduction2.output_channels();
        for block in cfg.stage3.iter() {
            assert_eq!(block.input_channels, channels);
            channels = block.output_channels();
        }
        assert_eq!(channels, 1024);
    }

    #[test]
    fn inception_module_keeps_spatial_size() {
        let mut rng = SeedRng::new(9);
        let cfg = InceptionConfig::new(4, 2, 2, 3, 1, 2, 2, 1);
        let block = inception_module(Shape::new(5, 5, 4), &cfg, &mut rng).unwrap();
        assert_eq!(block.output_shape(), Shape::new(5, 5, 8));
        assert_eq!(block.branch_channels(), vec![2, 3, 2, 1]);
    }

    #[test]
    fn grid_reduction_halves_and_deepens() {
        let mut rng = SeedRng::new(9);
        let cfg = GridReductionConfig::new(4, 2, 3, 2, 2, 5);
        let block = grid_reduction(Shape::new(9, 9, 4), &cfg, &mut rng).unwrap();
        assert_eq!(block.output_shape(), Shape::new(4, 4, 12));
        assert_eq!(block.branch_count(), 3);
    }

    #[test]
    fn declared_channels_must_match() {
        let mut rng = SeedRng::new(9);
        let cfg = InceptionConfig::new(8, 2, 2, 3, 1, 2, 2, 1);
        let err = inception_module(Shape::new(5, 5, 4), &cfg, &mut rng)
            .err()
            .unwrap();
        assert!(err.to_string().contains("expects 8 input channels"));
    }

    #[test]
    fn zero_filter_branch_is_rejected() {
        let mut rng = SeedRng::new(9);
        let cfg = InceptionConfig::new(4, 0, 2, 3, 1, 2, 2, 1);
        let err = inception_module(Shape::new(5, 5, 4), &cfg, &mut rng)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Architecture(_)));
        let cfg = GridReductionConfig::new(4, 2, 0, 2, 2, 5);
        assert!(grid_reduction(Shape::new(9, 9, 4), &cfg, &mut rng).is_err());
    }

    #[test]
    fn auxiliary_classifier_reaches_class_scores() {
        let mut rng = SeedRng::new(9);
        let aux = auxiliary_classifier(Shape::new(8, 8, 16), 5, &mut rng).unwrap();
        assert_eq!(aux.output_shape(), Shape::flat(5));
    }
}
