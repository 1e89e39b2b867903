use inception_net::utils::inception::{
    GridReductionConfig, InceptionConfig, InceptionV2Config, StemConfig,
};

/// A scaled-down network that fits a 64x64 input.
pub fn tiny_config(num_classes: usize) -> InceptionV2Config {
    InceptionV2Config {
        stem: StemConfig {
            pad: 3,
            conv1: 4,
            reduce: 4,
            conv2: 8,
        },
        stage1: vec![InceptionConfig::new(8, 2, 2, 2, 2, 2, 2, 2)],
        reduction1: GridReductionConfig::new(8, 2, 2, 2, 2, 2),
        stage2: vec![InceptionConfig::new(12, 3, 2, 3, 2, 3, 3, 3)],
        reduction2: GridReductionConfig::new(12, 2, 4, 2, 2, 4),
        stage3: vec![InceptionConfig::new(20, 4, 2, 4, 2, 4, 4, 4)],
        dropout: 0.4,
        num_classes,
    }
}
