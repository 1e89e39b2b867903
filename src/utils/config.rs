//! Training configuration.
//!
//! Every field has a default, so a JSON file only needs the values it
//! changes:
//!
//! ```json
//! { "epochs": 10, "batch_size": 8, "optimizer": "sgd" }
//! ```

use crate::utils::download::FLOWER_PHOTOS_URL;
use crate::utils::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Directory the archive is downloaded to and extracted in.
    pub data_dir: PathBuf,
    pub url: String,
    /// Skip the download and expect the extracted dataset under `data_dir`.
    pub no_download: bool,
    pub image_size: usize,
    /// Fraction of every category held out for validation.
    pub val_ratio: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub optimizer: OptimizerKind,
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    /// SGD only.
    pub momentum: f32,
    /// SGD only.
    pub weight_decay: f32,
    pub dropout: f32,
    pub seed: u32,
    /// Log the batch loss every this many iterations.
    pub log_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            url: FLOWER_PHOTOS_URL.to_string(),
            no_download: false,
            image_size: 150,
            val_ratio: 0.05,
            epochs: 100,
            batch_size: 16,
            optimizer: OptimizerKind::Adam,
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            momentum: 0.9,
            weight_decay: 0.0001,
            dropout: 0.4,
            seed: 1,
            log_every: 20,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(Error::Config(msg.to_string())) };
        if self.epochs == 0 {
            return invalid("epochs must be positive");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be positive");
        }
        if self.image_size == 0 {
            return invalid("image_size must be positive");
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return invalid("learning_rate must be positive");
        }
        if !(0.0..1.0).contains(&self.val_ratio) {
            return invalid("val_ratio must be in [0, 1)");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return invalid("dropout must be in [0, 1)");
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return invalid("adam betas must be in [0, 1)");
        }
        if self.log_every == 0 {
            return invalid("log_every must be positive");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<TrainConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
