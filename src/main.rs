use clap::Parser;
use inception_net::utils::config::{load_config, OptimizerKind, TrainConfig};
use inception_net::utils::download::{download_and_extract, extracted_dir_name};
use inception_net::utils::flowers::FlowerData;
use inception_net::utils::inception::{build_inception_v2, InceptionV2Config};
use inception_net::utils::shape::Shape;
use inception_net::utils::trainer::{build_optimizer, Trainer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "inception_net",
    about = "Train an Inception-v2 style classifier on the flower-photo dataset"
)]
struct Args {
    /// JSON training config; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory the dataset archive is downloaded to and extracted in.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Dataset archive URL.
    #[arg(long)]
    url: Option<String>,
    /// Use an already extracted dataset instead of downloading.
    #[arg(long)]
    no_download: bool,
    #[arg(long)]
    epochs: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    /// Learning rate.
    #[arg(long)]
    lr: Option<f32>,
    /// Side length images are resized to.
    #[arg(long)]
    image_size: Option<usize>,
    /// Fraction of every category held out for validation.
    #[arg(long)]
    val_ratio: Option<f64>,
    #[arg(long)]
    seed: Option<u32>,
    /// Log the batch loss every this many iterations.
    #[arg(long)]
    log_every: Option<usize>,
    #[arg(long, value_enum)]
    optimizer: Option<OptimizerArg>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum OptimizerArg {
    Adam,
    Sgd,
}

impl Args {
    fn resolve(&self) -> anyhow::Result<TrainConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_config(path)?,
            None => TrainConfig::default(),
        };
        if let Some(v) = &self.data_dir {
            cfg.data_dir = v.clone();
        }
        if let Some(v) = &self.url {
            cfg.url = v.clone();
        }
        cfg.no_download |= self.no_download;
        if let Some(v) = self.epochs {
            cfg.epochs = v;
        }
        if let Some(v) = self.batch_size {
            cfg.batch_size = v;
        }
        if let Some(v) = self.lr {
            cfg.learning_rate = v;
        }
        if let Some(v) = self.image_size {
            cfg.image_size = v;
        }
        if let Some(v) = self.val_ratio {
            cfg.val_ratio = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if let Some(v) = self.log_every {
            cfg.log_every = v;
        }
        if let Some(v) = self.optimizer {
            cfg.optimizer = match v {
                OptimizerArg::Adam => OptimizerKind::Adam,
                OptimizerArg::Sgd => OptimizerKind::Sgd,
            };
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Args::parse().resolve()?;

    let root = if cfg.no_download {
        cfg.data_dir.join(extracted_dir_name(&cfg.url))
    } else {
        download_and_extract(&cfg.url, &cfg.data_dir)?
    };
    let split = FlowerData::load(&root, cfg.image_size, cfg.val_ratio)?;

    let mut arch = InceptionV2Config::standard(split.categories.len());
    arch.dropout = cfg.dropout;
    let network = build_inception_v2(Shape::new(cfg.image_size, cfg.image_size, 3), &arch, cfg.seed)?;
    for (name, shape, params) in network.summary() {
        info!(stage = %name, output = %shape, params, "network stage");
    }
    info!(parameters = network.parameter_count(), "network built");

    let optimizer = build_optimizer(&cfg);
    let mut trainer = Trainer::new(network, optimizer, &cfg);
    trainer.fit(&split.train, &split.val, cfg.epochs)?;
    Ok(())
}
