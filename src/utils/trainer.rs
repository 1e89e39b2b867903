use crate::utils::config::{OptimizerKind, TrainConfig};
use crate::utils::dataloader::DataLoader;
use crate::utils::error::{Error, Result};
use crate::utils::misc::check_abnormal;
use crate::utils::network::Network;
use crate::utils::nn_trait::DataSet;
use crate::utils::optimizer::{Adam, Optimizer, SGD};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    /// Mean per-sample loss.
    pub loss: f32,
    /// Percentage of correct predictions.
    pub accuracy: f32,
    pub correct: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    /// Mean of the batch-mean training losses.
    pub train_loss: f32,
    pub batches: usize,
    /// `None` when there is no validation data.
    pub validation: Option<EvalReport>,
}

pub fn build_optimizer(config: &TrainConfig) -> Box<dyn Optimizer> {
    match config.optimizer {
        OptimizerKind::Adam => Box::new(Adam::new(
            config.learning_rate,
            config.beta1,
            config.beta2,
            config.epsilon,
        )),
        OptimizerKind::Sgd => Box::new(SGD::new(
            config.learning_rate,
            config.momentum,
            config.weight_decay,
        )),
    }
}

pub struct Trainer {
    pub network: Network,
    optimizer: Box<dyn Optimizer>,
    batch_size: usize,
    log_every: usize,
    seed: u32,
}

impl Trainer {
    pub fn new(network: Network, optimizer: Box<dyn Optimizer>, config: &TrainConfig) -> Self {
        Self {
            network,
            optimizer,
            batch_size: config.batch_size.max(1),
            log_every: config.log_every.max(1),
            seed: config.seed,
        }
    }

    fn check_input<T: DataSet>(&self, dataset: &T) -> Result<()> {
        let expected = self.network.input_shape();
        if dataset.dim() != expected.len() {
            return Err(Error::Data(format!(
                "samples have {} values, network expects {expected}",
                dataset.dim()
            )));
        }
        Ok(())
    }

    /// One pass over `dataset` in a freshly shuffled order, updating the
    /// parameters after every batch. Returns `(mean batch loss, batches)`.
    pub fn train_epoch<T>(&mut self, dataset: &T, epoch: usize) -> Result<(f32, usize)>
    where
        T: DataSet + Sync,
    {
        if dataset.is_empty() {
            return Err(Error::EmptyDataset("training set has no samples".into()));
        }
        self.check_input(dataset)?;
        self.network.set_training(true);
        let order_seed = self.seed.wrapping_add((epoch as u32) << 10);
        let dataloader = DataLoader::new(dataset, self.batch_size, true, order_seed);

        let mut avg_loss = 0f32;
        let mut batches = 0usize;
        for (i, (image, gt)) in dataloader.enumerate() {
            let pred = self.network.forward(image);
            let loss = self.network.calc_loss(pred, &gt);
            let (h, _) = loss.shape();
            let batch_loss = loss.as_slice().iter().sum::<f32>() / h as f32;
            if check_abnormal(&loss) {
                warn!(epoch, iteration = i + 1, "non-finite loss");
            }

            self.network.backward();
            self.network.update_parameters(self.optimizer.as_mut());

            avg_loss += batch_loss;
            batches += 1;
            if (i + 1) % self.log_every == 0 {
                info!(epoch, iteration = i + 1, loss = batch_loss, "training");
            }
        }
        Ok((avg_loss / batches as f32, batches))
    }

    /// Loss and accuracy over `dataset` without touching the parameters.
    /// `None` for an empty dataset.
    pub fn evaluate<T>(&mut self, dataset: &T) -> Result<Option<EvalReport>>
    where
        T: DataSet + Sync,
    {
        if dataset.is_empty() {
            return Ok(None);
        }
        self.check_input(dataset)?;
        self.network.set_training(false);
        let dataloader = DataLoader::new(dataset, self.batch_size, false, 0);
        let mut loss_sum = 0f32;
        let mut correct = 0usize;
        let mut total = 0usize;
        for (image, gt) in dataloader {
            let pred = self.network.forward(image);
            let predicted = self.network.get_result(&pred);
            correct += predicted
                .iter()
                .zip(gt.iter())
                .filter(|(p, g)| p == g)
                .count();
            total += gt.len();
            let loss = self.network.calc_loss(pred, &gt);
            loss_sum += loss.as_slice().iter().sum::<f32>();
        }
        Ok(Some(EvalReport {
            loss: loss_sum / total as f32,
            accuracy: 100.0 * correct as f32 / total as f32,
            correct,
            total,
        }))
    }

    pub fn fit<T, V>(&mut self, train: &T, val: &V, epochs: usize) -> Result<Vec<EpochReport>>
    where
        T: DataSet + Sync,
        V: DataSet + Sync,
    {
        if val.is_empty() {
            warn!("no validation samples, validation metrics are skipped");
        }
        info!(
            epochs,
            batch_size = self.batch_size,
            learning_rate = self.optimizer.learning_rate(),
            "training started"
        );
        let mut reports = Vec::with_capacity(epochs);
        for epoch in 1..=epochs {
            let (train_loss, batches) = self.train_epoch(train, epoch)?;
            let validation = self.evaluate(val)?;
            match validation {
                Some(v) => info!(
                    epoch,
                    loss = train_loss,
                    val_loss = v.loss,
                    val_acc = v.accuracy,
                    "epoch finished"
                ),
                None => info!(epoch, loss = train_loss, "epoch finished"),
            }
            reports.push(EpochReport {
                epoch,
                train_loss,
                batches,
                validation,
            });
        }
        info!("training done");
        Ok(reports)
    }
}
