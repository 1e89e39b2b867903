use crate::utils::mat::Matrix;
use crate::utils::nn_trait::{Head, Layer};
use crate::utils::optimizer::Optimizer;
use crate::utils::shape::Shape;

pub struct Network {
    in_shape: Shape,
    layers: Vec<Box<dyn Layer>>,
    names: Vec<String>,
    loss_fn: Box<dyn Head>,
}

impl Network {
    pub fn new(in_shape: Shape, loss_fn: Box<dyn Head>) -> Self {
        Self {
            in_shape,
            layers: Vec::new(),
            names: Vec::new(),
            loss_fn,
        }
    }

    pub fn push(&mut self, name: impl Into<String>, layer: Box<dyn Layer>) {
        self.names.push(name.into());
        self.layers.push(layer);
    }

    pub fn input_shape(&self) -> Shape {
        self.in_shape
    }

    pub fn output_shape(&self) -> Shape {
        self.layers
            .last()
            .map(|layer| layer.output_shape())
            .unwrap_or(self.in_shape)
    }

    /// `(stage name, output shape, parameters)` for every top-level stage.
    pub fn summary(&self) -> Vec<(String, Shape, usize)> {
        self.names
            .iter()
            .zip(self.layers.iter())
            .map(|(name, layer)| (name.clone(), layer.output_shape(), layer.parameter_count()))
            .collect()
    }

    pub fn forward(&mut self, mut x: Matrix) -> Matrix {
        for layer in self.layers.iter_mut() {
            x = layer.forward(x);
        }
        x
    }

    pub fn calc_loss(&mut self, pred: Matrix, labels: &[usize]) -> Matrix {
        self.loss_fn.forward(pred, labels)
    }

    pub fn get_result(&self, pred: &Matrix) -> Vec<usize> {
        self.loss_fn.eval_forward(pred)
    }

    pub fn backward(&mut self) {
        let mut x = self.loss_fn.backward();
        for layer in self.layers.iter_mut().rev() {
            x = layer.backward(x);
        }
    }

    pub fn update_parameters(&mut self, optimizer: &mut dyn Optimizer) {
        optimizer.begin_step();
        let optimizer: &dyn Optimizer = optimizer;
        for layer in self.layers.iter_mut() {
            layer.update_parameters(optimizer);
        }
    }

    pub fn set_training(&mut self, training: bool) {
        for layer in self.layers.iter_mut() {
            layer.set_training(training);
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.parameter_count()).sum()
    }
}
