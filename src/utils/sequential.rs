use crate::utils::mat::Matrix;
use crate::utils::nn_trait::Layer;
use crate::utils::optimizer::Optimizer;
use crate::utils::shape::Shape;

/// Layers applied in order; `output_shape` follows the last layer.
pub struct Sequential {
    in_shape: Shape,
    layers: Vec<Box<dyn Layer>>,
}

impl Sequential {
    pub fn new(in_shape: Shape) -> Self {
        Self {
            in_shape,
            layers: Vec::new(),
        }
    }

    /// Shape the next pushed layer has to accept.
    pub fn current_shape(&self) -> Shape {
        self.layers
            .last()
            .map(|layer| layer.output_shape())
            .unwrap_or(self.in_shape)
    }

    pub fn push<L: Layer + 'static>(&mut self, layer: L) -> &mut Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Layer for Sequential {
    fn forward(&mut self, mut x: Matrix) -> Matrix {
        for layer in self.layers.iter_mut() {
            x = layer.forward(x);
        }
        x
    }

    fn backward(&mut self, mut x: Matrix) -> Matrix {
        for layer in self.layers.iter_mut().rev() {
            x = layer.backward(x);
        }
        x
    }

    fn output_shape(&self) -> Shape {
        self.current_shape()
    }

    fn update_parameters(&mut self, optimizer: &dyn Optimizer) {
        for layer in self.layers.iter_mut() {
            layer.update_parameters(optimizer);
        }
    }

    fn set_training(&mut self, training: bool) {
        for layer in self.layers.iter_mut() {
            layer.set_training(training);
        }
    }

    fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.parameter_count()).sum()
    }
}
