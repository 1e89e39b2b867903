use crate::utils::mat::Matrix;
use crate::utils::optimizer::Optimizer;
use crate::utils::shape::Shape;

/// A differentiable stage of the network.
///
/// `forward` caches whatever `backward` needs; `backward` receives the loss
/// gradient w.r.t. the layer output and returns the gradient w.r.t. its
/// input, storing parameter gradients for the next `update_parameters`.
pub trait Layer: Send {
    fn forward(&mut self, input: Matrix) -> Matrix;
    fn backward(&mut self, d_loss: Matrix) -> Matrix;
    fn output_shape(&self) -> Shape;

    fn update_parameters(&mut self, _optimizer: &dyn Optimizer) {}
    fn set_training(&mut self, _training: bool) {}
    fn parameter_count(&self) -> usize {
        0
    }
}

pub trait Head: Send {
    /// Per-sample losses as a `[batch, 1]` matrix.
    fn forward(&mut self, input: Matrix, labels: &[usize]) -> Matrix;
    fn backward(&mut self) -> Matrix;
    fn eval_forward(&self, input: &Matrix) -> Vec<usize>;
}

pub trait DataSet {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
    fn fetch_item(&self, idx: usize) -> (&[f32], usize);
}
