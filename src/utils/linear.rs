use crate::utils::mat::Matrix;
use crate::utils::misc::{fan_in_uniform_init, SeedRng};
use crate::utils::nn_trait;
use crate::utils::optimizer::{Optimizer, Parameter};
use crate::utils::shape::Shape;

pub struct LinearLayer {
    last_input: Matrix,
    pub weight: Parameter,
    pub bias: Parameter,
}

impl LinearLayer {
    pub fn new(in_channels: usize, out_channels: usize, rng: &mut SeedRng) -> Self {
        let mut weight = Matrix::new(in_channels, out_channels);
        let mut bias = Matrix::new(1, out_channels);
        fan_in_uniform_init(&mut weight, in_channels, rng);
        fan_in_uniform_init(&mut bias, in_channels, rng);
        Self {
            last_input: Matrix::null(),
            weight: Parameter::new(weight),
            bias: Parameter::new(bias),
        }
    }
}

impl nn_trait::Layer for LinearLayer {
    fn forward(&mut self, input: Matrix) -> Matrix {
        let mut now = input.mul(&self.weight.value);
        now.add_with_vector(&self.bias.value);
        self.last_input = input;
        now
    }

    fn backward(&mut self, d_loss: Matrix) -> Matrix {
        self.bias.grad = d_loss.sum_rows();
        self.weight.grad = self.last_input.T().mul(&d_loss);
        d_loss.mul(&self.weight.value.T())
    }

    fn output_shape(&self) -> Shape {
        Shape::flat(self.weight.value.number_of_col())
    }

    fn update_parameters(&mut self, optimizer: &dyn Optimizer) {
        optimizer.step(&mut self.weight);
        optimizer.step(&mut self.bias);
    }

    fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::nn_trait::Layer;

    #[test]
    fn affine_forward_and_gradients() {
        let mut rng = SeedRng::new(5);
        let mut fc = LinearLayer::new(2, 1, &mut rng);
        fc.weight.value = Matrix::from_vec(2, 1, vec![2.0, -1.0]);
        fc.bias.value = Matrix::from_vec(1, 1, vec![0.5]);
        let out = fc.forward(Matrix::from_vec(2, 2, vec![1.0, 1.0, 3.0, 2.0]));
        assert_eq!(out.as_slice(), &[1.5, 4.5]);
        let d_input = fc.backward(Matrix::from_vec(2, 1, vec![1.0, 1.0]));
        assert_eq!(fc.bias.grad.as_slice(), &[2.0]);
        assert_eq!(fc.weight.grad.as_slice(), &[4.0, 3.0]);
        assert_eq!(d_input.as_slice(), &[2.0, -1.0, 2.0, -1.0]);
    }
}
