use crate::utils::mat::Matrix;
use crate::utils::nn_trait;
use crate::utils::shape::Shape;
use rayon::prelude::*;

pub struct ReluLayer {
    shape: Shape,
    last_input: Matrix,
}

impl ReluLayer {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            last_input: Matrix::null(),
        }
    }
}

impl nn_trait::Layer for ReluLayer {
    fn forward(&mut self, mut input: Matrix) -> Matrix {
        input.as_mut_slice().par_iter_mut().for_each(|v| {
            if *v < 0.0 {
                *v = 0.0;
            }
        });
        self.last_input = input.clone();
        input
    }

    fn backward(&mut self, mut d_loss: Matrix) -> Matrix {
        d_loss
            .as_mut_slice()
            .par_iter_mut()
            .zip(self.last_input.as_slice().par_iter())
            .for_each(|(g, x)| {
                if *x <= 0.0 {
                    *g = 0.0;
                }
            });
        d_loss
    }

    fn output_shape(&self) -> Shape {
        self.shape
    }
}
