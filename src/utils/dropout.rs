use crate::utils::mat::Matrix;
use crate::utils::misc::SeedRng;
use crate::utils::nn_trait;
use crate::utils::shape::Shape;
use rayon::prelude::*;

/// Inverted dropout: kept activations are scaled by `1 / (1 - p)` during
/// training, evaluation is the identity.
pub struct Dropout {
    shape: Shape,
    p: f32,
    training: bool,
    rng: SeedRng,
    mask: Vec<f32>,
}

impl Dropout {
    pub fn new(shape: Shape, p: f32, seed: u32) -> Self {
        Self {
            shape,
            p,
            training: true,
            rng: SeedRng::new(seed),
            mask: Vec::new(),
        }
    }
}

impl nn_trait::Layer for Dropout {
    fn forward(&mut self, mut input: Matrix) -> Matrix {
        if !self.training || self.p <= 0.0 {
            self.mask.clear();
            return input;
        }
        let keep = 1.0 - self.p;
        let scale = 1.0 / keep;
        let n = input.as_slice().len();
        self.mask = (0..n)
            .map(|_| if self.rng.next_f32() < keep { scale } else { 0.0 })
            .collect();
        input
            .as_mut_slice()
            .par_iter_mut()
            .zip(self.mask.par_iter())
            .for_each(|(v, m)| *v *= m);
        input
    }

    fn backward(&mut self, mut d_loss: Matrix) -> Matrix {
        if self.mask.is_empty() {
            return d_loss;
        }
        d_loss
            .as_mut_slice()
            .par_iter_mut()
            .zip(self.mask.par_iter())
            .for_each(|(g, m)| *g *= m);
        d_loss
    }

    fn output_shape(&self) -> Shape {
        self.shape
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
