use crate::utils::mat::Matrix;
use rayon::prelude::*;

/// A trainable tensor with its gradient and per-parameter optimizer state.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub value: Matrix,
    pub grad: Matrix,
    // velocity for SGD, first moment for Adam
    pub m: Matrix,
    pub v: Matrix,
}

impl Parameter {
    pub fn new(value: Matrix) -> Self {
        let (h, w) = value.shape();
        Self {
            value,
            grad: Matrix::new(h, w),
            m: Matrix::null(),
            v: Matrix::null(),
        }
    }

    pub fn len(&self) -> usize {
        self.value.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_state(&mut self) {
        let (h, w) = self.value.shape();
        if self.m.is_null() {
            self.m = Matrix::new(h, w);
        }
        if self.v.is_null() {
            self.v = Matrix::new(h, w);
        }
    }
}

pub trait Optimizer: Sync {
    /// Called once per batch before any `step`.
    fn begin_step(&mut self);
    fn step(&self, param: &mut Parameter);
    fn learning_rate(&self) -> f32;
}

pub struct SGD {
    rate: f32,
    momentum: f32,
    decay: f32,
}

impl SGD {
    pub fn new(rate: f32, momentum: f32, decay: f32) -> Self {
        Self {
            rate,
            momentum,
            decay,
        }
    }
}

impl Optimizer for SGD {
    fn begin_step(&mut self) {}

    fn step(&self, param: &mut Parameter) {
        param.ensure_state();
        let (rate, momentum, decay) = (self.rate, self.momentum, self.decay);
        let Parameter { value, grad, m, .. } = param;
        m.as_mut_slice()
            .par_iter_mut()
            .zip(grad.as_slice().par_iter())
            .zip(value.as_slice().par_iter())
            .for_each(|((vel, g), w)| {
                let go = -rate * (g + decay * w);
                *vel = momentum * *vel + go;
            });
        m.clamp(-100.0, 100.0);
        value.add(m);
    }

    fn learning_rate(&self) -> f32 {
        self.rate
    }
}

pub struct Adam {
    rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: i32,
}

impl Adam {
    pub fn new(rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            rate,
            beta1,
            beta2,
            epsilon,
            t: 0,
        }
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn step(&self, param: &mut Parameter) {
        param.ensure_state();
        let t = self.t.max(1);
        let bias_correction1 = 1.0 - self.beta1.powi(t);
        let bias_correction2 = 1.0 - self.beta2.powi(t);
        let (rate, beta1, beta2, epsilon) = (self.rate, self.beta1, self.beta2, self.epsilon);

        let Parameter { value, grad, m, v } = param;
        value
            .as_mut_slice()
            .par_iter_mut()
            .zip(grad.as_slice().par_iter())
            .zip(m.as_mut_slice().par_iter_mut())
            .zip(v.as_mut_slice().par_iter_mut())
            .for_each(|(((w, g), m), v)| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bias_correction1;
                let v_hat = *v / bias_correction2;
                *w -= rate * m_hat / (v_hat.sqrt() + epsilon);
            });
    }

    fn learning_rate(&self) -> f32 {
        self.rate
    }
}
