use crate::utils::mat::Matrix;
use crate::utils::nn_trait;
use rayon::prelude::*;

/// Softmax followed by cross-entropy, averaged over the batch.
pub struct SoftMaxCrossEntropy {
    pub grad: Matrix,
}

impl SoftMaxCrossEntropy {
    pub fn new() -> Self {
        Self {
            grad: Matrix::null(),
        }
    }
}

impl Default for SoftMaxCrossEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl nn_trait::Head for SoftMaxCrossEntropy {
    fn forward(&mut self, input: Matrix, labels: &[usize]) -> Matrix {
        let (h, w) = input.shape();
        assert_eq!(h, labels.len(), "one label per prediction row");
        let mut ret = Matrix::new(h, 1);
        self.grad = Matrix::new(h, w);
        if h == 0 || w == 0 {
            return ret;
        }
        let batch = h as f32;

        ret.as_mut_slice()
            .par_iter_mut()
            .zip(self.grad.as_mut_slice().par_chunks_mut(w))
            .enumerate()
            .for_each(|(idx, (loss, grad_row))| {
                let src_row = input.row(idx);
                let target = labels[idx];
                assert!(target < w, "label {target} outside {w} classes");

                let max_val = src_row
                    .iter()
                    .skip(1)
                    .fold(src_row[0], |a, &b| if a < b { b } else { a });
                let sum = src_row.iter().map(|v| (v - max_val).exp()).sum::<f32>();
                let log_sum = sum.ln();

                for (i, g) in grad_row.iter_mut().enumerate() {
                    let p = (src_row[i] - max_val).exp() / sum;
                    let t = if i == target { 1.0 } else { 0.0 };
                    *g = (p - t) / batch;
                }
                *loss = log_sum - (src_row[target] - max_val);
            });
        ret
    }

    fn backward(&mut self) -> Matrix {
        self.grad.clone()
    }

    fn eval_forward(&self, input: &Matrix) -> Vec<usize> {
        input.argmax_rows()
    }
}
