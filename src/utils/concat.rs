use crate::utils::error::{Error, Result};
use crate::utils::mat::Matrix;
use crate::utils::nn_trait::Layer;
use crate::utils::optimizer::Optimizer;
use crate::utils::sequential::Sequential;
use crate::utils::shape::Shape;
use rayon::prelude::*;

/// Runs every branch on the same input and concatenates the results along
/// the channel axis. The input gradient is the sum of the branch gradients.
pub struct BranchConcat {
    in_shape: Shape,
    out_shape: Shape,
    branches: Vec<Sequential>,
    // channel offset of each branch inside the output
    offsets: Vec<usize>,
}

impl BranchConcat {
    pub fn new(in_shape: Shape, branches: Vec<Sequential>) -> Result<Self> {
        let first = branches
            .first()
            .ok_or_else(|| Error::Architecture("branch block without branches".into()))?
            .output_shape();
        let mut offsets = Vec::with_capacity(branches.len());
        let mut channels = 0;
        for (idx, branch) in branches.iter().enumerate() {
            let shape = branch.output_shape();
            if shape.channels == 0 {
                return Err(Error::Architecture(format!("branch {idx} has no channels")));
            }
            if shape.height != first.height || shape.width != first.width {
                return Err(Error::Architecture(format!(
                    "branch {idx} produces {shape}, expected {}x{} spatial size",
                    first.height, first.width
                )));
            }
            offsets.push(channels);
            channels += shape.channels;
        }
        Ok(Self {
            in_shape,
            out_shape: first.with_channels(channels),
            branches,
            offsets,
        })
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    pub fn branch_channels(&self) -> Vec<usize> {
        self.branches
            .iter()
            .map(|branch| branch.output_shape().channels)
            .collect()
    }
}

impl Layer for BranchConcat {
    fn forward(&mut self, input: Matrix) -> Matrix {
        assert_eq!(input.number_of_col(), self.in_shape.len());
        let h = input.number_of_row();
        let outputs = self
            .branches
            .par_iter_mut()
            .map(|branch| branch.forward(input.clone()))
            .collect::<Vec<_>>();

        let out_shape = self.out_shape;
        let mut ret = Matrix::new(h, out_shape.len());
        if out_shape.is_empty() {
            return ret;
        }
        let offsets = &self.offsets;
        ret.as_mut_slice()
            .par_chunks_mut(out_shape.len())
            .enumerate()
            .for_each(|(batch, dst)| {
                for (output, &offset) in outputs.iter().zip(offsets.iter()) {
                    let channels = output.number_of_col() / out_shape.pixels();
                    for (pixel, src) in output.row(batch).chunks(channels).enumerate() {
                        let o = pixel * out_shape.channels + offset;
                        dst[o..o + channels].copy_from_slice(src);
                    }
                }
            });
        ret
    }

    fn backward(&mut self, d_loss: Matrix) -> Matrix {
        let h = d_loss.number_of_row();
        let out_shape = self.out_shape;
        let d_loss = &d_loss;
        let grads = self
            .branches
            .par_iter_mut()
            .zip(self.offsets.par_iter())
            .map(|(branch, &offset)| {
                let channels = branch.output_shape().channels;
                let mut split = Matrix::new(h, out_shape.pixels() * channels);
                for batch in 0..h {
                    let src = d_loss.row(batch);
                    for (pixel, dst) in split.row_mut(batch).chunks_mut(channels).enumerate() {
                        let o = pixel * out_shape.channels + offset;
                        dst.copy_from_slice(&src[o..o + channels]);
                    }
                }
                branch.backward(split)
            })
            .collect::<Vec<_>>();

        let mut ret = Matrix::new(h, self.in_shape.len());
        for grad in grads.iter() {
            ret.add(grad);
        }
        ret
    }

    fn output_shape(&self) -> Shape {
        self.out_shape
    }

    fn update_parameters(&mut self, optimizer: &dyn Optimizer) {
        self.branches
            .par_iter_mut()
            .for_each(|branch| branch.update_parameters(optimizer));
    }

    fn set_training(&mut self, training: bool) {
        for branch in self.branches.iter_mut() {
            branch.set_training(training);
        }
    }

    fn parameter_count(&self) -> usize {
        self.branches.iter().map(|b| b.parameter_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::pool::MaxPool2d;
    use crate::utils::relu::ReluLayer;

    #[test]
    fn concatenates_channels_per_pixel() {
        let shape = Shape::new(1, 2, 1);
        let mut a = Sequential::new(shape);
        a.push(ReluLayer::new(shape));
        let b = Sequential::new(shape);
        let mut block = BranchConcat::new(shape, vec![a, b]).unwrap();
        assert_eq!(block.output_shape(), Shape::new(1, 2, 2));
        let out = block.forward(Matrix::from_vec(1, 2, vec![-1.0, 2.0]));
        assert_eq!(out.as_slice(), &[0.0, -1.0, 2.0, 2.0]);
        let grad = block.backward(Matrix::from_vec(1, 4, vec![1.0, 10.0, 1.0, 10.0]));
        // relu branch drops the first pixel, identity branch passes everything
        assert_eq!(grad.as_slice(), &[10.0, 11.0]);
    }

    #[test]
    fn rejects_mismatched_spatial_sizes() {
        let shape = Shape::new(5, 5, 1);
        let mut pooled = Sequential::new(shape);
        pooled.push(MaxPool2d::new(shape, 3, 2).unwrap());
        let identity = Sequential::new(shape);
        assert!(BranchConcat::new(shape, vec![pooled, identity]).is_err());
    }
}
