use crate::utils::mat::Matrix;
use crate::utils::nn_trait;
use crate::utils::shape::Shape;
use rayon::prelude::*;

/// Symmetric zero padding of the two spatial dimensions.
pub struct ZeroPad2d {
    pub in_shape: Shape,
    pub padding: usize,
}

impl ZeroPad2d {
    pub fn new(in_shape: Shape, padding: usize) -> Self {
        Self { in_shape, padding }
    }
}

impl nn_trait::Layer for ZeroPad2d {
    fn forward(&mut self, input: Matrix) -> Matrix {
        assert_eq!(input.number_of_col(), self.in_shape.len());
        let out_shape = self.output_shape();
        let h = input.number_of_row();
        let mut ret = Matrix::new(h, out_shape.len());
        let row_len = self.in_shape.width * self.in_shape.channels;
        if row_len == 0 {
            return ret;
        }
        ret.as_mut_slice()
            .par_chunks_mut(out_shape.len())
            .enumerate()
            .for_each(|(batch, dst)| {
                for (y, src) in input.row(batch).chunks(row_len).enumerate() {
                    let o = out_shape.index(y + self.padding, self.padding, 0);
                    dst[o..o + row_len].copy_from_slice(src);
                }
            });
        ret
    }

    fn backward(&mut self, d_loss: Matrix) -> Matrix {
        let out_shape = self.output_shape();
        let h = d_loss.number_of_row();
        let mut ret = Matrix::new(h, self.in_shape.len());
        let row_len = self.in_shape.width * self.in_shape.channels;
        if row_len == 0 {
            return ret;
        }
        ret.as_mut_slice()
            .par_chunks_mut(self.in_shape.len())
            .enumerate()
            .for_each(|(batch, dst)| {
                let src = d_loss.row(batch);
                for (y, row) in dst.chunks_mut(row_len).enumerate() {
                    let o = out_shape.index(y + self.padding, self.padding, 0);
                    row.copy_from_slice(&src[o..o + row_len]);
                }
            });
        ret
    }

    fn output_shape(&self) -> Shape {
        Shape::new(
            self.in_shape.height + 2 * self.padding,
            self.in_shape.width + 2 * self.padding,
            self.in_shape.channels,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::nn_trait::Layer;

    #[test]
    fn pads_and_crops_back() {
        let mut pad = ZeroPad2d::new(Shape::new(1, 2, 1), 1);
        assert_eq!(pad.output_shape(), Shape::new(3, 4, 1));
        let out = pad.forward(Matrix::from_vec(1, 2, vec![5.0, 6.0]));
        assert_eq!(
            out.as_slice(),
            &[0.0, 0.0, 0.0, 0.0, 0.0, 5.0, 6.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
        let grad = pad.backward(out);
        assert_eq!(grad.as_slice(), &[5.0, 6.0]);
    }
}
