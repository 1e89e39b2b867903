use crate::utils::error::{Error, Result};
use crate::utils::mat::Matrix;
use crate::utils::misc::{fan_in_uniform_init, SeedRng};
use crate::utils::nn_trait;
use crate::utils::optimizer::{Optimizer, Parameter};
use crate::utils::shape::{conv_output, Shape};
use rayon::prelude::*;

/// Square-kernel 2D convolution over HWC feature maps, computed as
/// im2col followed by one matrix product.
pub struct Conv2d {
    pub in_shape: Shape,
    pub out_shape: Shape,
    pub kernel: usize,
    pub stride: usize,
    pub padding: usize,

    // [kernel * kernel * in_channels, out_channels]
    pub weight: Parameter,
    // [1, out_channels]
    pub bias: Parameter,

    cols: Matrix,
}

impl Conv2d {
    pub fn new(
        in_shape: Shape,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        rng: &mut SeedRng,
    ) -> Result<Self> {
        if out_channels == 0 {
            return Err(Error::Architecture(format!(
                "convolution over {in_shape} with no output channels"
            )));
        }
        let feat_row = conv_output(in_shape.height, kernel, stride, padding)?;
        let feat_col = conv_output(in_shape.width, kernel, stride, padding)?;
        let fan_in = kernel * kernel * in_shape.channels;
        let mut weight = Matrix::new(fan_in, out_channels);
        let mut bias = Matrix::new(1, out_channels);
        fan_in_uniform_init(&mut weight, fan_in, rng);
        fan_in_uniform_init(&mut bias, fan_in, rng);
        Ok(Self {
            in_shape,
            out_shape: Shape::new(feat_row, feat_col, out_channels),
            kernel,
            stride,
            padding,
            weight: Parameter::new(weight),
            bias: Parameter::new(bias),
            cols: Matrix::null(),
        })
    }

    fn patch_len(&self) -> usize {
        self.kernel * self.kernel * self.in_shape.channels
    }

    /// Input pixel feeding kernel tap `(ky, kx)` of output `(oy, ox)`, if inside the image.
    fn source_pixel(&self, oy: usize, ox: usize, ky: usize, kx: usize) -> Option<(usize, usize)> {
        let iy = (oy * self.stride + ky) as isize - self.padding as isize;
        let ix = (ox * self.stride + kx) as isize - self.padding as isize;
        if iy < 0
            || ix < 0
            || iy >= self.in_shape.height as isize
            || ix >= self.in_shape.width as isize
        {
            None
        } else {
            Some((iy as usize, ix as usize))
        }
    }

    // B*HWC => BH'W'*(k*k*C)
    pub fn im2col(&self, input: &Matrix) -> Matrix {
        let h = input.number_of_row();
        let block = self.out_shape.pixels();
        let patch = self.patch_len();
        let in_channels = self.in_shape.channels;
        let mut cols = Matrix::new(h * block, patch);
        if patch == 0 || block == 0 {
            return cols;
        }
        cols.as_mut_slice()
            .par_chunks_mut(patch)
            .enumerate()
            .for_each(|(h_index, dst)| {
                let batch = h_index / block;
                let left = h_index % block;
                let oy = left / self.out_shape.width;
                let ox = left % self.out_shape.width;
                let src = input.row(batch);
                let mut ptr = 0;
                for ky in 0..self.kernel {
                    for kx in 0..self.kernel {
                        if let Some((iy, ix)) = self.source_pixel(oy, ox, ky, kx) {
                            let base = self.in_shape.index(iy, ix, 0);
                            dst[ptr..ptr + in_channels]
                                .copy_from_slice(&src[base..base + in_channels]);
                        }
                        ptr += in_channels;
                    }
                }
            });
        cols
    }

    // BH'W'*(k*k*C) => B*HWC, summing overlapping taps
    pub fn col2im(&self, d_cols: &Matrix, h: usize) -> Matrix {
        let block = self.out_shape.pixels();
        let in_channels = self.in_shape.channels;
        let mut ret = Matrix::new(h, self.in_shape.len());
        if self.in_shape.is_empty() {
            return ret;
        }
        ret.as_mut_slice()
            .par_chunks_mut(self.in_shape.len())
            .enumerate()
            .for_each(|(batch, dst)| {
                for left in 0..block {
                    let oy = left / self.out_shape.width;
                    let ox = left % self.out_shape.width;
                    let src = d_cols.row(batch * block + left);
                    let mut ptr = 0;
                    for ky in 0..self.kernel {
                        for kx in 0..self.kernel {
                            if let Some((iy, ix)) = self.source_pixel(oy, ox, ky, kx) {
                                let base = self.in_shape.index(iy, ix, 0);
                                dst[base..base + in_channels]
                                    .iter_mut()
                                    .zip(src[ptr..ptr + in_channels].iter())
                                    .for_each(|(d, s)| *d += s);
                            }
                            ptr += in_channels;
                        }
                    }
                }
            });
        ret
    }
}

impl nn_trait::Layer for Conv2d {
    fn forward(&mut self, input: Matrix) -> Matrix {
        assert_eq!(
            input.number_of_col(),
            self.in_shape.len(),
            "conv input does not match {}",
            self.in_shape
        );
        let h = input.number_of_row();
        self.cols = self.im2col(&input);
        let mut res = self.cols.mul(&self.weight.value);
        res.add_with_vector(&self.bias.value);
        // rows are ordered (batch, y, x) so this is already B*H'W'C
        res.reshape(h, self.out_shape.len())
    }

    fn backward(&mut self, d_loss: Matrix) -> Matrix {
        let h = d_loss.number_of_row();
        let split_loss = d_loss.reshape(h * self.out_shape.pixels(), self.out_shape.channels);
        self.bias.grad = split_loss.sum_rows();
        self.weight.grad = self.cols.T().mul(&split_loss);
        let d_cols = split_loss.mul(&self.weight.value.T());
        self.col2im(&d_cols, h)
    }

    fn output_shape(&self) -> Shape {
        self.out_shape
    }

    fn update_parameters(&mut self, optimizer: &dyn Optimizer) {
        optimizer.step(&mut self.weight);
        optimizer.step(&mut self.bias);
    }

    fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}
