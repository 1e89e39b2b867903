use crate::utils::error::Result;
use crate::utils::mat::Matrix;
use crate::utils::nn_trait;
use crate::utils::shape::{conv_output, Shape};
use rayon::prelude::*;

/// Max pooling without padding (floor mode). The winning input offset of
/// every output value is kept to route gradients back.
pub struct MaxPool2d {
    pub in_shape: Shape,
    pub out_shape: Shape,
    pub kernel: usize,
    pub stride: usize,
    max_index: Vec<usize>,
}

impl MaxPool2d {
    pub fn new(in_shape: Shape, kernel: usize, stride: usize) -> Result<Self> {
        let feat_row = conv_output(in_shape.height, kernel, stride, 0)?;
        let feat_col = conv_output(in_shape.width, kernel, stride, 0)?;
        Ok(Self {
            in_shape,
            out_shape: Shape::new(feat_row, feat_col, in_shape.channels),
            kernel,
            stride,
            max_index: Vec::new(),
        })
    }
}

impl nn_trait::Layer for MaxPool2d {
    fn forward(&mut self, input: Matrix) -> Matrix {
        assert_eq!(input.number_of_col(), self.in_shape.len());
        let h = input.number_of_row();
        let out_len = self.out_shape.len();
        let mut ret = Matrix::new(h, out_len);
        self.max_index = vec![0; h * out_len];
        if out_len == 0 {
            return ret;
        }
        let (in_shape, out_shape) = (self.in_shape, self.out_shape);
        let (kernel, stride) = (self.kernel, self.stride);
        ret.as_mut_slice()
            .par_chunks_mut(out_len)
            .zip(self.max_index.par_chunks_mut(out_len))
            .enumerate()
            .for_each(|(batch_index, (dst, mask))| {
                let src = input.row(batch_index);
                for oy in 0..out_shape.height {
                    for ox in 0..out_shape.width {
                        for c in 0..in_shape.channels {
                            let mut best = f32::NEG_INFINITY;
                            let mut best_idx = in_shape.index(oy * stride, ox * stride, c);
                            for ky in 0..kernel {
                                for kx in 0..kernel {
                                    let idx = in_shape.index(oy * stride + ky, ox * stride + kx, c);
                                    if src[idx] > best {
                                        best = src[idx];
                                        best_idx = idx;
                                    }
                                }
                            }
                            let o = out_shape.index(oy, ox, c);
                            dst[o] = best;
                            mask[o] = best_idx;
                        }
                    }
                }
            });
        ret
    }

    fn backward(&mut self, d_loss: Matrix) -> Matrix {
        let h = d_loss.number_of_row();
        let in_len = self.in_shape.len();
        let out_len = self.out_shape.len();
        let mut ret = Matrix::new(h, in_len);
        if in_len == 0 {
            return ret;
        }
        ret.as_mut_slice()
            .par_chunks_mut(in_len)
            .enumerate()
            .for_each(|(x, dst)| {
                let src = d_loss.row(x);
                let mask = &self.max_index[x * out_len..(x + 1) * out_len];
                for (g, &idx) in src.iter().zip(mask.iter()) {
                    dst[idx] += g;
                }
            });
        ret
    }

    fn output_shape(&self) -> Shape {
        self.out_shape
    }
}

/// Average pooling with zero padding. Padded cells count towards the
/// divisor, so every window divides by `kernel * kernel`.
pub struct AvgPool2d {
    pub in_shape: Shape,
    pub out_shape: Shape,
    pub kernel: usize,
    pub stride: usize,
    pub padding: usize,
}

impl AvgPool2d {
    pub fn new(in_shape: Shape, kernel: usize, stride: usize, padding: usize) -> Result<Self> {
        let feat_row = conv_output(in_shape.height, kernel, stride, padding)?;
        let feat_col = conv_output(in_shape.width, kernel, stride, padding)?;
        Ok(Self {
            in_shape,
            out_shape: Shape::new(feat_row, feat_col, in_shape.channels),
            kernel,
            stride,
            padding,
        })
    }

    /// In-bounds input pixels covered by the window of output `(oy, ox)`.
    fn window(&self, oy: usize, ox: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let top = (oy * self.stride) as isize - self.padding as isize;
        let left = (ox * self.stride) as isize - self.padding as isize;
        let k = self.kernel as isize;
        let (height, width) = (self.in_shape.height as isize, self.in_shape.width as isize);
        (top..top + k)
            .filter(move |y| *y >= 0 && *y < height)
            .flat_map(move |y| {
                (left..left + k)
                    .filter(move |x| *x >= 0 && *x < width)
                    .map(move |x| (y as usize, x as usize))
            })
    }
}

impl nn_trait::Layer for AvgPool2d {
    fn forward(&mut self, input: Matrix) -> Matrix {
        assert_eq!(input.number_of_col(), self.in_shape.len());
        let h = input.number_of_row();
        let out_len = self.out_shape.len();
        let mut ret = Matrix::new(h, out_len);
        if out_len == 0 {
            return ret;
        }
        let channels = self.in_shape.channels;
        let scale = 1.0 / (self.kernel * self.kernel) as f32;
        ret.as_mut_slice()
            .par_chunks_mut(out_len)
            .enumerate()
            .for_each(|(batch_index, dst)| {
                let src = input.row(batch_index);
                for oy in 0..self.out_shape.height {
                    for ox in 0..self.out_shape.width {
                        let o = self.out_shape.index(oy, ox, 0);
                        for (iy, ix) in self.window(oy, ox) {
                            let base = self.in_shape.index(iy, ix, 0);
                            dst[o..o + channels]
                                .iter_mut()
                                .zip(src[base..base + channels].iter())
                                .for_each(|(d, s)| *d += s);
                        }
                        dst[o..o + channels].iter_mut().for_each(|d| *d *= scale);
                    }
                }
            });
        ret
    }

    fn backward(&mut self, d_loss: Matrix) -> Matrix {
        let h = d_loss.number_of_row();
        let in_len = self.in_shape.len();
        let mut ret = Matrix::new(h, in_len);
        if in_len == 0 {
            return ret;
        }
        let channels = self.in_shape.channels;
        let scale = 1.0 / (self.kernel * self.kernel) as f32;
        ret.as_mut_slice()
            .par_chunks_mut(in_len)
            .enumerate()
            .for_each(|(batch_index, dst)| {
                let src = d_loss.row(batch_index);
                for oy in 0..self.out_shape.height {
                    for ox in 0..self.out_shape.width {
                        let o = self.out_shape.index(oy, ox, 0);
                        for (iy, ix) in self.window(oy, ox) {
                            let base = self.in_shape.index(iy, ix, 0);
                            dst[base..base + channels]
                                .iter_mut()
                                .zip(src[o..o + channels].iter())
                                .for_each(|(d, s)| *d += s * scale);
                        }
                    }
                }
            });
        ret
    }

    fn output_shape(&self) -> Shape {
        self.out_shape
    }
}

/// Adaptive average pooling to 1x1 followed by flatten: `B*HWC => B*C`.
pub struct GlobalAvgPool {
    pub in_shape: Shape,
}

impl GlobalAvgPool {
    pub fn new(in_shape: Shape) -> Self {
        Self { in_shape }
    }
}

impl nn_trait::Layer for GlobalAvgPool {
    fn forward(&mut self, input: Matrix) -> Matrix {
        assert_eq!(input.number_of_col(), self.in_shape.len());
        let h = input.number_of_row();
        let channels = self.in_shape.channels;
        let mut ret = Matrix::new(h, channels);
        if channels == 0 {
            return ret;
        }
        let scale = 1.0 / self.in_shape.pixels().max(1) as f32;
        ret.as_mut_slice()
            .par_chunks_mut(channels)
            .enumerate()
            .for_each(|(batch_index, dst)| {
                for pixel in input.row(batch_index).chunks(channels) {
                    dst.iter_mut().zip(pixel.iter()).for_each(|(d, s)| *d += s);
                }
                dst.iter_mut().for_each(|d| *d *= scale);
            });
        ret
    }

    fn backward(&mut self, d_loss: Matrix) -> Matrix {
        let h = d_loss.number_of_row();
        let in_len = self.in_shape.len();
        let channels = self.in_shape.channels;
        let mut ret = Matrix::new(h, in_len);
        if in_len == 0 {
            return ret;
        }
        let scale = 1.0 / self.in_shape.pixels().max(1) as f32;
        ret.as_mut_slice()
            .par_chunks_mut(in_len)
            .enumerate()
            .for_each(|(batch_index, dst)| {
                let src = d_loss.row(batch_index);
                for pixel in dst.chunks_mut(channels) {
                    pixel
                        .iter_mut()
                        .zip(src.iter())
                        .for_each(|(d, s)| *d = s * scale);
                }
            });
        ret
    }

    fn output_shape(&self) -> Shape {
        Shape::flat(self.in_shape.channels)
    }
}
