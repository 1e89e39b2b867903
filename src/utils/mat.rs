use rayon::prelude::*;
use std::fmt::Formatter;

/// Row-major dense f32 matrix.
///
/// Rows are batch samples (or im2col patches), columns are the flattened
/// per-sample features.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f32>,
    row: usize,
    col: usize,
}

impl Matrix {
    pub fn null() -> Self {
        Matrix {
            data: Vec::new(),
            row: 0,
            col: 0,
        }
    }

    pub fn new(n: usize, m: usize) -> Self {
        Matrix {
            data: vec![0.0; n * m],
            row: n,
            col: m,
        }
    }

    pub fn from_vec(n: usize, m: usize, data: Vec<f32>) -> Self {
        if data.len() != n * m {
            panic!(
                "from_vec with {} values for a [{}, {}] matrix",
                data.len(),
                n,
                m
            );
        }
        Matrix { data, row: n, col: m }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_empty() && self.row == 0
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn number_of_row(&self) -> usize {
        self.row
    }

    pub fn number_of_col(&self) -> usize {
        self.col
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn row(&self, i: usize) -> &[f32] {
        if i >= self.row {
            panic!("matrix visit row over bound");
        }
        &self.data[i * self.col..(i + 1) * self.col]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        if i >= self.row {
            panic!("matrix visit row over bound");
        }
        &mut self.data[i * self.col..(i + 1) * self.col]
    }

    pub fn at(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.col + j]
    }

    pub fn set(&mut self, i: usize, j: usize, val: f32) {
        self.data[i * self.col + j] = val;
    }

    /// Reinterprets the buffer with a new shape holding the same number of values.
    pub fn reshape(self, n: usize, m: usize) -> Matrix {
        if n * m != self.row * self.col {
            panic!(
                "call reshape from [{}, {}] to [{}, {}]",
                self.row, self.col, n, m
            );
        }
        Matrix {
            data: self.data,
            row: n,
            col: m,
        }
    }

    pub fn add_with_vector(&mut self, rhs: &Matrix) {
        if rhs.row != 1 || self.col != rhs.col {
            panic!("call add_with_vector with unmatched matrix shape");
        }
        let col = self.col;
        if col == 0 {
            return;
        }
        self.data.par_chunks_mut(col).for_each(|dst| {
            dst.iter_mut().zip(rhs.data.iter()).for_each(|(a, b)| *a += b);
        });
    }

    pub fn add(&mut self, rhs: &Matrix) {
        if self.row != rhs.row || self.col != rhs.col {
            panic!("call add with unmatched matrix shape");
        }
        self.data
            .par_iter_mut()
            .zip(rhs.data.par_iter())
            .for_each(|(a, b)| *a += b);
    }

    pub fn mul_with_numeric(&mut self, rhs: f32) {
        self.data.par_iter_mut().for_each(|a| *a *= rhs);
    }

    pub fn fill_(&mut self, val: f32) {
        self.data.par_iter_mut().for_each(|a| *a = val);
    }

    pub fn clamp(&mut self, lo: f32, hi: f32) {
        self.data.par_iter_mut().for_each(|a| *a = a.max(lo).min(hi));
    }

    pub fn mul(&self, rhs: &Matrix) -> Matrix {
        if self.col != rhs.row {
            panic!("call mul with unmatched matrix shape");
        }
        let mut ret = Matrix::new(self.row, rhs.col);
        if rhs.col == 0 || self.row == 0 {
            return ret;
        }
        let inner = self.col;
        let out_col = rhs.col;
        ret.data
            .par_chunks_mut(out_col)
            .enumerate()
            .for_each(|(i, dst)| {
                let lhs = &self.data[i * inner..(i + 1) * inner];
                for (k, &a) in lhs.iter().enumerate() {
                    if a == 0.0 {
                        continue;
                    }
                    let src = &rhs.data[k * out_col..(k + 1) * out_col];
                    dst.iter_mut().zip(src.iter()).for_each(|(d, s)| *d += a * s);
                }
            });
        ret
    }

    pub fn T(&self) -> Matrix {
        let mut ret = Matrix::new(self.col, self.row);
        if self.row == 0 || self.col == 0 {
            return ret;
        }
        let row = self.row;
        let col = self.col;
        ret.data.par_chunks_mut(row).enumerate().for_each(|(j, dst)| {
            for (i, d) in dst.iter_mut().enumerate() {
                *d = self.data[i * col + j];
            }
        });
        ret
    }

    /// Column sums as a `[1, col]` matrix.
    pub fn sum_rows(&self) -> Matrix {
        let mut ret = Matrix::new(1, self.col);
        for i in 0..self.row {
            ret.data
                .iter_mut()
                .zip(self.row(i).iter())
                .for_each(|(a, b)| *a += b);
        }
        ret
    }

    pub fn argmax_rows(&self) -> Vec<usize> {
        (0..self.row)
            .into_par_iter()
            .map(|idx| {
                let src_row = self.row(idx);
                (1..self.col)
                    .map(|i| (i, src_row[i]))
                    .fold((0, src_row[0]), |a, b| if a.1 < b.1 { b } else { a })
                    .0
            })
            .collect()
    }
}

impl std::fmt::Display for Matrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Matrix Sized [{}, {}]\n", self.row, self.col))?;
        for i in 0..self.row {
            for j in 0..self.col {
                f.write_fmt(format_args!("{:.2}", self.at(i, j)))?;
                if j + 1 == self.col {
                    f.write_str("\n")?;
                } else {
                    f.write_str(" ")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_matches_hand_computed_product() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = Matrix::from_vec(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        let c = a.mul(&b);
        assert_eq!(c.shape(), (2, 2));
        assert_eq!(c.as_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn transpose_swaps_indices() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let t = a.T();
        assert_eq!(t.shape(), (3, 2));
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(a.at(i, j), t.at(j, i));
            }
        }
    }

    #[test]
    fn broadcast_add_and_column_sums() {
        let mut a = Matrix::new(3, 2);
        a.add_with_vector(&Matrix::from_vec(1, 2, vec![1.0, -2.0]));
        assert_eq!(a.sum_rows().as_slice(), &[3.0, -6.0]);
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        let a = Matrix::from_vec(2, 3, vec![0.1, 0.7, 0.7, 5.0, -1.0, 2.0]);
        assert_eq!(a.argmax_rows(), vec![1, 0]);
    }

    #[test]
    fn clamp_bounds_values() {
        let mut a = Matrix::from_vec(1, 3, vec![-500.0, 0.5, 500.0]);
        a.clamp(-100.0, 100.0);
        assert_eq!(a.as_slice(), &[-100.0, 0.5, 100.0]);
    }

    #[test]
    #[should_panic(expected = "unmatched")]
    fn mul_rejects_bad_shapes() {
        Matrix::new(2, 3).mul(&Matrix::new(2, 3));
    }
}
