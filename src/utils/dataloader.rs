use crate::utils::mat::Matrix;
use crate::utils::misc::random_shuffle;
use crate::utils::nn_trait::DataSet;
use rayon::prelude::*;
use std::cmp::min;

/// Batches of `(images, labels)` over a dataset, optionally in a seeded
/// shuffled order. The last batch holds the remainder.
pub struct DataLoader<'a, T>
where
    T: DataSet + Sync,
{
    dataset: &'a T,
    batch_size: usize,
    count: usize,
    order: Vec<usize>,
}

impl<'a, T> DataLoader<'a, T>
where
    T: DataSet + Sync,
{
    pub fn new(dataset: &'a T, batch_size: usize, shuffle: bool, seed: u32) -> Self {
        let mut order = (0..dataset.len()).collect::<Vec<_>>();
        if shuffle {
            random_shuffle(&mut order, seed);
        }
        Self {
            dataset,
            batch_size: batch_size.max(1),
            count: 0,
            order,
        }
    }

    /// Number of batches a full pass yields.
    pub fn batch_count(&self) -> usize {
        (self.dataset.len() + self.batch_size - 1) / self.batch_size
    }

    pub fn fetch_batch(&self, start: usize, len: usize) -> (Matrix, Vec<usize>) {
        let dim = self.dataset.dim();
        let mut image = Matrix::new(len, dim);
        let mut gt = vec![0; len];
        if dim == 0 {
            return (image, gt);
        }
        image
            .as_mut_slice()
            .par_chunks_mut(dim)
            .zip(gt.par_iter_mut())
            .enumerate()
            .for_each(|(batch_idx, (to, label))| {
                let idx = self.order[start + batch_idx];
                let (fetched_image, fetched_gt) = self.dataset.fetch_item(idx);
                to.copy_from_slice(fetched_image);
                *label = fetched_gt;
            });
        (image, gt)
    }
}

impl<'a, T> Iterator for DataLoader<'a, T>
where
    T: DataSet + Sync,
{
    type Item = (Matrix, Vec<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.count >= self.dataset.len() {
            None
        } else {
            let left = self.dataset.len() - self.count;
            let sz = min(left, self.batch_size);
            let ret = Some(self.fetch_batch(self.count, sz));
            self.count += sz;
            ret
        }
    }
}
