use crate::utils::error::{Error, Result};
use crate::utils::misc::round_half_even;
use crate::utils::nn_trait::DataSet;
use crate::utils::shape::Shape;
use image::imageops::FilterType;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

/// Decoded, resized images stored as HWC floats in `[0, 1]`.
pub struct FlowerData {
    image: Vec<f32>,
    gt: Vec<usize>,
    shape: Shape,
}

/// Train/validation halves of an image-folder dataset plus its class names.
pub struct FlowerSplit {
    pub categories: Vec<String>,
    pub train: FlowerData,
    pub val: FlowerData,
}

impl FlowerData {
    pub fn new(shape: Shape) -> Self {
        Self {
            image: Vec::new(),
            gt: Vec::new(),
            shape,
        }
    }

    /// Builds a dataset from already decoded samples.
    pub fn from_samples(shape: Shape, samples: Vec<(Vec<f32>, usize)>) -> Result<Self> {
        let mut data = Self::new(shape);
        for (image, label) in samples {
            if image.len() != shape.len() {
                return Err(Error::Data(format!(
                    "sample with {} values does not match {shape}",
                    image.len()
                )));
            }
            data.image.extend_from_slice(&image);
            data.gt.push(label);
        }
        Ok(data)
    }

    /// Loads `root/<category>/<image>` folders and splits every category:
    /// the first `round(val_ratio * n)` files (by name) go to validation,
    /// the rest to training.
    pub fn load(root: &Path, image_size: usize, val_ratio: f64) -> Result<FlowerSplit> {
        let categories = scan_categories(root)?;
        if categories.is_empty() {
            return Err(Error::EmptyDataset(format!(
                "no category directories under {}",
                root.display()
            )));
        }
        info!(?categories, "found categories");

        let shape = Shape::new(image_size, image_size, 3);
        let mut train = Vec::new();
        let mut val = Vec::new();
        for (label, category) in categories.iter().enumerate() {
            let files = list_images(&root.join(category))?;
            let ratio = round_half_even(val_ratio * files.len() as f64).min(files.len());
            info!(
                category = %category,
                total = files.len(),
                train = files.len() - ratio,
                validation = ratio,
                "category split"
            );
            let (val_files, train_files) = files.split_at(ratio);
            val.extend(val_files.iter().map(|f| (f.clone(), label)));
            train.extend(train_files.iter().map(|f| (f.clone(), label)));
        }

        let train = Self::decode_all(shape, train)?;
        let val = Self::decode_all(shape, val)?;
        info!(
            train_samples = train.len(),
            val_samples = val.len(),
            %shape,
            "dataset decoded"
        );
        Ok(FlowerSplit {
            categories,
            train,
            val,
        })
    }

    fn decode_all(shape: Shape, files: Vec<(PathBuf, usize)>) -> Result<Self> {
        let samples = files
            .into_par_iter()
            .map(|(path, label)| read_img(&path, shape.height).map(|img| (img, label)))
            .collect::<Result<Vec<_>>>()?;
        Self::from_samples(shape, samples)
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn labels(&self) -> &[usize] {
        &self.gt
    }
}

impl DataSet for FlowerData {
    fn dim(&self) -> usize {
        self.shape.len()
    }

    fn len(&self) -> usize {
        self.gt.len()
    }

    fn is_empty(&self) -> bool {
        self.gt.is_empty()
    }

    fn fetch_item(&self, idx: usize) -> (&[f32], usize) {
        if idx >= self.len() {
            panic!("fetch item with incorrect idx");
        }
        let dim = self.dim();
        (&self.image[idx * dim..(idx + 1) * dim], self.gt[idx])
    }
}

/// Sub-directories of `root`, sorted by name. The position is the label.
pub fn scan_categories(root: &Path) -> Result<Vec<String>> {
    let mut categories = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            categories.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    categories.sort();
    Ok(categories)
}

/// Image files directly inside `dir`, sorted by name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_image {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Decodes `path` as RGB, resizes to `img_size x img_size` (bilinear) and
/// scales to `[0, 1]`, HWC order.
pub fn read_img(path: &Path, img_size: usize) -> Result<Vec<f32>> {
    let img = image::open(path).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let img = img
        .resize_exact(img_size as u32, img_size as u32, FilterType::Triangle)
        .to_rgb8();
    Ok(img.as_raw().iter().map(|v| *v as f32 / 255.0).collect())
}
