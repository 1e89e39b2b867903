use image::{Rgb, RgbImage};
use inception_net::utils::dataloader::DataLoader;
use inception_net::utils::flowers::{list_images, scan_categories, FlowerData};
use inception_net::utils::nn_trait::DataSet;
use inception_net::Error;
use std::fs;
use std::path::Path;

fn write_images(dir: &Path, count: usize, color: [u8; 3], size: u32) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        let img = RgbImage::from_pixel(size, size + i as u32, Rgb(color));
        img.save(dir.join(format!("img_{i:02}.png"))).unwrap();
    }
}

#[test]
fn categories_are_sorted_directories() {
    let temp = tempfile::tempdir().unwrap();
    fs::create_dir_all(temp.path().join("tulips")).unwrap();
    fs::create_dir_all(temp.path().join("daisy")).unwrap();
    fs::write(temp.path().join("LICENSE.txt"), "cc-by").unwrap();
    assert_eq!(
        scan_categories(temp.path()).unwrap(),
        vec!["daisy".to_string(), "tulips".to_string()]
    );
}

#[test]
fn non_image_files_are_ignored() {
    let temp = tempfile::tempdir().unwrap();
    write_images(temp.path(), 2, [1, 2, 3], 4);
    fs::write(temp.path().join("notes.md"), "x").unwrap();
    assert_eq!(list_images(temp.path()).unwrap().len(), 2);
}

#[test]
fn load_splits_each_category_and_scales_pixels() {
    let temp = tempfile::tempdir().unwrap();
    write_images(&temp.path().join("roses"), 10, [255, 0, 0], 6);
    write_images(&temp.path().join("daisy"), 4, [0, 0, 255], 9);

    let split = FlowerData::load(temp.path(), 8, 0.25).unwrap();
    assert_eq!(split.categories, vec!["daisy", "roses"]);
    // daisy: round(1.0) = 1 held out, roses: round(2.5) = 2 held out
    assert_eq!(split.val.len(), 3);
    assert_eq!(split.train.len(), 11);
    assert_eq!(split.val.labels(), &[0, 1, 1]);
    assert_eq!(split.train.dim(), 8 * 8 * 3);

    let (pixels, label) = split.train.fetch_item(split.train.len() - 1);
    assert_eq!(label, 1);
    assert!((pixels[0] - 1.0).abs() < 0.01);
    assert!(pixels[1].abs() < 0.01);
    assert!(pixels.iter().all(|v| (0.0..=1.0).contains(v)));

    let batches = DataLoader::new(&split.train, 4, true, 3).collect::<Vec<_>>();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[2].0.shape(), (3, 8 * 8 * 3));
}

#[test]
fn missing_categories_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    assert!(matches!(
        FlowerData::load(temp.path(), 8, 0.05),
        Err(Error::EmptyDataset(_))
    ));
}

#[test]
fn corrupt_image_reports_path() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("roses");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("broken.jpg"), b"not a jpeg").unwrap();
    let err = FlowerData::load(temp.path(), 8, 0.0).err().unwrap();
    assert!(err.to_string().contains("broken.jpg"));
}
