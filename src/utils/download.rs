use crate::utils::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const FLOWER_PHOTOS_URL: &str =
    "https://storage.googleapis.com/download.tensorflow.org/example_images/flower_photos.tgz";

/// Last path segment of `url`, e.g. `flower_photos.tgz`.
pub fn archive_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Directory an archive unpacks to: its file name without `.tgz` / `.tar.gz`.
pub fn extracted_dir_name(url: &str) -> &str {
    let name = archive_name(url);
    name.strip_suffix(".tgz")
        .or_else(|| name.strip_suffix(".tar.gz"))
        .unwrap_or(name)
}

/// Downloads and unpacks the gzip tarball at `url` into `root`, returning
/// the extracted directory. Nothing is fetched when it already exists.
pub fn download_and_extract(url: &str, root: &Path) -> Result<PathBuf> {
    let dir_name = extracted_dir_name(url);
    let target = root.join(dir_name);
    if target.is_dir() {
        info!(path = %target.display(), "dataset already present, skipping download");
        return Ok(target);
    }
    fs::create_dir_all(root)?;

    let archive = root.join(archive_name(url));
    if !archive.is_file() {
        info!(%url, path = %archive.display(), "downloading archive");
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;
        let mut response = client.get(url).send()?.error_for_status()?;
        let partial = archive.with_extension("part");
        let mut file = File::create(&partial)?;
        let bytes = response.copy_to(&mut file)?;
        fs::rename(&partial, &archive)?;
        debug!(bytes, "download finished");
    }

    let target = unpack_into_place(&archive, root, dir_name)?;
    info!(path = %target.display(), "archive extracted");
    Ok(target)
}

/// Unpacks `archive` into a staging directory next to `root/dir_name` and
/// renames the result into place, so an interrupted run never leaves a
/// partial dataset under the final name.
pub fn unpack_into_place(archive: &Path, root: &Path, dir_name: &str) -> Result<PathBuf> {
    let staging = root.join(format!("{dir_name}.partial"));
    if staging.exists() {
        debug!(path = %staging.display(), "removing stale staging directory");
        fs::remove_dir_all(&staging)?;
    }
    extract_tar_gz(archive, &staging)?;
    let extracted = staging.join(dir_name);
    if !extracted.is_dir() {
        fs::remove_dir_all(&staging)?;
        return Err(Error::Data(format!(
            "{} does not contain a {dir_name} directory",
            archive.display()
        )));
    }
    let target = root.join(dir_name);
    fs::rename(&extracted, &target)?;
    fs::remove_dir_all(&staging)?;
    Ok(target)
}

pub fn extract_tar_gz(archive: &Path, root: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.unpack(root)?;
    Ok(())
}
