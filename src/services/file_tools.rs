//! Local file utilities: hashing, splitting, combining and inspection.
//!
//! All file I/O runs under `spawn_blocking` to keep the runtime responsive.

use std::collections::BTreeMap;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use md5::Md5;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::services::chunk_manager;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub created: Option<String>,
    pub modified: Option<String>,
}

impl FileInfo {
    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.0
    }

    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }
}

async fn blocking<T, F>(work: F) -> crate::error::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("spawn_blocking join error: {}", e)))?
}

fn require_file(path: &Path) -> crate::error::Result<std::fs::Metadata> {
    let metadata = std::fs::metadata(path)
        .map_err(|_| AppError::Io(format!("File does not exist: {}", path.display())))?;
    if !metadata.is_file() {
        return Err(AppError::InvalidInput(format!(
            "Not a regular file: {}",
            path.display()
        )));
    }
    Ok(metadata)
}

/// Digest selection for [`hash_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgo {
    #[default]
    Sha256,
    Md5,
    Both,
}

impl FromStr for HashAlgo {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(HashAlgo::Sha256),
            "md5" => Ok(HashAlgo::Md5),
            "both" => Ok(HashAlgo::Both),
            other => Err(AppError::InvalidInput(format!(
                "Unknown hash algorithm '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDigests {
    pub sha256: Option<String>,
    pub md5: Option<String>,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Hex digests of a file, read once in `chunk_size` blocks.
pub async fn hash_file(
    path: &Path,
    algo: HashAlgo,
    chunk_size: usize,
) -> crate::error::Result<FileDigests> {
    let path = path.to_path_buf();
    blocking(move || {
        require_file(&path)?;
        let mut file = std::fs::File::open(&path)?;
        let mut sha256 = matches!(algo, HashAlgo::Sha256 | HashAlgo::Both).then(Sha256::new);
        let mut md5 = matches!(algo, HashAlgo::Md5 | HashAlgo::Both).then(Md5::new);
        let mut buf = vec![0u8; chunk_size.max(1)];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            if let Some(hasher) = sha256.as_mut() {
                hasher.update(&buf[..n]);
            }
            if let Some(hasher) = md5.as_mut() {
                hasher.update(&buf[..n]);
            }
        }
        Ok(FileDigests {
            sha256: sha256.map(|h| hex(&h.finalize())),
            md5: md5.map(|h| hex(&h.finalize())),
        })
    })
    .await
}

/// Re-encode an image as JPEG. Transparency is dropped.
///
/// The output defaults to `<stem>.jpg` beside the source and is never
/// overwritten.
pub async fn convert_to_jpeg(path: &Path, dest: Option<&Path>) -> crate::error::Result<PathBuf> {
    let path = path.to_path_buf();
    let dest = match dest {
        Some(dest) => dest.to_path_buf(),
        None => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .ok_or_else(|| {
                    AppError::InvalidInput(format!("No file name in {}", path.display()))
                })?;
            path.with_file_name(format!("{}.jpg", stem))
        }
    };
    blocking(move || {
        require_file(&path)?;
        if dest.exists() {
            return Err(AppError::InvalidInput(format!(
                "Output already exists: {}",
                dest.display()
            )));
        }
        let img = image::open(&path).map_err(|e| {
            AppError::InvalidInput(format!("Cannot read image {}: {}", path.display(), e))
        })?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        img.to_rgb8()
            .save_with_format(&dest, image::ImageFormat::Jpeg)
            .map_err(|e| AppError::Io(format!("Cannot write {}: {}", dest.display(), e)))?;
        log::info!("Converted {} to {}", path.display(), dest.display());
        Ok(dest)
    })
    .await
}

/// Split `path` into `<name>.part<N>` files of at most `part_size` bytes in `out_dir`.
pub async fn split_file(
    path: &Path,
    out_dir: &Path,
    part_size: u64,
    chunk_size: usize,
) -> crate::error::Result<Vec<PathBuf>> {
    if part_size == 0 {
        return Err(AppError::InvalidInput(
            "Part size must be greater than 0".into(),
        ));
    }
    let path = path.to_path_buf();
    let out_dir = out_dir.to_path_buf();
    blocking(move || {
        let metadata = require_file(&path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid file name: {}", path.display())))?
            .to_string();
        std::fs::create_dir_all(&out_dir)?;

        let mut source = std::fs::File::open(&path)?;
        let mut outputs = Vec::new();
        for part in chunk_manager::plan_parts(metadata.len(), part_size) {
            let target = out_dir.join(chunk_manager::part_file_name(&file_name, &part));
            source.seek(SeekFrom::Start(part.offset))?;
            let mut writer =
                BufWriter::with_capacity(chunk_size.max(1), std::fs::File::create(&target)?);
            let copied = std::io::copy(&mut (&mut source).take(part.size), &mut writer)?;
            writer.flush()?;
            if copied != part.size {
                return Err(AppError::Io(format!(
                    "Short read while splitting {}: expected {} bytes, got {}",
                    path.display(),
                    part.size,
                    copied
                )));
            }
            outputs.push(target);
        }
        log::info!("Split {} into {} parts", path.display(), outputs.len());
        Ok(outputs)
    })
    .await
}

/// Concatenate `parts` in the given order into `dest`. Returns the bytes written.
pub async fn combine_files(parts: &[PathBuf], dest: &Path) -> crate::error::Result<u64> {
    if parts.is_empty() {
        return Err(AppError::InvalidInput("No part files given".into()));
    }
    let parts = parts.to_vec();
    let dest = dest.to_path_buf();
    blocking(move || {
        for part in &parts {
            require_file(part)?;
        }
        if dest.exists() {
            return Err(AppError::InvalidInput(format!(
                "Output already exists: {}",
                dest.display()
            )));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(std::fs::File::create(&dest)?);
        let mut total: u64 = 0;
        for part in &parts {
            let mut reader = std::fs::File::open(part)?;
            total += std::io::copy(&mut reader, &mut writer)?;
        }
        writer.flush()?;
        log::info!("Combined {} parts into {}", parts.len(), dest.display());
        Ok(total)
    })
    .await
}

/// Split `name.part<N>` into `(name, N)`.
pub fn parse_part_name(file_name: &str) -> Option<(&str, u32)> {
    let (base, number) = file_name.rsplit_once(".part")?;
    if base.is_empty() || number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((base, number.parse().ok()?))
}

/// Group part files by their base name, each group sorted by part number.
/// Paths that are not part files are ignored.
pub fn group_parts(paths: &[PathBuf]) -> BTreeMap<PathBuf, Vec<PathBuf>> {
    let mut numbered: BTreeMap<PathBuf, Vec<(u32, PathBuf)>> = BTreeMap::new();
    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((base, number)) = parse_part_name(name) {
            numbered
                .entry(path.with_file_name(base))
                .or_default()
                .push((number, path.clone()));
        }
    }
    numbered
        .into_iter()
        .map(|(base, mut parts)| {
            parts.sort_by_key(|(n, _)| *n);
            (base, parts.into_iter().map(|(_, p)| p).collect())
        })
        .collect()
}

pub async fn file_info(path: &Path) -> crate::error::Result<FileInfo> {
    let path = path.to_path_buf();
    blocking(move || {
        let metadata = require_file(&path)?;
        let absolute = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        let format_time = |t: std::io::Result<std::time::SystemTime>| {
            t.ok().map(|t| {
                chrono::DateTime::<chrono::Local>::from(t)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
        };
        Ok(FileInfo {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: absolute.to_string_lossy().to_string(),
            size: metadata.len(),
            created: format_time(metadata.created()),
            modified: format_time(metadata.modified()),
        })
    })
    .await
}
