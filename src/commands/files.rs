//! Local file commands and path resolution.
//!
//! Resolves user-supplied paths into a flat list of file entries. Directories
//! contribute their files (recursively on request). Hidden files and known
//! system files are filtered out.

use std::path::{Path, PathBuf};

use clap::Args;

use crate::commands::AppState;
use crate::error::AppError;
use crate::models::file::FileEntry;
use crate::services::file_tools::{self, HashAlgo};

/// System file names that should be filtered out regardless of location.
const SYSTEM_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Directory names that should be skipped during recursive traversal.
const SYSTEM_DIRS: &[&str] = &["__MACOSX"];

#[derive(Debug, Args)]
pub struct SplitArgs {
    pub path: PathBuf,
    /// Part size, e.g. `1900M`, `49M`, `500K` or plain bytes.
    #[arg(long, short = 's', value_parser = parse_size)]
    pub size: u64,
    /// Output directory; defaults to `split/` next to the file.
    #[arg(long, short = 'o')]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CombineArgs {
    /// Part files, joined in the order given.
    #[arg(required = true)]
    pub parts: Vec<PathBuf>,
    /// Output file; defaults to the parts' base name.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Parse `123`, `500K`, `49M`, `1.5G` (binary units) into bytes.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let s = input.trim();
    let (number, multiplier) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => {
            let multiplier: u64 = match c.to_ascii_uppercase() {
                'K' => 1 << 10,
                'M' => 1 << 20,
                'G' => 1 << 30,
                'B' => 1,
                _ => return Err(format!("unknown size unit in '{}'", input)),
            };
            (&s[..i], multiplier)
        }
        _ => (s, 1),
    };
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid size '{}'", input))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid size '{}'", input));
    }
    Ok((value * multiplier as f64) as u64)
}

/// Returns true if the given file/directory name should be excluded.
fn is_hidden_or_system(name: &str) -> bool {
    name.starts_with('.') || SYSTEM_FILES.contains(&name) || SYSTEM_DIRS.contains(&name)
}

/// Adds a single file entry without filtering (used for user-provided top-level paths).
fn add_file_entry(path: &Path, entries: &mut Vec<FileEntry>) -> Result<(), AppError> {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return Ok(()),
    };
    let metadata = std::fs::metadata(path)?;
    entries.push(FileEntry {
        file_name: name.to_string(),
        file_path: path.to_string_lossy().to_string(),
        file_size: metadata.len(),
    });
    Ok(())
}

/// Collects file entries from a directory, descending into subdirectories
/// when `recursive` is set. Children are visited in name order.
///
/// Hidden and system files/directories are filtered out during traversal.
/// This is only applied to children discovered here, not to user-provided
/// top-level paths.
fn collect_dir_contents(
    dir: &Path,
    recursive: bool,
    entries: &mut Vec<FileEntry>,
) -> Result<(), AppError> {
    let mut children = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        children.push(entry?.path());
    }
    children.sort();
    for child in children {
        let name = match child.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if is_hidden_or_system(name) {
            continue;
        }
        if child.is_file() {
            add_file_entry(&child, entries)?;
        } else if recursive && child.is_dir() {
            collect_dir_contents(&child, recursive, entries)?;
        }
    }
    Ok(())
}

/// Resolves file/directory paths into a flat list of file entries.
///
/// - Regular files are returned directly, in argument order.
/// - Directories contribute their files; subdirectories only when `recursive`.
/// - Hidden files (names starting with `.`) and system files
///   (`.DS_Store`, `Thumbs.db`, `desktop.ini`, `__MACOSX`) are filtered out.
/// - Returns an error if any path does not exist.
pub async fn resolve_paths(
    paths: Vec<PathBuf>,
    recursive: bool,
) -> crate::error::Result<Vec<FileEntry>> {
    tokio::task::spawn_blocking(move || resolve_paths_inner(&paths, recursive))
        .await
        .map_err(|e| AppError::Internal(format!("Path resolution task failed: {}", e)))?
}

fn resolve_paths_inner(paths: &[PathBuf], recursive: bool) -> crate::error::Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(AppError::Io(format!(
                "Path does not exist: {}",
                path.display()
            )));
        }
        if path.is_file() {
            add_file_entry(path, &mut entries)?;
        } else if path.is_dir() {
            collect_dir_contents(path, recursive, &mut entries)?;
        }
    }
    Ok(entries)
}

pub async fn hash(path: &Path, algo: HashAlgo, state: &AppState) -> crate::error::Result<()> {
    let chunk_size = state.config()?.effective_chunk_size();
    let digests = file_tools::hash_file(path, algo, chunk_size).await?;
    if let Some(sha256) = &digests.sha256 {
        println!("SHA256  {}  {}", sha256, path.display());
    }
    if let Some(md5) = &digests.md5 {
        println!("MD5     {}  {}", md5, path.display());
    }
    Ok(())
}

pub async fn convert(path: &Path, output: Option<&Path>) -> crate::error::Result<()> {
    let dest = file_tools::convert_to_jpeg(path, output).await?;
    println!("{}", dest.display());
    Ok(())
}

pub async fn split(args: SplitArgs, state: &AppState) -> crate::error::Result<()> {
    let chunk_size = state.config()?.effective_chunk_size();
    let out_dir = match args.out_dir {
        Some(dir) => dir,
        None => args
            .path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("split"),
    };
    let parts = file_tools::split_file(&args.path, &out_dir, args.size, chunk_size).await?;
    for part in &parts {
        println!("{}", part.display());
    }
    Ok(())
}

/// Output path for `combine` when none is given: the shared base name.
fn default_output(parts: &[PathBuf]) -> crate::error::Result<PathBuf> {
    let groups = file_tools::group_parts(parts);
    match (groups.len(), groups.into_keys().next()) {
        (1, Some(base)) => Ok(base),
        _ => Err(AppError::InvalidInput(
            "Cannot derive an output name from these parts; pass --output".into(),
        )),
    }
}

pub async fn combine(args: CombineArgs) -> crate::error::Result<()> {
    let output = match args.output {
        Some(output) => output,
        None => default_output(&args.parts)?,
    };
    let written = file_tools::combine_files(&args.parts, &output).await?;
    println!("{} ({} bytes)", output.display(), written);
    Ok(())
}

pub async fn info(path: &Path) -> crate::error::Result<()> {
    let info = file_tools::file_info(path).await?;
    println!("Name:     {}", info.name);
    println!("Path:     {}", info.path);
    println!(
        "Size:     {} bytes ({:.2} KB, {:.2} MB)",
        info.size,
        info.size_kb(),
        info.size_mb()
    );
    if let Some(created) = &info.created {
        println!("Created:  {}", created);
    }
    if let Some(modified) = &info.modified {
        println!("Modified: {}", modified);
    }
    Ok(())
}
