//! Part planning for files larger than the upload limit.
//!
//! Pure computation, no file I/O is performed. `file_tools::split_file`
//! materialises the planned parts on disk.

use serde::Serialize;

/// A contiguous byte range of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Zero-based position; part files are named with `index + 1`.
    pub index: u32,
    pub offset: u64,
    pub size: u64,
}

/// Plan the part layout for a file of the given size.
///
/// Parts are contiguous, never overlap and cover `[0, file_size)`.
/// A zero `part_size` yields a single part spanning the whole file.
pub fn plan_parts(file_size: u64, part_size: u64) -> Vec<Part> {
    if file_size == 0 {
        return Vec::new();
    }
    let part_size = if part_size == 0 { file_size } else { part_size };

    let mut parts = Vec::new();
    let mut offset: u64 = 0;
    let mut index: u32 = 0;

    while offset < file_size {
        let size = std::cmp::min(part_size, file_size - offset);
        parts.push(Part {
            index,
            offset,
            size,
        });
        offset += size;
        index += 1;
    }

    parts
}

/// `<file_name>.part<N>`, numbered from 1.
pub fn part_file_name(file_name: &str, part: &Part) -> String {
    format!("{}.part{}", file_name, part.index + 1)
}
