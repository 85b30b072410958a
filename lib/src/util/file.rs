use std::{
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use memmap2::{Mmap, MmapOptions};

/// Opens a memory mapped file.
pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Mmap> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open file '{}'", path.display()))?;
    let map = unsafe { MmapOptions::new().map(&file) }
        .with_context(|| format!("Failed to mmap file '{}'", path.display()))?;
    Ok(map)
}

/// Directory containing `path`, used to resolve paths stored relative to an object file.
pub fn source_dir<P: AsRef<Path>>(path: P) -> PathBuf {
    path.as_ref().parent().map(Path::to_path_buf).unwrap_or_default()
}
