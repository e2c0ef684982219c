//! Packing a generated dataset into a `.tar.bz2` archive

use crate::error::Result;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use log::info;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Pack `input` into a bzip2-compressed tar at `output`.
///
/// Entries are stored under the folder's own name, so `ja/train/0.png` stays
/// `ja/train/0.png` inside the archive. With `delete_original` the folder is
/// removed once the archive is complete. Returns the archive size in bytes.
///
/// # Errors
///
/// I/O errors reading the folder or writing the archive.
pub fn compress_folder(input: &Path, output: &Path, delete_original: bool) -> Result<u64> {
    let name = input
        .file_name()
        .map_or_else(|| PathBuf::from("dataset"), PathBuf::from);

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let encoder = BzEncoder::new(BufWriter::new(File::create(output)?), Compression::best());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(&name, input)?;
    let encoder = builder.into_inner()?;
    let mut writer = encoder.finish()?;
    writer.flush()?;

    let size = fs::metadata(output)?.len();
    info!("packed {} into {} ({size} bytes)", input.display(), output.display());

    if delete_original {
        fs::remove_dir_all(input)?;
    }
    Ok(size)
}
