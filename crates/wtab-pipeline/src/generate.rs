//! Sample generation for one language
//!
//! Partitions the table records, fans the chunks out through a [`Dispatch`],
//! merges the per-chunk error streams and derives the sample count from the
//! files on disk, so crashed workers never inflate it.

use crate::archive::compress_folder;
use crate::chunk::{partition, ChunkRange};
use crate::error::{PipelineError, Result};
use crate::pool::Dispatch;
use crate::store::{count_lines, count_samples, merge_error_streams, merged_error_path};
use crate::worker::ChunkJob;
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use wtab_render::RenderSettings;

/// Split name used when none is given
pub const DEFAULT_SPLIT: &str = "train";

/// Packing of the language folder after generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressRequest {
    pub output: PathBuf,
    pub delete_original: bool,
}

/// One language's generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Table-record file of the language
    pub input: PathBuf,
    /// Language folder; samples go to `<lang_dir>/<split>/`
    pub lang_dir: PathBuf,
    pub split: String,
    /// Records to process; all of them when `None`
    pub range: Option<ChunkRange>,
    pub workers: usize,
    pub render: RenderSettings,
    pub debug_dir: Option<PathBuf>,
    pub compress: Option<CompressRequest>,
}

impl GenerateRequest {
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, lang_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            lang_dir: lang_dir.into(),
            split: DEFAULT_SPLIT.to_string(),
            range: None,
            workers: 1,
            render: RenderSettings::default(),
            debug_dir: None,
            compress: None,
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.lang_dir.join(&self.split)
    }

    #[must_use]
    pub fn errors_dir(&self) -> PathBuf {
        self.lang_dir.join("errors")
    }

    fn jobs(&self, chunks: &[ChunkRange]) -> Vec<ChunkJob> {
        chunks
            .iter()
            .map(|&range| ChunkJob {
                input: self.input.clone(),
                errors_dir: self.errors_dir(),
                output_dir: self.output_dir(),
                split: self.split.clone(),
                range,
                render: self.render.clone(),
                debug_dir: self.debug_dir.clone(),
            })
            .collect()
    }
}

/// What one language run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    /// Pages and tables read by the chunks that completed
    pub pages: usize,
    pub tables: usize,
    /// Sample pairs found in the output directory
    pub images: usize,
    /// Records in the merged error stream
    pub errors: usize,
    pub failed_chunks: Vec<ChunkRange>,
    pub elapsed: Duration,
    /// Archive written, when compression was requested
    pub archive: Option<PathBuf>,
}

/// Generate samples for one language.
///
/// Failed chunks are logged and listed in the summary; the remaining chunks
/// still count. Compression is skipped when any chunk failed so that a rerun
/// can still see the partial output.
///
/// # Errors
///
/// Invalid range, unreadable input, or I/O errors while merging, counting or
/// packing.
pub fn generate(request: &GenerateRequest, dispatch: &impl Dispatch) -> Result<GenerateSummary> {
    let started = Instant::now();
    let output_dir = request.output_dir();
    let errors_dir = request.errors_dir();
    fs::create_dir_all(&output_dir)?;
    fs::create_dir_all(&errors_dir)?;

    let range = match request.range {
        Some(range) if range.start > range.end => {
            return Err(PipelineError::InvalidRange {
                start: range.start,
                end: range.end,
            })
        }
        Some(range) => range,
        None => ChunkRange::new(0, count_lines(&request.input)?),
    };
    let chunks = partition(range, request.workers);
    info!(
        "{}: {} records in {} chunks",
        request.input.display(),
        range.len(),
        chunks.len()
    );

    let (mut pages, mut tables) = (0, 0);
    let mut failed_chunks = Vec::new();
    for outcome in dispatch.run(&request.jobs(&chunks)) {
        match outcome.result {
            Ok(report) => {
                pages += report.pages;
                tables += report.tables;
            }
            Err(e) => {
                error!("chunk {} failed: {e}", outcome.range);
                failed_chunks.push(outcome.range);
            }
        }
    }
    failed_chunks.sort();

    let errors = merge_error_streams(&errors_dir)?;
    let images = count_samples(&output_dir)?;
    info!(
        "{}: {pages} pages, {tables} tables, {images} images, {errors} errors in {:.2}s ({})",
        request.lang_dir.display(),
        started.elapsed().as_secs_f64(),
        merged_error_path(&errors_dir).display()
    );

    let archive = match &request.compress {
        Some(_) if !failed_chunks.is_empty() => {
            warn!(
                "{} chunk(s) failed, leaving {} uncompressed",
                failed_chunks.len(),
                request.lang_dir.display()
            );
            None
        }
        Some(compress) => {
            compress_folder(&request.lang_dir, &compress.output, compress.delete_original)?;
            Some(compress.output.clone())
        }
        None => None,
    };

    Ok(GenerateSummary {
        pages,
        tables,
        images,
        errors,
        failed_chunks,
        elapsed: started.elapsed(),
        archive,
    })
}

/// Default archive location for a language folder: `<lang_dir>.tar.bz2`.
#[must_use]
pub fn archive_path(lang_dir: &Path) -> PathBuf {
    let mut name = lang_dir.as_os_str().to_owned();
    name.push(".tar.bz2");
    PathBuf::from(name)
}
