//! Chunk worker
//!
//! Processes the table records of one index range, in index order, with a
//! renderer it owns for the whole chunk. Every record ends up in exactly one
//! place: a sample pair (`N.png` + `N.json`) in the output directory, the
//! chunk's error stream, or nowhere when the line is not a usable record.

use crate::chunk::ChunkRange;
use crate::error::{PipelineError, Result};
use crate::store::{visit_lines, JsonlWriter};
use image::RgbaImage;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Instant;
use wtab_core::{normalize_html, tokenize, LabeledSample, Rejection};
use wtab_render::{draw_boxes, Correlator, PageStyle, RenderSettings, Renderer, WebDriverRenderer};

/// Everything a worker process needs to run one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkJob {
    /// Table-record file shared read-only by all workers
    pub input: PathBuf,
    /// Directory of per-chunk error streams
    pub errors_dir: PathBuf,
    /// Directory receiving sample pairs
    pub output_dir: PathBuf,
    pub split: String,
    pub range: ChunkRange,
    pub render: RenderSettings,
    /// Where box overlays are written, when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_dir: Option<PathBuf>,
}

impl ChunkJob {
    /// `<errors_dir>/<start>_<end>.jsonl.bz2`
    #[must_use]
    pub fn error_path(&self) -> PathBuf {
        self.errors_dir.join(format!("{}.jsonl.bz2", self.range))
    }
}

/// Outcome counters of one chunk, printed by worker processes as one JSON line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReport {
    pub range: ChunkRange,
    /// Records read inside the range
    pub records: usize,
    /// Pages starting inside the range: records holding a page's first table
    pub pages: usize,
    /// Records carrying table markup
    pub tables: usize,
    pub samples: usize,
    /// Structure rejections written to the error stream
    pub rejected: usize,
    /// Render failures written to the error stream
    pub render_failures: usize,
    /// Lines skipped without an error record
    pub malformed: usize,
    pub elapsed_ms: u64,
}

impl ChunkReport {
    #[must_use]
    pub const fn errors(&self) -> usize {
        self.rejected + self.render_failures
    }
}

/// Run a chunk with a WebDriver session opened for it.
///
/// # Errors
///
/// Fatal errors only: the session cannot be started or is lost, or the
/// output cannot be written.
pub fn run_chunk(job: &ChunkJob) -> Result<ChunkReport> {
    let renderer = WebDriverRenderer::launch(&job.render)?;
    run_chunk_with(job, renderer)
}

/// Run a chunk with the given renderer; the renderer is dropped on return.
///
/// # Errors
///
/// See [`run_chunk`].
pub fn run_chunk_with<R: Renderer>(job: &ChunkJob, renderer: R) -> Result<ChunkReport> {
    let started = Instant::now();
    fs::create_dir_all(&job.output_dir)?;
    fs::create_dir_all(&job.errors_dir)?;
    if let Some(dir) = &job.debug_dir {
        fs::create_dir_all(dir)?;
    }

    let mut chunk = Chunk {
        job,
        correlator: Correlator::new(renderer, job.render.correlate_options()),
        style: job.render.page_style(),
        errors: JsonlWriter::create(job.error_path())?.flush_per_record(),
        report: ChunkReport {
            range: job.range,
            ..ChunkReport::default()
        },
    };

    let mut failure = None;
    let mut index = 0;
    visit_lines(&job.input, |line| {
        if line.trim().is_empty() {
            return ControlFlow::Continue(());
        }
        if index >= job.range.end {
            return ControlFlow::Break(());
        }
        let current = index;
        index += 1;
        if current < job.range.start {
            return ControlFlow::Continue(());
        }

        match chunk.process(current, line) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                failure = Some(e);
                ControlFlow::Break(())
            }
        }
    })?;

    let Chunk {
        errors, mut report, ..
    } = chunk;
    errors.finish()?;
    if let Some(e) = failure {
        error!("chunk {} aborted: {e}", job.range);
        return Err(e);
    }

    report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        "chunk {}: {} pages, {} tables, {} samples, {} errors in {:.2}s",
        job.range,
        report.pages,
        report.tables,
        report.samples,
        report.errors(),
        started.elapsed().as_secs_f64()
    );
    Ok(report)
}

struct Chunk<'a, R> {
    job: &'a ChunkJob,
    correlator: Correlator<R>,
    style: PageStyle,
    errors: JsonlWriter,
    report: ChunkReport,
}

impl<R: Renderer> Chunk<'_, R> {
    fn process(&mut self, index: usize, line: &str) -> Result<()> {
        self.report.records += 1;

        let Some((position, html)) = table_html(line) else {
            debug!("record {index}: not a table record");
            self.report.malformed += 1;
            return Ok(());
        };
        self.report.tables += 1;
        if position == Some(0) {
            self.report.pages += 1;
        }

        let tokenized = match normalize_html(&html)
            .ok_or(Rejection::NoTable)
            .and_then(|table| tokenize(&table))
        {
            Ok(tokenized) => tokenized,
            Err(rejection) => {
                debug!("record {index}: {rejection}");
                self.report.rejected += 1;
                return self.errors.write_line(line);
            }
        };

        let page = self.style.render_page(&tokenized.render_markup());
        let rendered = match self.correlator.render(&page, tokenized.id_count) {
            Ok(rendered) => rendered,
            Err(e) if e.is_fatal() => return Err(PipelineError::Render(e)),
            Err(e) => {
                warn!("record {index}: render failed: {e}");
                self.report.render_failures += 1;
                return self.errors.write_line(line);
            }
        };

        let imgid = index as u64;
        let sample = match LabeledSample::new(&tokenized, &rendered.boxes, imgid, &self.job.split) {
            Ok(sample) => sample,
            Err(rejection) => {
                warn!("record {index}: {rejection}");
                self.report.render_failures += 1;
                return self.errors.write_line(line);
            }
        };

        self.save(index, &rendered.image, &sample)
    }

    /// Image first, then the sample JSON that marks the pair complete.
    fn save(&mut self, index: usize, image: &RgbaImage, sample: &LabeledSample) -> Result<()> {
        let stem = self.job.output_dir.join(index.to_string());
        image.save(stem.with_extension("png"))?;
        fs::write(stem.with_extension("json"), serde_json::to_vec(sample)?)?;

        if let Some(dir) = &self.job.debug_dir {
            let boxes: Vec<_> = sample.html.cells.iter().filter_map(|c| c.bbox).collect();
            let overlay = draw_boxes(image, &boxes);
            overlay.save(debug_path(dir, index))?;
        }

        self.report.samples += 1;
        Ok(())
    }
}

/// Position of the table within its page, and its markup
fn table_html(line: &str) -> Option<(Option<u64>, String)> {
    let record: Value = serde_json::from_str(line).ok()?;
    let html = record.get("html")?.as_str()?.to_string();
    Some((record.get("index").and_then(Value::as_u64), html))
}

fn debug_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index}.png"))
}
