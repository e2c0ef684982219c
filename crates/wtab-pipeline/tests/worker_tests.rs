//! Chunk worker and generation tests with an in-memory renderer.

use image::{Rgba, RgbaImage};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use wtab_core::CellId;
use wtab_pipeline::{
    generate, merged_error_path, read_records, run_chunk_with, ChunkJob, ChunkOutcome,
    ChunkRange, CompressRequest, Dispatch, GenerateRequest, PipelineError,
};
use wtab_render::{ElementSnapshot, Rect, RenderError, RenderSettings, Renderer, TableCapture};

/// Grid layout renderer; markers from `fail_from` on time out.
#[derive(Default, Clone)]
struct ScriptedRenderer {
    fail_from: Option<usize>,
    session_lost: bool,
}

impl Renderer for ScriptedRenderer {
    fn load(&mut self, _page: &str) -> wtab_render::Result<()> {
        if self.session_lost {
            return Err(RenderError::SessionStart("browser went away".into()));
        }
        Ok(())
    }

    fn capture_table(&mut self) -> wtab_render::Result<TableCapture> {
        Ok(TableCapture {
            image: RgbaImage::from_pixel(120, 80, Rgba([255, 255, 255, 255])),
            rect: Rect::new(8.0, 8.0, 120.0, 80.0),
        })
    }

    fn locate(&mut self, id: CellId, timeout: Duration) -> wtab_render::Result<ElementSnapshot> {
        if self.fail_from.is_some_and(|from| id.index() >= from) {
            return Err(RenderError::Timeout {
                id: id.index(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        let (row, column) = (id.index() / 2, id.index() % 2);
        Ok(ElementSnapshot {
            text: id.to_string(),
            rect: Rect::new(12.0 + 40.0 * column as f64, 12.0 + 20.0 * row as f64, 30.0, 12.0),
        })
    }
}

const GOOD: &str = "<table class=\"wikitable\"><tr><th>A</th><th>B</th></tr>\
                    <tr><td>1</td><td>2</td></tr></table>";
const BAD_SPAN: &str = "<table class=\"wikitable\"><tr><td colspan=\"50\">x</td></tr></table>";
const FIVE_IDS: &str = "<table class=\"wikitable\"><tr><th>A</th><th>B</th></tr>\
                        <tr><td>1</td><td>2</td></tr><tr><td>3</td><td></td></tr></table>";

/// Table record; `position` is the table's index within its page
fn record(position: usize, title: &str, html: &str) -> String {
    json!({"index": position, "title": title, "html": html}).to_string()
}

/// Records 0..5: good, malformed, bad span, five ids, good.
/// Records 2 and 3 are the two tables of one page.
fn write_input(dir: &Path) -> PathBuf {
    let path = dir.join("tables.jsonl");
    let lines = [
        record(0, "Tokyo", GOOD),
        "{\"title\": \"no html\"}".to_string(),
        record(0, "Osaka", BAD_SPAN),
        record(1, "Osaka", FIVE_IDS),
        record(0, "Kyoto", GOOD),
    ];
    fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

fn job(dir: &Path, input: PathBuf, range: ChunkRange) -> ChunkJob {
    ChunkJob {
        input,
        errors_dir: dir.join("ja/errors"),
        output_dir: dir.join("ja/train"),
        split: "train".into(),
        range,
        render: RenderSettings::default(),
        debug_dir: None,
    }
}

#[test]
fn test_every_record_lands_in_one_place() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path());
    let job = job(dir.path(), input, ChunkRange::new(0, 5));
    let renderer = ScriptedRenderer {
        fail_from: Some(4),
        ..ScriptedRenderer::default()
    };

    let report = run_chunk_with(&job, renderer).unwrap();

    assert_eq!(report.records, 5);
    assert_eq!(report.tables, 4);
    assert_eq!(report.pages, 3);
    assert_eq!(report.samples, 2);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.render_failures, 1);

    for i in [0, 4] {
        assert!(job.output_dir.join(format!("{i}.png")).is_file());
        assert!(job.output_dir.join(format!("{i}.json")).is_file());
    }
    assert!(!job.output_dir.join("3.png").exists());

    let sample: serde_json::Value =
        serde_json::from_slice(&fs::read(job.output_dir.join("4.json")).unwrap()).unwrap();
    assert_eq!(sample["filename"], "4.png");
    assert_eq!(sample["imgid"], 4);
    assert_eq!(sample["split"], "train");

    let errors = read_records(&job.error_path(), None).unwrap();
    let html: Vec<_> = errors.iter().map(|e| e["html"].as_str().unwrap()).collect();
    assert_eq!(html, vec![BAD_SPAN, FIVE_IDS]);
    assert_eq!(errors[1]["index"], 1);
}

#[test]
fn test_chunk_only_touches_its_range() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path());
    let job = job(dir.path(), input, ChunkRange::new(3, 5));

    let report = run_chunk_with(&job, ScriptedRenderer::default()).unwrap();

    assert_eq!(report.records, 2);
    // Record 3 continues a page that starts before the range
    assert_eq!((report.pages, report.tables), (1, 2));
    assert_eq!(report.samples, 2);
    assert!(job.output_dir.join("3.png").is_file());
    assert!(!job.output_dir.join("0.png").exists());
    assert_eq!(job.error_path(), dir.path().join("ja/errors/3_5.jsonl.bz2"));
    assert!(read_records(&job.error_path(), None).unwrap().is_empty());
}

#[test]
fn test_debug_overlays_are_written() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path());
    let mut job = job(dir.path(), input, ChunkRange::new(0, 1));
    job.debug_dir = Some(dir.path().join("boxes"));

    run_chunk_with(&job, ScriptedRenderer::default()).unwrap();

    let overlay = image::open(dir.path().join("boxes/0.png")).unwrap().to_rgba8();
    // Box 0 is [2, 2, 36, 18]; its outline sits 3 px inside
    assert_eq!(overlay.get_pixel(5, 5), &Rgba([255, 0, 0, 255]));
    assert_eq!(overlay.get_pixel(20, 10), &Rgba([255, 255, 255, 255]));
}

#[test]
fn test_lost_session_aborts_the_chunk() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path());
    let job = job(dir.path(), input, ChunkRange::new(0, 5));
    let renderer = ScriptedRenderer {
        session_lost: true,
        ..ScriptedRenderer::default()
    };

    let err = run_chunk_with(&job, renderer).unwrap_err();
    assert!(matches!(err, PipelineError::Render(RenderError::SessionStart(_))));
    assert!(!job.output_dir.join("0.png").exists());
}

/// Runs every chunk in this process, one renderer per chunk
struct InProcess {
    renderer: ScriptedRenderer,
    fail: Option<ChunkRange>,
}

impl Dispatch for InProcess {
    fn run(&self, jobs: &[ChunkJob]) -> Vec<ChunkOutcome> {
        // Reverse completion order
        jobs.iter()
            .rev()
            .map(|job| ChunkOutcome {
                range: job.range,
                result: if self.fail == Some(job.range) {
                    Err(PipelineError::WorkerFailed {
                        range: job.range,
                        status: "signal: 9 (SIGKILL)".into(),
                    })
                } else {
                    run_chunk_with(job, self.renderer.clone())
                },
            })
            .collect()
    }
}

#[test]
fn test_generate_merges_errors_and_counts_from_disk() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path());
    let lang_dir = dir.path().join("ja");
    let request = GenerateRequest {
        workers: 3,
        compress: Some(CompressRequest {
            output: dir.path().join("ja.tar.bz2"),
            delete_original: true,
        }),
        ..GenerateRequest::new(&input, &lang_dir)
    };
    let dispatch = InProcess {
        renderer: ScriptedRenderer {
            fail_from: Some(4),
            ..ScriptedRenderer::default()
        },
        fail: None,
    };

    let summary = generate(&request, &dispatch).unwrap();

    assert_eq!((summary.pages, summary.tables), (3, 4));
    assert_eq!(summary.images, 2);
    assert_eq!(summary.errors, 2);
    assert!(summary.failed_chunks.is_empty());
    assert_eq!(summary.archive.as_deref(), Some(dir.path().join("ja.tar.bz2").as_path()));
    assert!(!lang_dir.exists());
}

#[test]
fn test_failed_chunk_keeps_partial_output_uncompressed() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path());
    let lang_dir = dir.path().join("ja");
    let request = GenerateRequest {
        workers: 2,
        compress: Some(CompressRequest {
            output: dir.path().join("ja.tar.bz2"),
            delete_original: true,
        }),
        ..GenerateRequest::new(&input, &lang_dir)
    };
    // Chunks are [0, 2) and [2, 5)
    let dispatch = InProcess {
        renderer: ScriptedRenderer::default(),
        fail: Some(ChunkRange::new(2, 5)),
    };

    let summary = generate(&request, &dispatch).unwrap();

    assert_eq!((summary.pages, summary.tables), (1, 1));
    assert_eq!(summary.images, 1);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.failed_chunks, vec![ChunkRange::new(2, 5)]);
    assert!(summary.archive.is_none());
    assert!(lang_dir.join("train/0.png").is_file());
    assert!(merged_error_path(&lang_dir.join("errors")).is_file());
    assert!(!lang_dir.join("errors").exists());
}

#[test]
fn test_inverted_range_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path());
    let request = GenerateRequest {
        range: Some(ChunkRange::new(4, 1)),
        ..GenerateRequest::new(&input, dir.path().join("ja"))
    };
    let dispatch = InProcess {
        renderer: ScriptedRenderer::default(),
        fail: None,
    };
    assert!(matches!(
        generate(&request, &dispatch),
        Err(PipelineError::InvalidRange { start: 4, end: 1 })
    ));
}
