//! # wtab-pipeline - Dataset production around the table core
//!
//! Turns Wikipedia HTML dumps into rendered, labeled table samples.
//!
//! - **Dump parsing**: page records in, one table record per wikitable out
//! - **Record store**: JSON-lines over plain, gzip, bzip2 and tar archives
//! - **Chunked generation**: contiguous record ranges, one worker process
//!   each, with per-chunk error streams merged at the end
//! - **Packing and download**: `.tar.bz2` of a language folder, dump fetcher
//!
//! # Usage
//!
//! ## Generate samples for a language
//!
//! ```no_run
//! use wtab_pipeline::{generate, GenerateRequest, WorkerPool};
//!
//! let mut request = GenerateRequest::new(
//!     "data/models/wikitables_html_pubtabnet/ja.jsonl.bz2",
//!     "data/models/wikitables_images/ja",
//! );
//! request.workers = 8;
//!
//! let pool = WorkerPool::current_exe().unwrap();
//! let summary = generate(&request, &pool).unwrap();
//! println!("{} images, {} errors", summary.images, summary.errors);
//! ```
//!
//! ## Count the records of a store
//!
//! ```no_run
//! use std::path::Path;
//! use wtab_pipeline::count_lines;
//!
//! let n = count_lines(Path::new("ja.jsonl.bz2")).unwrap();
//! println!("{n} tables");
//! ```

pub mod archive;
pub mod chunk;
pub mod download;
pub mod dump;
pub mod error;
pub mod generate;
pub mod pool;
pub mod store;
pub mod worker;

pub use archive::compress_folder;
pub use chunk::{partition, ChunkRange};
pub use download::{download_dump, dump_url, DEFAULT_DUMPS_VERSION, DEFAULT_DUMP_URL};
pub use dump::{parse_dump, DumpSummary};
pub use error::{PipelineError, Result};
pub use generate::{archive_path, generate, CompressRequest, GenerateRequest, GenerateSummary};
pub use pool::{ChunkOutcome, Dispatch, WorkerPool};
pub use store::{
    count_lines, count_samples, merge_error_streams, merged_error_path, read_records,
    visit_lines, Compression, JsonlWriter,
};
pub use worker::{run_chunk, run_chunk_with, ChunkJob, ChunkReport};
