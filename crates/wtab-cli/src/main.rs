// Counts and byte sizes are formatted for display only.
#![allow(
    clippy::cast_precision_loss,  // f64 sufficient for display purposes
    clippy::too_many_lines,       // CLI main() is necessarily large
    clippy::needless_pass_by_value, // clap requires owned strings
)]

//! wtab - Wikipedia wikitables to table-recognition samples
//!
//! Downloads Wikipedia HTML dumps, extracts their wikitables as table
//! records, and renders each record into an image with a PubTabNet-style
//! structure and cell-box annotation.

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wtab_core::ExtractOptions;
use wtab_pipeline::download::file_name;
use wtab_pipeline::generate::DEFAULT_SPLIT;
use wtab_pipeline::{
    archive_path, count_lines, download_dump, dump_url, generate, parse_dump, read_records,
    run_chunk, ChunkJob, ChunkRange, CompressRequest, DumpSummary, GenerateRequest,
    GenerateSummary, WorkerPool,
};

/// Format bytes as human-readable size (e.g., "1.5 MB")
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

/// Format a count with thousands separators (e.g., "12,345")
fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Verbosity level for output control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Verbosity {
    /// Suppress all output except errors
    Quiet,
    /// Normal output (default)
    Normal,
    /// Verbose output with extra details
    Verbose,
}

impl Verbosity {
    const fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    const fn should_show_output(self) -> bool {
        !matches!(self, Self::Quiet)
    }

    const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "wtab",
    about = "Turn Wikipedia wikitables into table-recognition samples",
    long_about = "Download Wikipedia HTML dumps, extract their wikitables and render each table\n\
                  into an image annotated with its structure tokens and cell boxes.",
    version
)]
struct Args {
    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show detailed processing information
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download the Wikipedia HTML dump of a language
    Download {
        /// Language edition (e.g., ja, en)
        #[arg(short, long, default_value = "ja")]
        language: String,

        /// Dump run, see https://dumps.wikimedia.org/other/enterprise_html/runs/
        #[arg(short = 'p', long = "dumps-version", value_name = "VERSION")]
        dumps_version: Option<String>,
    },

    /// Extract the wikitables of a dump as table records
    Parse {
        #[arg(short, long, default_value = "ja")]
        language: String,

        /// Downloaded dump; the configured dump of the language by default
        #[arg(short = 'f', long = "dump-file", value_name = "FILE")]
        dump_file: Option<PathBuf>,

        /// Stop after this many tables (0 = no limit)
        #[arg(short = 't', long = "limit-table", default_value_t = 0)]
        limit: usize,

        /// Output file (.jsonl or .jsonl.bz2)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        #[arg(short = 'p', long = "dumps-version", value_name = "VERSION")]
        dumps_version: Option<String>,
    },

    /// Print table records as pretty JSON
    Read {
        #[arg(short = 'i', long = "input-file", value_name = "FILE")]
        input: PathBuf,

        /// Print only the first records (0 = all)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// Count the records of a JSON-lines file
    Size {
        #[arg(short = 'i', long = "input-file", value_name = "FILE")]
        input: PathBuf,
    },

    /// Download and parse dumps, languages in parallel
    DumpJson {
        /// Language edition, or `all` for every language of the languages file
        #[arg(short, long, default_value = "all")]
        language: String,

        #[arg(short = 'p', long = "dumps-version", value_name = "VERSION")]
        dumps_version: Option<String>,

        /// Languages processed at once
        #[arg(short = 'n', long = "threads", default_value_t = 1)]
        threads: usize,
    },

    /// Render table records into annotated images
    #[command(long_about = "Render table records into annotated images.\n\
                      \n\
                      Records are split into contiguous chunks, one worker process each.\n\
                      Every worker drives its own headless browser through WebDriver\n\
                      (geckodriver by default, see the [render] config table).\n\
                      \n\
                      Missing table records are produced first (download + parse).")]
    GenImages {
        #[arg(short, long, default_value = "all")]
        language: String,

        #[arg(short = 'p', long = "dumps-version", value_name = "VERSION")]
        dumps_version: Option<String>,

        /// Worker processes
        #[arg(short = 'n', long = "workers", default_value_t = 1)]
        workers: usize,

        /// Split name recorded in every sample
        #[arg(long, default_value = DEFAULT_SPLIT)]
        split: String,

        /// First record index (inclusive)
        #[arg(long)]
        start: Option<usize>,

        /// Last record index (exclusive)
        #[arg(long)]
        end: Option<usize>,

        /// Pack the language folder into a .tar.bz2
        #[arg(short, long)]
        compress: bool,

        /// Delete the language folder after packing
        #[arg(short = 'd', long = "delete-org", requires = "compress")]
        delete_org: bool,

        /// Also write images with the cell boxes outlined
        #[arg(long, value_name = "DIR")]
        debug_boxes: Option<PathBuf>,
    },

    /// Run one chunk (used by gen-images)
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        job: String,
    },

    /// Inspect configuration
    #[command(long_about = "Inspect wtab configuration.\n\
                      \n\
                      Configuration files are loaded in this order (later overrides earlier):\n\
                        1. User config: ~/.wtab.toml\n\
                        2. Project config: ./.wtab.toml\n\
                        3. Command-line arguments")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Display the effective configuration
    Show {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },

    /// Show the configuration file locations
    Path,
}

/// Options shared by every language of a gen-images run
struct GenImagesOptions {
    dumps_version: Option<String>,
    workers: usize,
    split: String,
    start: Option<usize>,
    end: Option<usize>,
    compress: bool,
    delete_org: bool,
    debug_boxes: Option<PathBuf>,
}

fn main() -> Result<()> {
    let config = Config::discover();
    let args = Args::parse();
    let verbosity = Verbosity::from_flags(args.quiet, args.verbose);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(verbosity.log_filter()))
        .target(env_logger::Target::Stderr)
        .init();

    match args.command {
        Commands::Download {
            language,
            dumps_version,
        } => download_command(&config, &language, dumps_version.as_deref(), verbosity),
        Commands::Parse {
            language,
            dump_file,
            limit,
            output,
            dumps_version,
        } => parse_command(
            &config,
            &language,
            dump_file,
            limit,
            output,
            dumps_version.as_deref(),
            verbosity,
        ),
        Commands::Read { input, limit } => read_command(&input, limit),
        Commands::Size { input } => {
            let n = count_lines(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            println!("{n}");
            Ok(())
        }
        Commands::DumpJson {
            language,
            dumps_version,
            threads,
        } => dump_json_command(&config, &language, dumps_version.as_deref(), threads),
        Commands::GenImages {
            language,
            dumps_version,
            workers,
            split,
            start,
            end,
            compress,
            delete_org,
            debug_boxes,
        } => gen_images_command(
            &config,
            &language,
            &GenImagesOptions {
                dumps_version,
                workers,
                split,
                start,
                end,
                compress,
                delete_org,
                debug_boxes,
            },
        ),
        Commands::Worker { job } => worker_command(&job),
        Commands::Config { action } => config_command(&config, action),
    }
}

/// Local path of a language's dump as the downloader names it
fn default_dump_path(config: &Config, lang: &str, version: &str) -> PathBuf {
    let url = dump_url(config.dump_url(), version, lang);
    config.layout().dump_dir().join(file_name(&url))
}

fn fetch_dump(config: &Config, lang: &str, version: &str, progress: bool) -> Result<Option<PathBuf>> {
    let url = dump_url(config.dump_url(), version, lang);
    download_dump(&url, &config.layout().dump_dir(), progress)
        .with_context(|| format!("Failed to download {url}"))
}

fn download_command(
    config: &Config,
    lang: &str,
    version: Option<&str>,
    verbosity: Verbosity,
) -> Result<()> {
    let version = version.unwrap_or_else(|| config.dumps_version());
    let path = fetch_dump(config, lang, version, verbosity.should_show_output())?
        .with_context(|| format!("No {lang} dump for version {version}"))?;
    let size = fs::metadata(&path)?.len();
    println!("Downloaded: {} - {}", format_bytes(size), path.display());
    Ok(())
}

fn parse_with_progress(
    options: &ExtractOptions,
    lang: &str,
    input: &Path,
    output: &Path,
    limit: Option<usize>,
    show_progress: bool,
) -> Result<DumpSummary> {
    let spinner = if show_progress {
        let s = ProgressBar::new_spinner();
        s.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("template is compile-time constant"),
        );
        s.enable_steady_tick(Duration::from_millis(120));
        s
    } else {
        ProgressBar::hidden()
    };

    let describe = |summary: &DumpSummary| {
        format!(
            "Parse Wikitable {lang}. Saved {} tables / {} pages",
            format_count(summary.tables),
            format_count(summary.pages)
        )
    };
    let summary = parse_dump(input, output, limit, options, |summary| {
        if summary.pages % 100 == 0 {
            spinner.set_message(describe(summary));
        }
    })
    .with_context(|| format!("Failed to parse {}", input.display()))?;
    spinner.finish_and_clear();
    Ok(summary)
}

fn parse_command(
    config: &Config,
    lang: &str,
    dump_file: Option<PathBuf>,
    limit: usize,
    output: Option<PathBuf>,
    version: Option<&str>,
    verbosity: Verbosity,
) -> Result<()> {
    let version = version.unwrap_or_else(|| config.dumps_version());
    let input = dump_file.unwrap_or_else(|| default_dump_path(config, lang, version));
    if !input.exists() {
        bail!(
            "Dump not found: {} (run `wtab download -l {lang}` first)",
            input.display()
        );
    }

    let limit = (limit > 0).then_some(limit);
    let output = output.unwrap_or_else(|| config.layout().table_records(lang, limit));
    let summary = parse_with_progress(
        &config.extract_options(),
        lang,
        &input,
        &output,
        limit,
        verbosity.should_show_output(),
    )?;

    if summary.malformed > 0 {
        eprintln!(
            "{} {} unparsable page line(s) skipped",
            "Warning:".yellow().bold(),
            format_count(summary.malformed)
        );
    }
    println!(
        "{} {}: {} tables from {} pages - {}",
        "✓".green(),
        lang,
        format_count(summary.tables),
        format_count(summary.pages),
        output.display()
    );
    Ok(())
}

fn read_command(input: &Path, limit: usize) -> Result<()> {
    let records = read_records(input, (limit > 0).then_some(limit))
        .with_context(|| format!("Failed to read {}", input.display()))?;
    for record in records {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }
    Ok(())
}

/// Download and parse one language; `None` when no dump is available
fn dump_language(
    config: &Config,
    lang: &str,
    version: &str,
    show_progress: bool,
) -> Result<Option<PathBuf>> {
    let Some(dump) = fetch_dump(config, lang, version, show_progress)? else {
        return Ok(None);
    };
    let output = config.layout().table_records(lang, None);
    parse_with_progress(
        &config.extract_options(),
        lang,
        &dump,
        &output,
        None,
        show_progress,
    )?;
    Ok(Some(output))
}

fn dump_json_command(
    config: &Config,
    language: &str,
    version: Option<&str>,
    threads: usize,
) -> Result<()> {
    let languages = config.languages(language)?;
    let version = version.unwrap_or_else(|| config.dumps_version());

    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok(); // Ignore error if pool already built
    }

    let show_progress = languages.len() == 1;
    let done = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    // Languages report as they complete
    languages
        .par_iter()
        .rev()
        .for_each(|lang| match dump_language(config, lang, version, show_progress) {
            Ok(Some(path)) => {
                let i = done.fetch_add(1, Ordering::SeqCst) + 1;
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                println!(
                    "{i}. Dump {lang} Saved: {} - {}",
                    format_bytes(size),
                    path.display()
                );
            }
            Ok(None) => warn!("{lang}: no dump available for {version}"),
            Err(e) => {
                failed.fetch_add(1, Ordering::SeqCst);
                eprintln!("{} {lang}: {e:#}", "Error:".red().bold());
            }
        });

    let failed = failed.into_inner();
    if failed > 0 {
        bail!("{failed} language(s) failed");
    }
    Ok(())
}

fn gen_language(
    config: &Config,
    lang: &str,
    options: &GenImagesOptions,
    pool: &WorkerPool,
) -> Result<GenerateSummary> {
    let layout = config.layout();
    let input = layout.table_records(lang, None);
    if !input.exists() {
        let version = options
            .dumps_version
            .as_deref()
            .unwrap_or_else(|| config.dumps_version());
        if dump_language(config, lang, version, true)?.is_none() {
            bail!("No table records for {lang}");
        }
    }

    let range = if options.start.is_some() || options.end.is_some() {
        let end = match options.end {
            Some(end) => end,
            None => count_lines(&input)?,
        };
        Some(ChunkRange::new(options.start.unwrap_or(0), end))
    } else {
        None
    };

    let lang_dir = layout.images_dir(lang);
    let compress = options.compress.then(|| CompressRequest {
        output: archive_path(&lang_dir),
        delete_original: options.delete_org,
    });
    let request = GenerateRequest {
        split: options.split.clone(),
        range,
        workers: options.workers,
        render: config.render_settings(),
        debug_dir: options.debug_boxes.as_ref().map(|dir| dir.join(lang)),
        compress,
        ..GenerateRequest::new(input, lang_dir)
    };
    Ok(generate(&request, pool)?)
}

fn gen_images_command(config: &Config, language: &str, options: &GenImagesOptions) -> Result<()> {
    let languages = config.languages(language)?;
    let pool = WorkerPool::current_exe().context("Cannot locate the wtab executable")?;

    println!("No\tLang\tPages\tTables\tImages\tErrors\tRunTime");
    let mut failed = 0;
    for (i, lang) in languages.iter().enumerate() {
        match gen_language(config, lang, options, &pool) {
            Ok(summary) => {
                println!(
                    "{}\t{lang}\t{}\t{}\t{}\t{}\t{:.2}",
                    i + 1,
                    format_count(summary.pages),
                    format_count(summary.tables),
                    format_count(summary.images),
                    format_count(summary.errors),
                    summary.elapsed.as_secs_f64()
                );
                if !summary.failed_chunks.is_empty() {
                    failed += 1;
                    let ranges: Vec<String> =
                        summary.failed_chunks.iter().map(ToString::to_string).collect();
                    eprintln!(
                        "{} {lang}: chunk(s) {} failed, rerun them with --start/--end",
                        "Warning:".yellow().bold(),
                        ranges.join(", ")
                    );
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {lang}: {e:#}", "Error:".red().bold());
            }
        }
    }

    if failed > 0 {
        bail!("{failed} language(s) did not complete");
    }
    Ok(())
}

fn worker_command(job: &str) -> Result<()> {
    let job: ChunkJob = serde_json::from_str(job).context("Invalid chunk job")?;
    let report = run_chunk(&job).with_context(|| format!("Chunk {} failed", job.range))?;
    // Last stdout line is read back by the pool
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn config_command(config: &Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { json } => {
            let effective = config.effective();
            if json {
                println!("{}", serde_json::to_string_pretty(&effective)?);
            } else {
                print!("{}", toml::to_string_pretty(&effective)?);
            }
        }
        ConfigAction::Path => {
            let user = dirs::home_dir().map(|home| home.join(CONFIG_FILE));
            let project = PathBuf::from(CONFIG_FILE);
            for (kind, path) in [("user", user), ("project", Some(project))] {
                let Some(path) = path else {
                    println!("{kind}: (no home directory)");
                    continue;
                };
                let state = if path.exists() {
                    "found".green()
                } else {
                    "not found".dimmed()
                };
                println!("{kind}: {} ({state})", path.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "wtab", "gen-images", "-l", "ja", "-n", "4", "--start", "10", "--end", "20", "-c", "-d",
        ])
        .unwrap();
        match args.command {
            Commands::GenImages {
                language,
                workers,
                start,
                end,
                compress,
                delete_org,
                ..
            } => {
                assert_eq!(language, "ja");
                assert_eq!(workers, 4);
                assert_eq!((start, end), (Some(10), Some(20)));
                assert!(compress && delete_org);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_delete_requires_compress() {
        assert!(Args::try_parse_from(["wtab", "gen-images", "-d"]).is_err());
    }
}
