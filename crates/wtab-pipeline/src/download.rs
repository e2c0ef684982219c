//! Fetching Wikipedia HTML dumps

use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Dump run used when none is configured
pub const DEFAULT_DUMPS_VERSION: &str = "20220301";

/// URL template of Enterprise HTML dumps; `{version}` and `{lang}` are
/// substituted.
pub const DEFAULT_DUMP_URL: &str = "https://dumps.wikimedia.org/other/enterprise_html/runs/{version}/{lang}wiki-NS0-{version}-ENTERPRISE-HTML.json.tar.gz";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fill a dump URL template.
#[must_use]
pub fn dump_url(template: &str, version: &str, lang: &str) -> String {
    template.replace("{version}", version).replace("{lang}", lang)
}

/// Last path segment of `url`, without query.
#[must_use]
pub fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Download `url` into `dest_dir`, keeping the remote file name.
///
/// An already present file is reused without a request. A non-success HTTP
/// status is logged and yields `Ok(None)`, so a batch over many languages
/// can go on. The body is streamed into `<name>.part` and renamed once
/// complete.
///
/// # Errors
///
/// Network failures and I/O errors writing the file.
pub fn download_dump(url: &str, dest_dir: &Path, show_progress: bool) -> Result<Option<PathBuf>> {
    fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(file_name(url));
    if dest.is_file() {
        info!("{} already downloaded", dest.display());
        return Ok(Some(dest));
    }

    let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).timeout(None::<Duration>).build()?;
    let response = client.get(url).send()?;
    let status = response.status();
    if status != StatusCode::OK {
        error!("cannot download {url}: HTTP {status}");
        return Ok(None);
    }

    let progress = if show_progress {
        let pb = response.content_length().map_or_else(ProgressBar::new_spinner, ProgressBar::new);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                .expect("template is compile-time constant")
                .progress_chars("=>-"),
        );
        pb.set_message(file_name(url).to_string());
        pb
    } else {
        ProgressBar::hidden()
    };

    let partial = dest.with_file_name(format!("{}.part", file_name(url)));
    let mut writer = BufWriter::new(File::create(&partial)?);
    let copied = io::copy(&mut progress.wrap_read(response), &mut writer);
    progress.finish_and_clear();
    if let Err(e) = copied.and_then(|_| writer.flush()) {
        drop(writer);
        if let Err(cleanup) = fs::remove_file(&partial) {
            debug!("cannot remove {}: {cleanup}", partial.display());
        }
        return Err(e.into());
    }
    drop(writer);
    fs::rename(&partial, &dest)?;

    info!("downloaded {}", dest.display());
    Ok(Some(dest))
}
