//! Dump parsing: page records in, table records out.

use crate::error::Result;
use crate::store::{visit_lines, JsonlWriter};
use log::{debug, info};
use serde_json::Value;
use std::ops::ControlFlow;
use std::path::Path;
use std::time::Instant;
use wtab_core::{page_tables, ExtractOptions};

/// Counters of one dump pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpSummary {
    /// Page records read, parsable or not
    pub pages: usize,
    /// Pages that contributed at least one table
    pub pages_with_tables: usize,
    /// Table records written
    pub tables: usize,
    /// Lines that were not JSON
    pub malformed: usize,
}

/// Stream the page records of `input` and write every extracted table record
/// to `output`.
///
/// Stops once `limit` table records are written, when a limit is given. The
/// `progress` callback sees the running counters after every page.
///
/// # Errors
///
/// I/O errors reading the dump or writing the output.
pub fn parse_dump<P>(
    input: &Path,
    output: &Path,
    limit: Option<usize>,
    options: &ExtractOptions,
    mut progress: P,
) -> Result<DumpSummary>
where
    P: FnMut(&DumpSummary),
{
    let started = Instant::now();
    let mut summary = DumpSummary::default();
    let mut writer = JsonlWriter::create(output)?;
    let mut failure = None;

    visit_lines(input, |line| {
        if line.trim().is_empty() {
            return ControlFlow::Continue(());
        }
        summary.pages += 1;

        let page: Value = match serde_json::from_str(line) {
            Ok(page) => page,
            Err(e) => {
                debug!("page {}: {e}", summary.pages);
                summary.malformed += 1;
                return ControlFlow::Continue(());
            }
        };

        if let Some(tables) = page_tables(&page, options) {
            summary.pages_with_tables += 1;
            for table in &tables {
                if limit.is_some_and(|limit| summary.tables >= limit) {
                    break;
                }
                if let Err(e) = writer.write(table) {
                    failure = Some(e);
                    return ControlFlow::Break(());
                }
                summary.tables += 1;
            }
        }

        progress(&summary);
        if limit.is_some_and(|limit| summary.tables >= limit) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    if let Some(e) = failure {
        return Err(e);
    }
    writer.finish()?;

    info!(
        "{}: {} pages, {} tables in {:.1}s",
        input.display(),
        summary.pages,
        summary.tables,
        started.elapsed().as_secs_f64()
    );
    Ok(summary)
}
