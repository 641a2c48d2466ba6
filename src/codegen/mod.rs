//! Record codegen
//!
//! Rewrites record source files so that each struct deriving
//! `PersistentRecord` carries field-name constants, `ColumnExp` accessors
//! and a `get_key` constructor over its `#[depot(id)]` fields. Generated
//! code lives between marker comments inside the record's inherent `impl`:
//!
//! ```text
//! impl UserRecord {
//!     // AUTO-GENERATED: FIELDS START
//!     pub const USER_ID: &'static str = "user_id";
//!     ...
//!     // AUTO-GENERATED: FIELDS END
//!
//!     // hand-written code is left alone
//!
//!     // AUTO-GENERATED: METHODS START
//!     pub fn get_key(user_id: i32) -> ::depot::Key { ... }
//!     // AUTO-GENERATED: METHODS END
//! }
//! ```
//!
//! Running the tool twice over unchanged input yields identical bytes.

mod parse;
mod splice;
mod templates;

pub use parse::{ImplBody, RecordSource, SourceField};
pub use splice::{Region, MARKER_PREFIX};

use crate::error::{DepotError, DepotResult};
use parse::records;
use splice::{apply, check_balanced, find_pair, Edit, LineIndex};
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Whether [`run`] writes its results back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Write,
    /// Report files that would change without touching them
    Check,
}

/// What happened to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Updated,
    Unchanged,
    /// No persistent records in the file
    Skipped,
}

/// Result of a batch run
#[derive(Debug, Default)]
pub struct CodegenSummary {
    pub updated: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, DepotError)>,
}

impl CodegenSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn files(&self) -> usize {
        self.updated.len() + self.unchanged.len() + self.skipped.len() + self.failed.len()
    }

    fn record(&mut self, path: PathBuf, outcome: DepotResult<FileOutcome>) {
        match outcome {
            Ok(FileOutcome::Updated) => self.updated.push(path),
            Ok(FileOutcome::Unchanged) => self.unchanged.push(path),
            Ok(FileOutcome::Skipped) => self.skipped.push(path),
            Err(err) => self.failed.push((path, err)),
        }
    }
}

impl fmt::Display for CodegenSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for path in &self.updated {
            writeln!(f, "updated   {}", path.display())?;
        }
        for (path, err) in &self.failed {
            writeln!(f, "failed    {}: {err}", path.display())?;
        }
        write!(
            f,
            "{} updated, {} unchanged, {} skipped, {} failed",
            self.updated.len(),
            self.unchanged.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}

/// Rewrite `text`; `None` when there is nothing to change
///
/// Fails without producing output if the markers are unbalanced.
pub fn process_source(text: &str) -> DepotResult<Option<String>> {
    let records = records(text)?;
    if records.is_empty() {
        return Ok(None);
    }
    let output = rewrite(text, &records)?;
    Ok((output != text).then_some(output))
}

fn rewrite(text: &str, records: &[RecordSource]) -> DepotResult<String> {
    let index = LineIndex::new(text);
    check_balanced(&index, Region::Fields)?;
    check_balanced(&index, Region::Methods)?;

    let mut edits = Vec::new();
    for record in records {
        edits.extend(record_edits(&index, record));
    }
    Ok(apply(text, edits))
}

fn record_edits(index: &LineIndex<'_>, record: &RecordSource) -> Vec<Edit> {
    let fields = &record.fields;

    // the first inherent impl holding a marker, else the first one
    let body = record
        .impls
        .iter()
        .find(|body| {
            let lines = body_lines(index, body);
            find_pair(index, Region::Fields, lines.clone()).is_some()
                || find_pair(index, Region::Methods, lines).is_some()
        })
        .or_else(|| record.impls.first());

    let Some(body) = body else {
        return vec![Edit::insert(
            record.struct_end,
            format!("\n\n{}", templates::impl_block(&record.name, fields).trim_end()),
        )];
    };

    let lines = body_lines(index, body);
    let indent = templates::nested(index.indentation(index.line_of(body.open)));
    let mut edits = Vec::new();

    match find_pair(index, Region::Fields, lines.clone()) {
        Some(pair) => {
            let indent = index.indentation(pair.start);
            edits.push(Edit::between(
                index,
                pair,
                templates::fields_body(indent, fields),
            ));
        }
        None => edits.push(Edit::insert(
            body.open + 1,
            format!(
                "\n{}",
                templates::region(
                    &indent,
                    Region::Fields,
                    &templates::fields_body(&indent, fields)
                )
            ),
        )),
    }

    match find_pair(index, Region::Methods, lines) {
        Some(pair) => {
            let indent = index.indentation(pair.start);
            edits.push(Edit::between(
                index,
                pair,
                templates::methods_body(indent, fields),
            ));
        }
        None => {
            let block = templates::region(
                &indent,
                Region::Methods,
                &templates::methods_body(&indent, fields),
            );
            let close_line = index.line_of(body.close);
            let line_start = index.line_start(close_line);
            let own_line = close_line > index.line_of(body.open)
                && body.close - line_start == index.indentation(close_line).len();
            if own_line {
                edits.push(Edit::insert(line_start, format!("\n{block}")));
            } else {
                let outer = index.indentation(index.line_of(body.open));
                edits.push(Edit::insert(body.close, format!("\n{block}{outer}")));
            }
        }
    }

    edits
}

/// Lines strictly inside the braces of `body`
fn body_lines(index: &LineIndex<'_>, body: &ImplBody) -> Range<usize> {
    index.line_of(body.open) + 1..index.line_of(body.close)
}

/// Process one file, writing it back in [`RunMode::Write`]
pub fn process_file(path: &Path, mode: RunMode) -> DepotResult<FileOutcome> {
    let text = std::fs::read_to_string(path).map_err(|err| DepotError::io(path, err))?;

    let records = records(&text)?;
    if records.is_empty() {
        tracing::trace!(path = %path.display(), "no persistent records");
        return Ok(FileOutcome::Skipped);
    }

    let output = rewrite(&text, &records)?;
    if output == text {
        return Ok(FileOutcome::Unchanged);
    }

    if mode == RunMode::Write {
        std::fs::write(path, output).map_err(|err| DepotError::io(path, err))?;
    }
    tracing::info!(path = %path.display(), records = records.len(), ?mode, "regenerated records");
    Ok(FileOutcome::Updated)
}

/// Process every `.rs` file under `paths`
///
/// A failing file is recorded in the summary and the run continues.
pub fn run(paths: &[PathBuf], mode: RunMode) -> CodegenSummary {
    let mut summary = CodegenSummary::default();

    for root in paths {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map_or_else(|| root.clone(), Path::to_path_buf);
                    let err = DepotError::io(path.clone(), std::io::Error::from(err));
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                    summary.failed.push((path, err));
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_rust_source(entry.path()) {
                continue;
            }

            let path = entry.into_path();
            let outcome = process_file(&path, mode);
            if let Err(err) = &outcome {
                tracing::warn!(path = %path.display(), error = %err, "codegen failed");
            }
            summary.record(path, outcome);
        }
    }

    tracing::debug!(files = summary.files(), failed = summary.failed.len(), "codegen finished");
    summary
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn is_rust_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rs")
}

#[cfg(test)]
mod tests;
