//! Batch processing for programmatic use by both the CLI and the GUI.
//!
//! Each document is processed independently — opened, walked, and saved —
//! and its outcome accumulated into a summary. One document failing never
//! aborts the rest of the batch.

use crate::docx::{Docx, DocxError};
use crate::fetch::Fetcher;
use crate::rewrite::{self, WalkStats};
use std::path::{Path, PathBuf};

/// Default filename suffix for in-place output.
pub const DEFAULT_SUFFIX: &str = "_processed";

/// Where a rewritten document is saved.
#[derive(Debug, Clone)]
pub enum OutputPolicy {
    /// Same directory, `{stem}{suffix}.{ext}`.
    Suffix(String),
    /// Designated directory, same filename.
    Directory(PathBuf),
}

impl OutputPolicy {
    pub fn output_path(&self, input: &Path) -> PathBuf {
        match self {
            OutputPolicy::Suffix(suffix) => {
                let stem = input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("output");
                let ext = input
                    .extension()
                    .and_then(|s| s.to_str())
                    .unwrap_or("docx");
                input.with_file_name(format!("{}{}.{}", stem, suffix, ext))
            }
            OutputPolicy::Directory(dir) => dir.join(
                input
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("output.docx")),
            ),
        }
    }
}

/// Why a whole document failed.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Docx(#[from] DocxError),
    #[error("output would overwrite the input: {}", .0.display())]
    WouldOverwrite(PathBuf),
}

/// The result of processing one document.
#[derive(Debug)]
pub enum DocOutcome {
    /// No image links anywhere; nothing was written.
    Unchanged,
    Rewritten { output: PathBuf, stats: WalkStats },
    Failed(ProcessError),
}

/// Running counts reported after each document.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub rewritten: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Human-readable outcome line for the document just finished.
    pub line: String,
}

/// End-of-batch accounting.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub attempted: usize,
    pub rewritten: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub outcomes: Vec<(PathBuf, DocOutcome)>,
}

impl BatchSummary {
    /// True when every attempted document was rewritten or unchanged.
    pub fn all_ok(&self) -> bool {
        self.failed == 0
    }

    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "Processed {} document(s): {} rewritten, {} unchanged, {} failed",
            self.attempted, self.rewritten, self.unchanged, self.failed
        );
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}

/// Open, rewrite, and save one document.
///
/// Errors never propagate: every failure mode becomes a `Failed` outcome.
/// Unchanged documents are not saved at all.
pub fn process_document(path: &Path, policy: &OutputPolicy, fetcher: &dyn Fetcher) -> DocOutcome {
    let mut doc = match Docx::open(path) {
        Ok(doc) => doc,
        Err(e) => return DocOutcome::Failed(e.into()),
    };
    let stats = match rewrite::walk(&mut doc, fetcher) {
        Ok(stats) => stats,
        Err(e) => return DocOutcome::Failed(e.into()),
    };
    if !stats.changed() {
        return DocOutcome::Unchanged;
    }

    let output = policy.output_path(path);
    if names_same_file(&output, path) {
        return DocOutcome::Failed(ProcessError::WouldOverwrite(output));
    }
    if let OutputPolicy::Directory(dir) = policy {
        if let Err(e) = std::fs::create_dir_all(dir) {
            return DocOutcome::Failed(ProcessError::Docx(e.into()));
        }
    }
    match doc.save(&output) {
        Ok(()) => DocOutcome::Rewritten { output, stats },
        Err(e) => DocOutcome::Failed(e.into()),
    }
}

/// True when `output` would land on the same file as `input`, however
/// the two paths are spelled. The output usually does not exist yet, so
/// its parent directory is canonicalized and the file name compared
/// separately. When either parent cannot be canonicalized the paths
/// cannot name one existing file.
fn names_same_file(output: &Path, input: &Path) -> bool {
    if output == input {
        return true;
    }
    let resolve = |p: &Path| -> Option<PathBuf> {
        let name = p.file_name()?;
        let parent = match p.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Some(std::fs::canonicalize(parent).ok()?.join(name))
    };
    match (resolve(output), resolve(input)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// One status line per document, for the CLI output and the GUI log pane.
pub fn outcome_line(path: &Path, outcome: &DocOutcome) -> String {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("<input>");
    match outcome {
        DocOutcome::Unchanged => format!("{}: no image links found", name),
        DocOutcome::Rewritten { output, stats } => {
            let failed = if stats.images_failed > 0 {
                format!(", {} image(s) kept as text", stats.images_failed)
            } else {
                String::new()
            };
            format!(
                "{}: rewrote {} paragraph(s), embedded {} image(s){} -> {}",
                name,
                stats.paragraphs_rewritten,
                stats.images_embedded,
                failed,
                output.display()
            )
        }
        DocOutcome::Failed(e) => format!("{}: FAILED ({})", name, e),
    }
}

/// Process every path in order, accumulating a summary.
///
/// Calls `on_progress` after each document. Return `false` from the callback
/// to cancel the batch between documents.
pub fn process_all(
    paths: &[PathBuf],
    policy: &OutputPolicy,
    fetcher: &dyn Fetcher,
    mut on_progress: impl FnMut(&BatchProgress) -> bool,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for path in paths {
        summary.attempted += 1;
        let outcome = process_document(path, policy, fetcher);
        match &outcome {
            DocOutcome::Unchanged => summary.unchanged += 1,
            DocOutcome::Rewritten { .. } => summary.rewritten += 1,
            DocOutcome::Failed(e) => {
                log::warn!("{}: {}", path.display(), e);
                summary.failed += 1;
            }
        }
        let line = outcome_line(path, &outcome);
        summary.outcomes.push((path.clone(), outcome));

        let keep_going = on_progress(&BatchProgress {
            completed: summary.attempted,
            total: paths.len(),
            rewritten: summary.rewritten,
            unchanged: summary.unchanged,
            failed: summary.failed,
            line,
        });
        if !keep_going {
            summary.cancelled = true;
            break;
        }
    }
    summary
}
