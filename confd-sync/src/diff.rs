//! Dry-run unified diff support for `confd diff`.

use std::path::PathBuf;

use similar::TextDiff;

use crate::reconciler::{PreviewEntry, Reconciler};

/// A single rendered file diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub address: String,
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Diff result for every watched file.
#[derive(Debug, Default)]
pub struct DiffReport {
    pub diffs: Vec<FileDiff>,
    /// Addresses that failed to render or whose target could not be read,
    /// with the error text.
    pub failures: Vec<(String, String)>,
}

impl DiffReport {
    pub fn is_clean(&self) -> bool {
        self.diffs.is_empty() && self.failures.is_empty()
    }
}

/// Render what a reload would write and compare it to current on-disk content.
///
/// No files are written. Assumes the reconciler's namespaces are loaded.
/// Entries that fail to render, or whose target cannot be read, land in
/// [`DiffReport::failures`]; the rest are still diffed.
pub fn diff_all(reconciler: &Reconciler) -> DiffReport {
    let mut report = DiffReport::default();
    for entry in reconciler.preview() {
        push_entry(&mut report, entry);
    }
    report
}

fn push_entry(report: &mut DiffReport, entry: PreviewEntry) {
    let rendered = match entry.rendered {
        Ok(rendered) => normalize_line_endings(&rendered),
        Err(err) => {
            report.failures.push((entry.address, err.to_string()));
            return;
        }
    };
    let current = match entry.current {
        Ok(current) => current,
        Err(err) => {
            report.failures.push((entry.address, err.to_string()));
            return;
        }
    };
    let existing = current
        .as_deref()
        .map(normalize_line_endings)
        .unwrap_or_default();
    if current.is_some() && existing == rendered {
        return;
    }

    let old_header = if current.is_some() {
        format!("a/{}", entry.path.display())
    } else {
        "/dev/null".to_string()
    };
    let new_header = format!("b/{}", entry.path.display());
    let unified = TextDiff::from_lines(&existing, &rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    report.diffs.push(FileDiff {
        address: entry.address,
        path: entry.path,
        unified_diff: unified,
    });
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
