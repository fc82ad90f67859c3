//! Drift between the on-disk snapshot and the last committed snapshot.
//!
//! A submit that fails at the commit or push step leaves the file ahead of
//! HEAD. These helpers make that window visible to operators.

use similar::TextDiff;

use picking_core::CommitId;

/// How the snapshot file relates to HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotDrift {
    /// File content equals the content committed at HEAD.
    InSync { head: CommitId },
    /// File differs from HEAD, or HEAD has never committed it.
    Uncommitted { head: Option<CommitId> },
    /// No snapshot file on disk.
    Missing { head: Option<CommitId> },
}

impl SnapshotDrift {
    pub fn classify(
        on_disk: Option<&[u8]>,
        committed: Option<&[u8]>,
        head: Option<CommitId>,
    ) -> Self {
        match (on_disk, head) {
            (None, head) => SnapshotDrift::Missing { head },
            (Some(disk), Some(head)) if committed == Some(disk) => SnapshotDrift::InSync { head },
            (Some(_), head) => SnapshotDrift::Uncommitted { head },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SnapshotDrift::InSync { .. } => "in-sync",
            SnapshotDrift::Uncommitted { .. } => "uncommitted",
            SnapshotDrift::Missing { .. } => "missing",
        }
    }

    pub fn head(&self) -> Option<&CommitId> {
        match self {
            SnapshotDrift::InSync { head } => Some(head),
            SnapshotDrift::Uncommitted { head } | SnapshotDrift::Missing { head } => head.as_ref(),
        }
    }
}

/// Unified diff from `committed` to `on_disk`, `None` when they are equal.
pub fn unified_diff(display_path: &str, committed: &str, on_disk: &str) -> Option<String> {
    let committed = normalize_line_endings(committed);
    let on_disk = normalize_line_endings(on_disk);
    if committed == on_disk {
        return None;
    }
    let old_header = format!("a/{display_path}");
    let new_header = format!("b/{display_path}");
    Some(
        TextDiff::from_lines(&committed, &on_disk)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string(),
    )
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
