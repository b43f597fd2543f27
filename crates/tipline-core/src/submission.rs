//! Bookkeeping over a source's stored artifacts.
//!
//! Artifacts are named `<interaction>-<designation>-<kind>.<ext>`, where
//! `<interaction>` is the source's running interaction count, handed out by the
//! store through [`allocate_filename`]. Counting and ordering are computed from the
//! names on demand; nothing is cached.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::identity::{designation_filename, FilesystemId};
use crate::storage::SourceStore;

/// Encrypted-file extensions artifacts may carry.
const EXTENSIONS: [&str; 2] = ["age", "gpg"];

/// What an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Message,
    Document,
    Reply,
}

impl ArtifactKind {
    /// Classify a stored filename. `None` for names that aren't artifacts.
    pub fn classify(filename: &str) -> Option<Self> {
        let stem = EXTENSIONS
            .iter()
            .find_map(|ext| filename.strip_suffix(ext)?.strip_suffix('.'))?;

        if stem.ends_with("-msg") {
            Some(ArtifactKind::Message)
        } else if stem.ends_with("-doc.gz") || stem.ends_with("-doc.zip") {
            Some(ArtifactKind::Document)
        } else if stem.ends_with("-reply") {
            Some(ArtifactKind::Reply)
        } else {
            None
        }
    }

    /// Filename for a new artifact.
    ///
    /// # Examples
    ///
    /// ```
    /// use tipline_core::submission::ArtifactKind;
    ///
    /// assert_eq!(
    ///     ArtifactKind::Message.filename(3, "Brave Otter"),
    ///     "3-brave_otter-msg.age"
    /// );
    /// ```
    pub fn filename(&self, interaction: u64, designation: &str) -> String {
        let suffix = match self {
            ArtifactKind::Message => "msg",
            ArtifactKind::Document => "doc.gz",
            ArtifactKind::Reply => "reply",
        };
        format!(
            "{}-{}-{}.age",
            interaction,
            designation_filename(designation),
            suffix
        )
    }
}

/// Reserve the next interaction number for a source and name the artifact.
///
/// A message or document also takes the source out of the pending state; a reply
/// does not.
///
/// # Errors
///
/// Returns `TiplineError::NotFound` if the source has no record.
pub fn allocate_filename(
    store: &dyn SourceStore,
    filesystem_id: &FilesystemId,
    designation: &str,
    kind: ArtifactKind,
    at: DateTime<Utc>,
) -> Result<String> {
    let interaction = store.next_interaction(filesystem_id, at)?;
    if kind != ArtifactKind::Reply {
        store.mark_active(filesystem_id)?;
    }
    Ok(kind.filename(interaction, designation))
}

/// Message and document totals for one source. Replies aren't counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactCounts {
    pub messages: usize,
    pub documents: usize,
}

pub fn count_artifacts<'a, I>(filenames: I) -> ArtifactCounts
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = ArtifactCounts::default();
    for name in filenames {
        match ArtifactKind::classify(name) {
            Some(ArtifactKind::Message) => counts.messages += 1,
            Some(ArtifactKind::Document) => counts.documents += 1,
            _ => {}
        }
    }
    counts
}

/// Leading interaction number of a filename.
pub fn interaction_number(filename: &str) -> Option<u64> {
    filename.split('-').next()?.parse().ok()
}

/// Sort submissions and replies together into conversation order.
///
/// Names without a leading number sort after all numbered ones, keeping their
/// relative order.
pub fn order_collection<T, F>(items: &mut [T], filename: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by_key(|item| match interaction_number(filename(item)) {
        Some(n) => (0u8, n),
        None => (1u8, 0),
    });
}
