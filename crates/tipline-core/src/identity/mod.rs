//! Source identity.
//!
//! A source is known to the system only by a filesystem id derived from a secret
//! codename, plus an unrelated random designation journalists use to refer to them.
//!
//! - **codename**: hashing, sanitizing, the `Codename` / `FilesystemId` types
//! - **generator**: random codenames and designations
//! - **wordlist**: the word-list collaborator

pub mod codename;
pub mod generator;
pub mod wordlist;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use codename::{
    sanitize, Codename, CodenameHasher, FilesystemId, FILESYSTEM_ID_LEN, MAX_CODENAME_LEN,
};
pub use generator::{designation_filename, CodenameGenerator};
pub use wordlist::{StaticWordLists, WordListSource};

/// What gets persisted about a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentity {
    pub filesystem_id: FilesystemId,
    pub designation: String,
}

/// A freshly created source. The codename leaves this struct exactly once, to be
/// shown to the source; only `identity` is kept.
#[derive(Debug)]
pub struct NewSource {
    pub codename: Codename,
    pub identity: SourceIdentity,
}

/// Create a source: draw a codename, derive its id, draw an independent designation.
pub fn create_source<W: WordListSource>(
    generator: &CodenameGenerator<W>,
    hasher: &CodenameHasher,
    locale: Option<&str>,
) -> Result<NewSource> {
    let codename = generator.generate_codename(locale)?;
    let filesystem_id = hasher.derive_filesystem_id(codename.expose())?;
    let designation = generator.generate_designation()?;
    Ok(NewSource {
        codename,
        identity: SourceIdentity {
            filesystem_id,
            designation,
        },
    })
}
