//! Device-token → locations directory for frostwatch.
//!
//! The in-memory [`Directory`] is loaded once from a [`RemoteMirror`] at
//! startup and writes every accepted mutation through to it before
//! acknowledging the caller.

pub mod directory;
pub mod legacy;
pub mod memory;
pub mod mirror;
pub mod retry;
pub mod sqlite;

pub use directory::{AddOutcome, Directory, DirectorySnapshot, RegisterOutcome, RemoveOutcome};
pub use legacy::{import_legacy_tokens, ImportReport, PlainTokens, TokenDecoder};
pub use memory::MemoryMirror;
pub use mirror::{Entries, LoadedDirectory, MirrorResult, RemoteMirror};
pub use retry::{load_with_retry, StartupRetry};
pub use sqlite::SqliteMirror;
