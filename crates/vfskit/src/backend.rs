//! The storage backend contract.
//!
//! A backend is a whole-blob store addressed by URL: it moves complete byte
//! strings plus partial metadata, and knows nothing about open modes,
//! cursors, buffering or permission checks. All of that stream machinery
//! lives in [`crate::engine`] and works against any implementor of
//! [`StorageBackend`].

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Result;
use crate::stat::{Stat, StatPatch};
use crate::url::Url;

/// Whole-blob storage addressed by URL.
///
/// Metadata is exchanged as [`StatPatch`] in both directions: a backend
/// reports whatever fields it tracks and receives only the fields an
/// operation changed. Implementations decide how much of a patch they can
/// persist; silently dropping fields they cannot represent is legitimate.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Metadata for `url`, or `None` when nothing exists there. Existence
    /// probes go through this method, so it must not error on absence.
    async fn get_metadata(&self, url: &Url, context: &Context) -> Result<Option<StatPatch>>;

    /// Persist the changed fields of `patch` for an existing `url`.
    async fn set_metadata(&self, url: &Url, patch: &StatPatch, context: &Context) -> Result<()>;

    /// Full contents plus metadata of an existing blob.
    async fn select(&self, url: &Url, context: &Context) -> Result<(Vec<u8>, StatPatch)>;

    /// Store `contents` at `url`, replacing anything already there. `stat`
    /// carries the ownership and timestamps the store should record.
    async fn create(
        &self,
        url: &Url,
        contents: &[u8],
        stat: &Stat,
        context: &Context,
    ) -> Result<()>;

    /// Extend an existing blob with `contents`.
    async fn append(&self, url: &Url, contents: &[u8], context: &Context) -> Result<()>;

    /// Remove the blob at `url`. Directories are not deleted here.
    async fn delete(&self, url: &Url, context: &Context) -> Result<()>;

    /// Move a blob (and, for directories, its subtree) to a new URL within
    /// this backend.
    async fn rename(&self, from: &Url, to: &Url, context: &Context) -> Result<()>;

    /// Direct children of a directory, as full URL strings.
    async fn children(&self, url: &Url, context: &Context) -> Result<Vec<String>>;

    /// Create a directory entry. Ancestor handling is the walker's job;
    /// the immediate parent must already exist.
    async fn create_directory(&self, url: &Url, stat: &Stat, context: &Context) -> Result<()>;

    /// Remove an empty directory entry. Emptiness is checked by the caller.
    async fn delete_directory(&self, url: &Url, context: &Context) -> Result<()>;
}
