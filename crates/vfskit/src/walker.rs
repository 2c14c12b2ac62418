//! Directory operations built on the backend contract.
//!
//! Backends only know how to create, list and delete individual directory
//! entries. The walker supplies the rest: ancestor discovery, recursive
//! creation, the emptiness check before removal, and the cursor-style
//! listing handle.

use std::collections::BTreeSet;

use crate::backend::StorageBackend;
use crate::context::{Context, Credentials};
use crate::error::{Error, ErrorKind, Result};
use crate::stat::{FileType, S_IFDIR, Stat, unix_now};
use crate::url::Url;

/// The ancestor chain of `url`, closest first, each with the file type
/// found there (`None` for absent ones). The walk stops, inclusively, at
/// the first existing directory.
pub async fn ancestors<B: StorageBackend + ?Sized>(
    backend: &B,
    url: &Url,
    context: &Context,
) -> Result<Vec<(Url, Option<FileType>)>> {
    let mut chain = Vec::new();
    let mut cursor = url.parent();
    while let Some(candidate) = cursor {
        let file_type = backend
            .get_metadata(&candidate, context)
            .await?
            .map(|patch| Stat::from_patch(&patch).file_type());
        let reached_dir = file_type == Some(FileType::Dir);
        cursor = candidate.parent();
        chain.push((candidate, file_type));
        if reached_dir {
            break;
        }
    }
    Ok(chain)
}

/// Create the directory at `url`.
///
/// Non-recursive creation requires the immediate parent to already be a
/// directory. Recursive creation fills in every absent ancestor, top-down,
/// and fails with `NotADirectory` if anything non-directory sits in the
/// chain.
pub async fn mkdir<B: StorageBackend + ?Sized>(
    backend: &B,
    url: &Url,
    permission: u32,
    recursive: bool,
    credentials: Credentials,
    context: &Context,
) -> Result<()> {
    if backend.get_metadata(url, context).await?.is_some() {
        return Err(Error::warning(ErrorKind::AlreadyExists(url.to_string())));
    }

    let stat = dir_stat(permission, credentials);

    if recursive {
        let chain = ancestors(backend, url, context).await?;
        let mut pending = Vec::new();
        for (candidate, file_type) in chain {
            match file_type {
                None => pending.push(candidate),
                Some(FileType::Dir) => {}
                Some(_) => {
                    return Err(Error::warning(ErrorKind::NotADirectory(
                        candidate.to_string(),
                    )));
                }
            }
        }
        for candidate in pending.into_iter().rev() {
            backend.create_directory(&candidate, &stat, context).await?;
        }
    } else if let Some(parent) = url.parent() {
        let is_dir = backend
            .get_metadata(&parent, context)
            .await?
            .map(|patch| Stat::from_patch(&patch).file_type().is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(Error::warning(ErrorKind::NotADirectory(parent.to_string())));
        }
    }

    backend.create_directory(url, &stat, context).await
}

/// Remove the directory at `url`, refusing when entries remain. The dot
/// entries some stores report do not count as contents.
pub async fn rmdir<B: StorageBackend + ?Sized>(
    backend: &B,
    url: &Url,
    context: &Context,
) -> Result<()> {
    let children = backend.children(url, context).await?;
    let occupied = children.iter().any(|child| {
        let name = child.trim_end_matches('/').rsplit('/').next().unwrap_or(child);
        name != "." && name != ".."
    });
    if occupied {
        return Err(Error::warning(ErrorKind::DirectoryNotEmpty(url.to_string())));
    }
    backend.delete_directory(url, context).await
}

/// Open a listing cursor over the directory at `url`.
pub async fn opendir<B: StorageBackend + ?Sized>(
    backend: &B,
    url: &Url,
    context: &Context,
) -> Result<DirHandle> {
    let entries = backend.children(url, context).await?;
    Ok(DirHandle::new(url.to_string(), entries))
}

/// A directory listing with a rewindable cursor. Entries come back as bare
/// child names, not full URLs.
#[derive(Debug, Clone)]
pub struct DirHandle {
    prefix: String,
    entries: Vec<String>,
    cursor: usize,
}

impl DirHandle {
    fn new(url: String, entries: Vec<String>) -> Self {
        Self {
            prefix: format!("{}/", url.trim_end_matches('/')),
            entries,
            cursor: 0,
        }
    }

    /// The next entry name, or `None` when the listing is exhausted.
    pub fn readdir(&mut self) -> Option<String> {
        let entry = self.entries.get(self.cursor)?;
        self.cursor += 1;
        let name = entry.strip_prefix(&self.prefix).unwrap_or(entry);
        Some(name.to_string())
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reduce path `candidates` to the sorted, deduplicated set of direct child
/// names under `parent`. Matching is per path segment: `/ab` is not a child
/// of `/a`.
pub fn filter_child_names<I, S>(parent: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parent = format!("/{}", parent.trim_matches('/'));
    let parent = if parent == "/" { String::new() } else { parent };

    let mut names = BTreeSet::new();
    for candidate in candidates {
        let candidate = format!("/{}", candidate.as_ref().trim_matches('/'));
        let Some(rest) = candidate.strip_prefix(&parent) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix('/') else {
            continue;
        };
        let name = rest.split('/').next().unwrap_or(rest);
        if !name.is_empty() {
            names.insert(name.to_string());
        }
    }
    names.into_iter().collect()
}

fn dir_stat(permission: u32, credentials: Credentials) -> Stat {
    let now = unix_now();
    Stat {
        mode: S_IFDIR | (permission & !credentials.umask),
        uid: credentials.uid.unwrap_or(0),
        gid: credentials.gid.unwrap_or(0),
        ctime: now,
        mtime: now,
        ..Stat::default()
    }
}
