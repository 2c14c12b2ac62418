//! In-memory backend: a path-keyed map behind a lock.
//!
//! The reference implementation of [`StorageBackend`], used by the test
//! suite and useful as scratch storage. Entries are keyed by normalized
//! path, so every authority on the same backend sees the same tree. The
//! root directory always exists.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::backend::StorageBackend;
use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::stat::{S_IFDIR, Stat, StatPatch, TYPE_MASK, unix_now};
use crate::url::Url;
use crate::walker::filter_child_names;

#[derive(Debug, Clone)]
struct Entry {
    stat: StatPatch,
    contents: Vec<u8>,
}

impl Entry {
    fn is_dir(&self) -> bool {
        self.stat.mode.is_some_and(|mode| mode & TYPE_MASK == S_IFDIR)
    }
}

/// Whole-blob storage in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        {
            let mut entries = backend.entries.write().unwrap();
            entries.insert(
                "/".to_string(),
                Entry {
                    stat: StatPatch {
                        mode: Some(S_IFDIR | 0o777),
                        ctime: Some(unix_now()),
                        ..StatPatch::default()
                    },
                    contents: Vec::new(),
                },
            );
        }
        backend
    }

    /// Number of stored entries, the root included.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    fn not_found(url: &Url) -> Error {
        Error::warning(ErrorKind::NotFound(url.to_string()))
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get_metadata(&self, url: &Url, _context: &Context) -> Result<Option<StatPatch>> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(&url.path()).map(|entry| {
            let mut patch = entry.stat.clone();
            patch.size = Some(entry.contents.len() as u64);
            patch
        }))
    }

    async fn set_metadata(&self, url: &Url, patch: &StatPatch, _context: &Context) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .get_mut(&url.path())
            .ok_or_else(|| Self::not_found(url))?;
        // size is derived from contents here, never stored
        let mut patch = patch.clone();
        patch.size = None;
        entry.stat.merge(&patch);
        Ok(())
    }

    async fn select(&self, url: &Url, _context: &Context) -> Result<(Vec<u8>, StatPatch)> {
        let entries = self.entries.read().unwrap();
        let entry = entries
            .get(&url.path())
            .ok_or_else(|| Self::not_found(url))?;
        if entry.is_dir() {
            return Err(Error::warning(ErrorKind::InvalidArgument(format!(
                "'{url}' is a directory"
            ))));
        }
        let mut patch = entry.stat.clone();
        patch.size = Some(entry.contents.len() as u64);
        Ok((entry.contents.clone(), patch))
    }

    async fn create(
        &self,
        url: &Url,
        contents: &[u8],
        stat: &Stat,
        _context: &Context,
    ) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        if let Some(parent) = url.parent() {
            let ok = entries.get(&parent.path()).is_some_and(Entry::is_dir);
            if !ok {
                return Err(Error::warning(ErrorKind::NotADirectory(parent.to_string())));
            }
        }
        entries.insert(
            url.path(),
            Entry {
                stat: StatPatch::from(stat),
                contents: contents.to_vec(),
            },
        );
        Ok(())
    }

    async fn append(&self, url: &Url, contents: &[u8], _context: &Context) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .get_mut(&url.path())
            .ok_or_else(|| Self::not_found(url))?;
        entry.contents.extend_from_slice(contents);
        entry.stat.mtime = Some(unix_now());
        Ok(())
    }

    async fn delete(&self, url: &Url, _context: &Context) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let key = url.path();
        match entries.get(&key) {
            None => Err(Self::not_found(url)),
            Some(entry) if entry.is_dir() => Err(Error::warning(ErrorKind::InvalidArgument(
                format!("'{url}' is a directory"),
            ))),
            Some(_) => {
                entries.remove(&key);
                Ok(())
            }
        }
    }

    async fn rename(&self, from: &Url, to: &Url, _context: &Context) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let from_key = from.path();
        let to_key = to.path();
        if !entries.contains_key(&from_key) {
            return Err(Self::not_found(from));
        }

        let prefix = format!("{}/", from_key.trim_end_matches('/'));
        let moved: Vec<String> = entries
            .keys()
            .filter(|key| **key == from_key || key.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(entry) = entries.remove(&key) {
                let new_key = format!("{to_key}{}", &key[from_key.len()..]);
                entries.insert(new_key, entry);
            }
        }
        Ok(())
    }

    async fn children(&self, url: &Url, _context: &Context) -> Result<Vec<String>> {
        let entries = self.entries.read().unwrap();
        let key = url.path();
        let ok = entries.get(&key).is_some_and(Entry::is_dir);
        if !ok {
            return Err(Error::warning(ErrorKind::NotADirectory(url.to_string())));
        }
        let base = url.to_string();
        let base = base.trim_end_matches('/');
        Ok(filter_child_names(&key, entries.keys())
            .into_iter()
            .map(|name| format!("{base}/{name}"))
            .collect())
    }

    async fn create_directory(&self, url: &Url, stat: &Stat, _context: &Context) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let key = url.path();
        if entries.contains_key(&key) {
            return Err(Error::warning(ErrorKind::AlreadyExists(url.to_string())));
        }
        if let Some(parent) = url.parent() {
            let ok = entries.get(&parent.path()).is_some_and(Entry::is_dir);
            if !ok {
                return Err(Error::warning(ErrorKind::NotADirectory(parent.to_string())));
            }
        }
        entries.insert(
            key,
            Entry {
                stat: StatPatch::from(stat),
                contents: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_directory(&self, url: &Url, _context: &Context) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let key = url.path();
        match entries.get(&key) {
            None => Err(Self::not_found(url)),
            Some(entry) if !entry.is_dir() => Err(Error::warning(ErrorKind::NotADirectory(
                url.to_string(),
            ))),
            Some(_) => {
                entries.remove(&key);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url(path: &str) -> Url {
        Url::parse(&format!("mem://h{path}")).unwrap()
    }

    fn ctx() -> Context {
        Context::new()
    }

    #[tokio::test]
    async fn root_always_exists() {
        let backend = MemoryBackend::new();
        let meta = backend.get_metadata(&url("/"), &ctx()).await.unwrap();
        let stat = Stat::from_patch(&meta.unwrap());
        assert!(stat.file_type().is_dir());
    }

    #[tokio::test]
    async fn create_requires_directory_parent() {
        let backend = MemoryBackend::new();
        let err = backend
            .create(&url("/no/such/f"), b"x", &Stat::default(), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotADirectory(_)));

        backend
            .create(&url("/f"), b"abc", &Stat::default(), &ctx())
            .await
            .unwrap();
        let (contents, patch) = backend.select(&url("/f"), &ctx()).await.unwrap();
        assert_eq!(contents, b"abc");
        assert_eq!(patch.size, Some(3));
    }

    #[tokio::test]
    async fn metadata_size_tracks_contents() {
        let backend = MemoryBackend::new();
        backend
            .create(&url("/f"), b"abc", &Stat::default(), &ctx())
            .await
            .unwrap();
        backend.append(&url("/f"), b"de", &ctx()).await.unwrap();
        let meta = backend.get_metadata(&url("/f"), &ctx()).await.unwrap();
        assert_eq!(meta.unwrap().size, Some(5));

        // a size smuggled through set_metadata is ignored
        let patch = StatPatch {
            size: Some(999),
            uid: Some(7),
            ..StatPatch::default()
        };
        backend.set_metadata(&url("/f"), &patch, &ctx()).await.unwrap();
        let meta = backend.get_metadata(&url("/f"), &ctx()).await.unwrap().unwrap();
        assert_eq!(meta.size, Some(5));
        assert_eq!(meta.uid, Some(7));
    }

    #[tokio::test]
    async fn rename_moves_subtrees() {
        let backend = MemoryBackend::new();
        let dir = Stat {
            mode: S_IFDIR | 0o777,
            ..Stat::default()
        };
        backend.create_directory(&url("/d"), &dir, &ctx()).await.unwrap();
        backend
            .create(&url("/d/f"), b"x", &Stat::default(), &ctx())
            .await
            .unwrap();

        backend.rename(&url("/d"), &url("/e"), &ctx()).await.unwrap();
        assert!(backend.get_metadata(&url("/d/f"), &ctx()).await.unwrap().is_none());
        let (contents, _) = backend.select(&url("/e/f"), &ctx()).await.unwrap();
        assert_eq!(contents, b"x");
    }

    #[tokio::test]
    async fn children_lists_direct_names_only() {
        let backend = MemoryBackend::new();
        let dir = Stat {
            mode: S_IFDIR | 0o777,
            ..Stat::default()
        };
        backend.create_directory(&url("/d"), &dir, &ctx()).await.unwrap();
        backend.create_directory(&url("/d/sub"), &dir, &ctx()).await.unwrap();
        backend
            .create(&url("/d/f"), b"", &Stat::default(), &ctx())
            .await
            .unwrap();
        backend
            .create(&url("/d/sub/deep"), b"", &Stat::default(), &ctx())
            .await
            .unwrap();
        // sibling with a shared name prefix must not leak in
        backend.create_directory(&url("/dx"), &dir, &ctx()).await.unwrap();

        let children = backend.children(&url("/d"), &ctx()).await.unwrap();
        assert_eq!(children, ["mem://h/d/f", "mem://h/d/sub"]);

        let err = backend.children(&url("/d/f"), &ctx()).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotADirectory(_)));
    }

    #[tokio::test]
    async fn delete_is_file_only() {
        let backend = MemoryBackend::new();
        let dir = Stat {
            mode: S_IFDIR | 0o777,
            ..Stat::default()
        };
        backend.create_directory(&url("/d"), &dir, &ctx()).await.unwrap();
        let err = backend.delete(&url("/d"), &ctx()).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
        let err = backend.delete_directory(&url("/missing"), &ctx()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
