//! The stream engine: POSIX-like handle semantics over whole-blob storage.
//!
//! The engine owns everything a backend should not have to know about:
//! open-mode dispatch, permission checks, the byte cursor, sparse zero-fill
//! writes, append buffering, and at-most-once flushing. A backend only ever
//! sees complete blobs and metadata patches.

use std::io::SeekFrom;
use std::sync::Arc;

use crate::backend::StorageBackend;
use crate::context::{Context, Credentials};
use crate::error::{Error, ErrorKind, Result};
use crate::mode::OpenMode;
use crate::resource::{LockMode, OpenResource, Session};
use crate::stat::{S_IFREG, Stat, StatPatch, unix_now};
use crate::url::Url;

/// Stream semantics bound to one backend and one caller identity.
pub struct StreamEngine<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
    credentials: Credentials,
}

impl<B: StorageBackend + ?Sized> Clone for StreamEngine<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            credentials: self.credentials,
        }
    }
}

impl<B: StorageBackend + ?Sized> StreamEngine<B> {
    pub fn new(backend: Arc<B>, credentials: Credentials) -> Self {
        Self {
            backend,
            credentials,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
    }

    /// Open a handle on `url`.
    ///
    /// Each open family has its own contract: `r` loads and requires
    /// existence, `w` truncates-or-creates, `x` refuses an existing target,
    /// `c` loads-or-creates, and `a` positions at the end without loading
    /// anything.
    pub async fn open(&self, url: Url, mode: &str, options: Context) -> Result<OpenResource> {
        let mode = OpenMode::parse(mode)?;
        tracing::debug!(url = %url, mode = %mode, "open");

        if mode.is_read_mode() {
            let (contents, patch) = self.backend.select(&url, &options).await?;
            let mut stat = Stat::from_patch(&patch);
            stat.size = contents.len() as u64;
            self.check_permission(&url, &mode, &stat)?;
            return Ok(OpenResource::new(
                url,
                mode,
                stat,
                options,
                Session::Read { contents },
            ));
        }

        if mode.is_write_mode() {
            let meta = self.backend.get_metadata(&url, &options).await?;
            let mut patch = meta.unwrap_or_else(|| self.fresh_patch());
            patch.mtime = Some(unix_now());
            patch.size = Some(0);
            let stat = Stat::from_patch(&patch);
            self.check_permission(&url, &mode, &stat)?;
            self.backend.create(&url, &[], &stat, &options).await?;
            return Ok(OpenResource::new(
                url,
                mode,
                stat,
                options,
                Session::Write {
                    contents: Vec::new(),
                },
            ));
        }

        if mode.is_exclusive_mode() {
            if self.backend.get_metadata(&url, &options).await?.is_some() {
                return Err(Error::warning(ErrorKind::AlreadyExists(url.to_string())));
            }
            let mut patch = self.fresh_patch();
            patch.mtime = Some(unix_now());
            let stat = Stat::from_patch(&patch);
            self.check_permission(&url, &mode, &stat)?;
            self.backend.create(&url, &[], &stat, &options).await?;
            return Ok(OpenResource::new(
                url,
                mode,
                stat,
                options,
                Session::ExclusiveCreate {
                    contents: Vec::new(),
                },
            ));
        }

        if mode.is_create_mode() {
            let existing = match self.backend.select(&url, &options).await {
                Ok(found) => Some(found),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            let (contents, stat, fresh) = match existing {
                Some((contents, patch)) => {
                    let mut stat = Stat::from_patch(&patch);
                    stat.size = contents.len() as u64;
                    (contents, stat, false)
                }
                None => {
                    let mut patch = self.fresh_patch();
                    patch.mtime = Some(unix_now());
                    (Vec::new(), Stat::from_patch(&patch), true)
                }
            };
            self.check_permission(&url, &mode, &stat)?;
            if fresh {
                self.backend.create(&url, &[], &stat, &options).await?;
            }
            return Ok(OpenResource::new(
                url,
                mode,
                stat,
                options,
                Session::CreateOrOpen { contents },
            ));
        }

        if mode.is_append_mode() {
            let (stat, fresh) = match self.backend.get_metadata(&url, &options).await? {
                Some(patch) => (Stat::from_patch(&patch), false),
                None => {
                    let mut patch = self.fresh_patch();
                    patch.mtime = Some(unix_now());
                    (Stat::from_patch(&patch), true)
                }
            };
            self.check_permission(&url, &mode, &stat)?;
            if fresh {
                self.backend.create(&url, &[], &stat, &options).await?;
            }
            let position = stat.size;
            let mut resource = OpenResource::new(
                url,
                mode,
                stat,
                options,
                Session::Append {
                    contents: None,
                    appendix: Vec::new(),
                },
            );
            resource.position = position;
            return Ok(resource);
        }

        Err(Error::debug(ErrorKind::InvalidMode(mode.to_string())))
    }

    /// Read up to `length` bytes from the cursor. An append handle loads
    /// existing contents on the first read and sees its own unflushed
    /// appendix after them. A zero `length` is caller misuse.
    pub async fn read(&self, resource: &mut OpenResource, length: usize) -> Result<Vec<u8>> {
        if !resource.mode.is_readable() {
            return Err(Error::warning(ErrorKind::BadFileDescriptor));
        }
        if length == 0 {
            return Err(Error::debug(ErrorKind::InvalidArgument(
                "read length must be positive".to_string(),
            )));
        }

        let OpenResource {
            url,
            options,
            session,
            position,
            ..
        } = resource;

        if let Session::Append { contents, .. } = session {
            if contents.is_none() {
                let (loaded, _) = self.backend.select(url, options).await?;
                *contents = Some(loaded);
            }
        }

        let (front, back): (&[u8], &[u8]) = match &*session {
            Session::Append { contents, appendix } => {
                (contents.as_deref().unwrap_or(&[]), appendix.as_slice())
            }
            Session::Read { contents }
            | Session::Write { contents }
            | Session::ExclusiveCreate { contents }
            | Session::CreateOrOpen { contents } => (contents.as_slice(), &[]),
        };

        let total = front.len() + back.len();
        let start = (*position as usize).min(total);
        let end = (start + length).min(total);

        let mut out = Vec::with_capacity(end - start);
        if start < front.len() {
            out.extend_from_slice(&front[start..end.min(front.len())]);
        }
        if end > front.len() {
            let from = start.max(front.len()) - front.len();
            out.extend_from_slice(&back[from..end - front.len()]);
        }

        *position += out.len() as u64;
        Ok(out)
    }

    /// Write `data` at the cursor. A cursor beyond the end zero-fills the
    /// gap. Append handles ignore the cursor entirely and stage bytes in
    /// the appendix.
    pub fn write(&self, resource: &mut OpenResource, data: &[u8]) -> Result<usize> {
        if !resource.mode.is_writable() {
            return Err(Error::warning(ErrorKind::BadFileDescriptor));
        }

        resource.flushed = false;
        resource.stat.mtime = unix_now();

        match &mut resource.session {
            Session::Append { appendix, .. } => {
                appendix.extend_from_slice(data);
                resource.stat.size += data.len() as u64;
            }
            Session::Read { contents }
            | Session::Write { contents }
            | Session::ExclusiveCreate { contents }
            | Session::CreateOrOpen { contents } => {
                let start = resource.position as usize;
                let end = start + data.len();
                if contents.len() < end {
                    contents.resize(end, 0);
                }
                contents[start..end].copy_from_slice(data);
                resource.position = end as u64;
                resource.stat.size = contents.len() as u64;
            }
        }

        Ok(data.len())
    }

    /// Resize the buffer to exactly `size` bytes, zero-filling growth. An
    /// append handle materializes its contents first; afterwards it behaves
    /// like a loaded handle until flush.
    pub async fn truncate(&self, resource: &mut OpenResource, size: u64) -> Result<()> {
        if !resource.mode.is_writable() {
            return Err(Error::debug(ErrorKind::BadFileDescriptor));
        }

        let OpenResource {
            url,
            options,
            session,
            stat,
            flushed,
            ..
        } = resource;

        if let Session::Append { contents, appendix } = session {
            let mut merged = match contents.take() {
                Some(loaded) => loaded,
                None => self.backend.select(url, options).await?.0,
            };
            merged.extend_from_slice(appendix);
            appendix.clear();
            *contents = Some(merged);
        }

        match session {
            Session::Append { contents, .. } => {
                if let Some(contents) = contents {
                    contents.resize(size as usize, 0);
                }
            }
            Session::Read { contents }
            | Session::Write { contents }
            | Session::ExclusiveCreate { contents }
            | Session::CreateOrOpen { contents } => contents.resize(size as usize, 0),
        }

        stat.size = size;
        stat.mtime = unix_now();
        *flushed = false;
        Ok(())
    }

    /// Move the cursor. Seeking past the end is fine (a later write
    /// zero-fills); resolving to a negative position is caller misuse.
    pub fn seek(&self, resource: &mut OpenResource, from: SeekFrom) -> Result<u64> {
        let target: i128 = match from {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => resource.position as i128 + delta as i128,
            SeekFrom::End(delta) => resource.stat.size as i128 + delta as i128,
        };
        if target < 0 {
            return Err(Error::debug(ErrorKind::InvalidSeek));
        }
        resource.position = target as u64;
        Ok(resource.position)
    }

    pub fn tell(&self, resource: &OpenResource) -> u64 {
        resource.position
    }

    pub fn eof(&self, resource: &OpenResource) -> bool {
        resource.position >= resource.stat.size
    }

    /// Persist buffered bytes, at most once per dirty window. An untouched
    /// or read-only handle is a no-op. The dirty flag clears before the
    /// backend call, so a failed flush does not retry on close.
    pub async fn flush(&self, resource: &mut OpenResource) -> Result<()> {
        if resource.flushed || !resource.mode.is_writable() {
            return Ok(());
        }
        resource.flushed = true;
        tracing::debug!(url = %resource.url, "flush");

        let OpenResource {
            url,
            options,
            session,
            stat,
            ..
        } = resource;

        match session {
            Session::Append { contents, appendix } => {
                match contents.take() {
                    // materialized by a truncate: replace the whole blob
                    Some(mut merged) => {
                        merged.extend_from_slice(appendix);
                        self.backend.create(url, &merged, stat, options).await?;
                    }
                    None => {
                        self.backend.append(url, appendix, options).await?;
                    }
                }
                appendix.clear();
            }
            Session::Read { contents }
            | Session::Write { contents }
            | Session::ExclusiveCreate { contents }
            | Session::CreateOrOpen { contents } => {
                self.backend.create(url, contents, stat, options).await?;
            }
        }

        Ok(())
    }

    /// Flush and drop the handle.
    pub async fn close(&self, mut resource: OpenResource) -> Result<()> {
        self.flush(&mut resource).await
    }

    /// Advisory locking: recorded on the handle, enforced by nobody.
    pub fn lock(&self, resource: &mut OpenResource, mode: LockMode) {
        resource.locked = mode;
    }

    pub fn fstat(&self, resource: &OpenResource) -> Stat {
        resource.stat.clone()
    }

    /// Stat by URL. Absence is a warning-level failure here, unlike the
    /// `get_metadata` probe underneath.
    pub async fn stat(&self, url: &Url, context: &Context) -> Result<Stat> {
        match self.backend.get_metadata(url, context).await? {
            Some(patch) => Ok(Stat::from_patch(&patch)),
            None => Err(Error::warning(ErrorKind::NotFound(url.to_string()))),
        }
    }

    /// Update timestamps, creating an empty file when the target is
    /// absent. Passing no timestamps on an existing target changes nothing.
    pub async fn touch(
        &self,
        url: &Url,
        mtime: Option<i64>,
        atime: Option<i64>,
        context: &Context,
    ) -> Result<()> {
        match self.backend.get_metadata(url, context).await? {
            None => {
                let mut stat = Stat::from_patch(&self.fresh_patch());
                stat.mtime = unix_now();
                stat.touch(mtime, atime);
                self.backend.create(url, &[], &stat, context).await
            }
            Some(_) => {
                let mut stat = Stat::default();
                let patch = stat.touch(mtime, atime);
                if patch.is_empty() {
                    return Ok(());
                }
                self.backend.set_metadata(url, &patch, context).await
            }
        }
    }

    pub async fn unlink(&self, url: &Url, context: &Context) -> Result<()> {
        self.backend.delete(url, context).await
    }

    pub async fn rename(&self, from: &Url, to: &Url, context: &Context) -> Result<()> {
        self.backend.rename(from, to, context).await
    }

    pub async fn chmod(&self, url: &Url, permission: u32, context: &Context) -> Result<()> {
        let mut stat = Stat::default();
        let patch = stat.chmod(permission, self.credentials.umask);
        self.backend.set_metadata(url, &patch, context).await
    }

    pub async fn chown(&self, url: &Url, uid: u32, context: &Context) -> Result<()> {
        let mut stat = Stat::default();
        let patch = stat.chown(uid);
        self.backend.set_metadata(url, &patch, context).await
    }

    pub async fn chgrp(&self, url: &Url, gid: u32, context: &Context) -> Result<()> {
        let mut stat = Stat::default();
        let patch = stat.chgrp(gid);
        self.backend.set_metadata(url, &patch, context).await
    }

    fn check_permission(&self, url: &Url, mode: &OpenMode, stat: &Stat) -> Result<()> {
        let Credentials { uid, gid, .. } = self.credentials;
        if (mode.is_readable() && !stat.is_readable(uid, gid))
            || (mode.is_writable() && !stat.is_writable(uid, gid))
        {
            return Err(Error::warning(ErrorKind::PermissionDenied(url.to_string())));
        }
        Ok(())
    }

    // Ownership and timestamps for a blob this engine brings into
    // existence.
    fn fresh_patch(&self) -> StatPatch {
        StatPatch {
            mode: Some(S_IFREG | (0o777 & !self.credentials.umask)),
            uid: Some(self.credentials.uid.unwrap_or(0)),
            gid: Some(self.credentials.gid.unwrap_or(0)),
            ctime: Some(unix_now()),
            ..StatPatch::default()
        }
    }
}

/// Move a blob between two backends: read it whole from the source, replace
/// whatever sits at the destination, then delete the original. This is how
/// rename works when the two URLs resolve to different schemes.
pub async fn move_across<S, D>(
    source: &S,
    destination: &D,
    from: &Url,
    to: &Url,
    context: &Context,
) -> Result<()>
where
    S: StorageBackend + ?Sized,
    D: StorageBackend + ?Sized,
{
    let (contents, patch) = source.select(from, context).await?;
    match destination.delete(to, context).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }
    destination
        .create(to, &contents, &Stat::from_patch(&patch), context)
        .await?;
    source.delete(from, context).await
}
