//! Virtual stream engine over pluggable whole-blob storage.
//!
//! vfskit gives any URL-addressable store a POSIX-like file surface:
//! open modes (`r`, `w`, `x`, `c`, `a`, each with `+`), cursored reads and
//! writes with sparse zero-fill, truncate, flush-on-close, stat and
//! permission bits, and directory trees. A backend only implements the
//! small [`StorageBackend`] contract, whole blobs in and out; the engine
//! supplies all stream semantics on top.
//!
//! The easiest entry point is [`Vfs`], which routes string paths through a
//! scheme registry:
//!
//! ```
//! # tokio_test::block_on(async {
//! use std::sync::Arc;
//! use vfskit::{MemoryBackend, RegisterFlags, Vfs};
//!
//! let vfs = Vfs::new();
//! vfs.register("mem://host", Arc::new(MemoryBackend::new()), RegisterFlags::default())
//!     .await?;
//!
//! vfs.write_file("mem://host/greeting.txt", b"hello").await?;
//! let mut handle = vfs.open("mem://host/greeting.txt", "r").await?;
//! assert_eq!(handle.read(5).await?, b"hello");
//! handle.close().await?;
//! # Ok::<(), vfskit::Error>(())
//! # }).unwrap();
//! ```

pub mod backend;
pub mod context;
pub mod engine;
pub mod error;
pub mod memory;
pub mod mode;
pub mod registry;
pub mod resource;
pub mod stat;
pub mod url;
pub mod walker;

pub use async_trait::async_trait;
pub use backend::StorageBackend;
pub use context::{Context, Credentials};
pub use engine::{StreamEngine, move_across};
pub use error::{Error, ErrorKind, Result, Severity};
pub use memory::MemoryBackend;
pub use mode::OpenMode;
pub use registry::{RegisterFlags, SchemeRegistry};
pub use resource::{LockMode, OpenResource, Session};
pub use stat::{FileType, Stat, StatPatch};
pub use url::{Query, QueryValue, Url};
pub use walker::DirHandle;

pub use std::io::SeekFrom;

use std::sync::Arc;

/// The facade: a scheme registry plus a caller identity, exposing the whole
/// operation surface on string paths.
#[derive(Default)]
pub struct Vfs {
    registry: SchemeRegistry,
    credentials: Credentials,
}

impl Vfs {
    /// A namespace with no registered schemes and an anonymous caller.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            registry: SchemeRegistry::new(),
            credentials,
        }
    }

    pub fn registry(&self) -> &SchemeRegistry {
        &self.registry
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
    }

    /// Register `backend` under the scheme of `default_url`.
    pub async fn register(
        &self,
        default_url: &str,
        backend: Arc<dyn StorageBackend>,
        flags: RegisterFlags,
    ) -> Result<()> {
        self.register_with(default_url, backend, Context::new(), flags)
            .await
    }

    /// Like [`Vfs::register`], with an option bag handed to the backend on
    /// every operation under this scheme.
    pub async fn register_with(
        &self,
        default_url: &str,
        backend: Arc<dyn StorageBackend>,
        options: Context,
        flags: RegisterFlags,
    ) -> Result<()> {
        self.registry.register(default_url, backend, options, flags).await
    }

    pub async fn unregister(&self, scheme: &str) -> Result<()> {
        self.registry.unregister(scheme).await
    }

    async fn resolve(&self, path: &str) -> Result<(StreamEngine<dyn StorageBackend>, Url, Context)> {
        let (backend, url, options) = self.registry.resolve(path).await?;
        Ok((StreamEngine::new(backend, self.credentials), url, options))
    }

    /// Open a stream handle on `path`.
    pub async fn open(&self, path: &str, mode: &str) -> Result<FileHandle> {
        let (engine, url, options) = self.resolve(path).await?;
        let resource = engine.open(url, mode, options).await?;
        Ok(FileHandle { engine, resource })
    }

    pub async fn stat(&self, path: &str) -> Result<Stat> {
        let (engine, url, options) = self.resolve(path).await?;
        engine.stat(&url, &options).await
    }

    /// Symlinks are not modeled, so this is [`Vfs::stat`] under its POSIX
    /// alias.
    pub async fn lstat(&self, path: &str) -> Result<Stat> {
        self.stat(path).await
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let (engine, url, options) = self.resolve(path).await?;
        Ok(engine.backend().get_metadata(&url, &options).await?.is_some())
    }

    /// Update timestamps, creating an empty file when absent.
    pub async fn touch(&self, path: &str, mtime: Option<i64>, atime: Option<i64>) -> Result<()> {
        let (engine, url, options) = self.resolve(path).await?;
        engine.touch(&url, mtime, atime, &options).await
    }

    pub async fn unlink(&self, path: &str) -> Result<()> {
        let (engine, url, options) = self.resolve(path).await?;
        engine.unlink(&url, &options).await
    }

    /// Rename within one scheme, or move the blob across backends when the
    /// two paths resolve to different schemes.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let (from_backend, from_url, from_options) = self.registry.resolve(from).await?;
        let (to_backend, to_url, _) = self.registry.resolve(to).await?;
        if from_url.scheme == to_url.scheme {
            from_backend.rename(&from_url, &to_url, &from_options).await
        } else {
            move_across(&*from_backend, &*to_backend, &from_url, &to_url, &from_options).await
        }
    }

    pub async fn chmod(&self, path: &str, permission: u32) -> Result<()> {
        let (engine, url, options) = self.resolve(path).await?;
        engine.chmod(&url, permission, &options).await
    }

    pub async fn chown(&self, path: &str, uid: u32) -> Result<()> {
        let (engine, url, options) = self.resolve(path).await?;
        engine.chown(&url, uid, &options).await
    }

    pub async fn chgrp(&self, path: &str, gid: u32) -> Result<()> {
        let (engine, url, options) = self.resolve(path).await?;
        engine.chgrp(&url, gid, &options).await
    }

    pub async fn mkdir(&self, path: &str, permission: u32, recursive: bool) -> Result<()> {
        let (engine, url, options) = self.resolve(path).await?;
        walker::mkdir(
            &**engine.backend(),
            &url,
            permission,
            recursive,
            self.credentials,
            &options,
        )
        .await
    }

    pub async fn rmdir(&self, path: &str) -> Result<()> {
        let (engine, url, options) = self.resolve(path).await?;
        walker::rmdir(&**engine.backend(), &url, &options).await
    }

    pub async fn opendir(&self, path: &str) -> Result<DirHandle> {
        let (engine, url, options) = self.resolve(path).await?;
        walker::opendir(&**engine.backend(), &url, &options).await
    }

    /// Whole-file read convenience: open `r`, drain, close.
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut handle = self.open(path, "r").await?;
        let contents = handle.read_to_end().await?;
        handle.close().await?;
        Ok(contents)
    }

    /// Whole-file write convenience: open `w`, write, close.
    pub async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        let mut handle = self.open(path, "w").await?;
        handle.write(contents)?;
        handle.close().await
    }
}

/// An open stream: an engine clone bound to one [`OpenResource`].
///
/// Dropping a handle without [`FileHandle::close`] loses unflushed writes;
/// there is no async drop to do it for you.
pub struct FileHandle {
    engine: StreamEngine<dyn StorageBackend>,
    resource: OpenResource,
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl FileHandle {
    pub async fn read(&mut self, length: usize) -> Result<Vec<u8>> {
        self.engine.read(&mut self.resource, length).await
    }

    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let chunk = self.engine.read(&mut self.resource, 64 * 1024).await?;
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.engine.write(&mut self.resource, data)
    }

    pub fn seek(&mut self, from: SeekFrom) -> Result<u64> {
        self.engine.seek(&mut self.resource, from)
    }

    pub fn tell(&self) -> u64 {
        self.engine.tell(&self.resource)
    }

    pub fn eof(&self) -> bool {
        self.engine.eof(&self.resource)
    }

    pub async fn truncate(&mut self, size: u64) -> Result<()> {
        self.engine.truncate(&mut self.resource, size).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.engine.flush(&mut self.resource).await
    }

    pub fn lock(&mut self, mode: LockMode) {
        self.engine.lock(&mut self.resource, mode);
    }

    pub fn locked(&self) -> LockMode {
        self.resource.locked
    }

    pub fn stat(&self) -> Stat {
        self.engine.fstat(&self.resource)
    }

    pub fn url(&self) -> &Url {
        &self.resource.url
    }

    pub fn set_blocking(&mut self, blocking: bool) {
        self.resource.set_blocking(blocking);
    }

    pub fn set_read_buffer(&mut self, bytes: usize) {
        self.resource.set_read_buffer(bytes);
    }

    pub fn set_write_buffer(&mut self, bytes: usize) {
        self.resource.set_write_buffer(bytes);
    }

    pub fn set_timeout(&mut self, timeout: std::time::Duration) {
        self.resource.set_timeout(timeout);
    }

    /// Flush and consume the handle.
    pub async fn close(self) -> Result<()> {
        self.engine.close(self.resource).await
    }
}
