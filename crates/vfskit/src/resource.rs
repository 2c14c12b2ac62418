//! Open-handle state.
//!
//! An [`OpenResource`] is everything the engine tracks between `open` and
//! `close`: the resolved URL, the parsed mode, the working stat, the byte
//! buffers, and the cursor. The buffer shape depends on how the handle was
//! opened, captured by [`Session`].

use std::time::Duration;

use crate::context::Context;
use crate::mode::OpenMode;
use crate::stat::Stat;
use crate::url::Url;

/// Advisory lock state of a handle. Purely in-memory bookkeeping; backends
/// are never told about locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockMode {
    #[default]
    Unlocked,
    Shared,
    Exclusive,
}

/// Buffer state for each open family.
///
/// Append is the odd one out: existing contents are loaded lazily on first
/// read, while writes land in a separate appendix so a handle that only
/// appends never fetches the blob at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// `r` family: contents loaded up front.
    Read { contents: Vec<u8> },
    /// `w` family: starts from an empty buffer, target truncated.
    Write { contents: Vec<u8> },
    /// `x` family: target must not have existed.
    ExclusiveCreate { contents: Vec<u8> },
    /// `c` family: existing contents loaded, or empty for a fresh target.
    CreateOrOpen { contents: Vec<u8> },
    /// `a` family: `contents` stays `None` until a read forces a load;
    /// written bytes accumulate in `appendix`.
    Append {
        contents: Option<Vec<u8>>,
        appendix: Vec<u8>,
    },
}

impl Session {
    pub fn is_append(&self) -> bool {
        matches!(self, Session::Append { .. })
    }

    /// The loaded contents buffer, if one exists. `None` only for an
    /// append session that has not materialized yet.
    pub fn contents(&self) -> Option<&Vec<u8>> {
        match self {
            Session::Read { contents }
            | Session::Write { contents }
            | Session::ExclusiveCreate { contents }
            | Session::CreateOrOpen { contents } => Some(contents),
            Session::Append { contents, .. } => contents.as_ref(),
        }
    }

    pub fn contents_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Session::Read { contents }
            | Session::Write { contents }
            | Session::ExclusiveCreate { contents }
            | Session::CreateOrOpen { contents } => Some(contents),
            Session::Append { contents, .. } => contents.as_mut(),
        }
    }
}

/// One open handle.
#[derive(Debug, Clone)]
pub struct OpenResource {
    pub url: Url,
    pub mode: OpenMode,
    pub stat: Stat,
    pub options: Context,
    pub session: Session,
    /// Byte cursor. In append sessions writes ignore it, reads honor it.
    pub position: u64,
    /// True when nothing needs persisting; set by flush, cleared by write.
    pub flushed: bool,
    pub locked: LockMode,
    /// IO hints accepted for interface completeness. Whole-blob transfer
    /// means they never change behavior here.
    pub blocking: bool,
    pub read_buffer: usize,
    pub write_buffer: usize,
    pub timeout: Option<Duration>,
}

impl OpenResource {
    pub(crate) fn new(url: Url, mode: OpenMode, stat: Stat, options: Context, session: Session) -> Self {
        Self {
            url,
            mode,
            stat,
            options,
            session,
            position: 0,
            flushed: true,
            locked: LockMode::Unlocked,
            blocking: true,
            read_buffer: 0,
            write_buffer: 0,
            timeout: None,
        }
    }

    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
    }

    pub fn set_read_buffer(&mut self, bytes: usize) {
        self.read_buffer = bytes;
    }

    pub fn set_write_buffer(&mut self, bytes: usize) {
        self.write_buffer = bytes;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }
}
