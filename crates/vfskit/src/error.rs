//! Error types for vfskit.
//!
//! Failures come in two severities. `Warning` covers expected runtime
//! conditions (missing files, permission refusals) that callers routinely
//! handle. `Debug` marks contract violations (seeking to a negative offset,
//! truncating a read-only handle) that indicate caller misuse rather than
//! environmental state. Both travel through the same `Result`; the flag lets
//! a host integration map them onto different signalling conventions.

use thiserror::Error;

/// Result type alias using vfskit's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failure category, independent of severity.
#[derive(Error, Debug)]
pub enum ErrorKind {
    /// Mode string contains characters outside `{r,w,x,c,a,+,b,t}` or does
    /// not name exactly one open family.
    #[error("invalid open mode '{0}'")]
    InvalidMode(String),

    /// Exclusive create against an existing target, or duplicate scheme
    /// registration.
    #[error("{0}: already exists")]
    AlreadyExists(String),

    /// Target (or a required ancestor) is absent.
    #[error("{0}: not found")]
    NotFound(String),

    /// An ancestor or listing target exists but is not a directory.
    #[error("{0}: does not exist or is not a directory")]
    NotADirectory(String),

    /// Directory removal refused because children remain.
    #[error("{0}: directory not empty")]
    DirectoryNotEmpty(String),

    /// Stat permission bits deny the requested access for the caller.
    #[error("{0}: permission denied")]
    PermissionDenied(String),

    /// Operation direction not covered by the handle's open mode.
    #[error("bad file descriptor")]
    BadFileDescriptor,

    /// Seek computed a negative position.
    #[error("cannot seek to a negative position")]
    InvalidSeek,

    /// Malformed input: bad URL, zero-length read, missing scheme, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `Url::merge` with two conflicting schemes.
    #[error("scheme mismatch: '{left}' vs '{right}'")]
    SchemeMismatch { left: String, right: String },

    /// Any backend-specific fault, wrapped verbatim.
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// How serious a failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected runtime condition; callers handle these in ordinary flow.
    Warning,
    /// Programming-contract violation; indicates caller misuse.
    Debug,
}

/// A failure: a [`ErrorKind`] tagged with a [`Severity`].
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    severity: Severity,
}

impl Error {
    /// An expected, recoverable failure.
    pub fn warning(kind: ErrorKind) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
        }
    }

    /// A contract-violation failure.
    pub fn debug(kind: ErrorKind) -> Self {
        Self {
            kind,
            severity: Severity::Debug,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// True when the failure marks caller misuse rather than runtime state.
    pub fn is_contract_violation(&self) -> bool {
        self.severity == Severity::Debug
    }

    /// True for the `NotFound` kind, the one failure several algorithms are
    /// allowed to catch (create-or-open, move's destination cleanup).
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::warning(kind)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::warning(ErrorKind::Backend(err))
    }
}
