//! Open-mode string model.
//!
//! A mode string is the POSIX `fopen` family: `r`, `r+`, `w`, `w+`, `x`,
//! `x+`, `c`, `c+`, `a`, `a+`, optionally suffixed with the binary/text
//! markers `b`/`t`, which are accepted and discarded. Exactly one of the
//! five family letters must be present; the `+` modifier opens the other
//! direction as well.

use crate::error::{Error, ErrorKind, Result};

const VALID: &str = "rwxca+bt";
const PRIMARY: &str = "rwxca";

/// Parsed open mode. Derived once per open; drives every subsequent
/// read/write permission check on the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenMode {
    // normalized: b/t markers stripped
    flags: String,
}

impl OpenMode {
    /// Parse a mode string, rejecting it before any backend I/O happens.
    pub fn parse(mode: &str) -> Result<Self> {
        if mode.chars().any(|c| !VALID.contains(c)) {
            return Err(Error::warning(ErrorKind::InvalidMode(mode.to_string())));
        }

        let flags: String = mode.chars().filter(|c| !"bt".contains(*c)).collect();

        let primaries = flags.chars().filter(|c| PRIMARY.contains(*c)).count();
        let plusses = flags.chars().filter(|&c| c == '+').count();
        if primaries != 1 || plusses > 1 {
            return Err(Error::warning(ErrorKind::InvalidMode(mode.to_string())));
        }

        Ok(Self { flags })
    }

    pub fn is_read_mode(&self) -> bool {
        self.flags.contains('r')
    }

    pub fn is_write_mode(&self) -> bool {
        self.flags.contains('w')
    }

    pub fn is_exclusive_mode(&self) -> bool {
        self.flags.contains('x')
    }

    pub fn is_create_mode(&self) -> bool {
        self.flags.contains('c')
    }

    pub fn is_append_mode(&self) -> bool {
        self.flags.contains('a')
    }

    /// The handle may be read from: `r` family, or any family with `+`.
    pub fn is_readable(&self) -> bool {
        self.flags.contains('r') || self.flags.contains('+')
    }

    /// The handle may be written to: anything but plain `r`.
    pub fn is_writable(&self) -> bool {
        !self.flags.contains('r') || self.flags.contains('+')
    }

    pub fn is_appendable(&self) -> bool {
        self.flags.contains('a')
    }
}

impl std::str::FromStr for OpenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for OpenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // (mode, read, write, exclusive, create, append, readable, writable, appendable)
    #[rustfmt::skip]
    const TABLE: &[(&str, [bool; 8])] = &[
        ("r",  [true,  false, false, false, false, true,  false, false]),
        ("r+", [true,  false, false, false, false, true,  true,  false]),
        ("w",  [false, true,  false, false, false, false, true,  false]),
        ("w+", [false, true,  false, false, false, true,  true,  false]),
        ("x",  [false, false, true,  false, false, false, true,  false]),
        ("x+", [false, false, true,  false, false, true,  true,  false]),
        ("c",  [false, false, false, true,  false, false, true,  false]),
        ("c+", [false, false, false, true,  false, true,  true,  false]),
        ("a",  [false, false, false, false, true,  false, true,  true]),
        ("a+", [false, false, false, false, true,  true,  true,  true]),
    ];

    #[test]
    fn predicate_table() {
        for (mode, expected) in TABLE {
            let m = OpenMode::parse(mode).expect(mode);
            let got = [
                m.is_read_mode(),
                m.is_write_mode(),
                m.is_exclusive_mode(),
                m.is_create_mode(),
                m.is_append_mode(),
                m.is_readable(),
                m.is_writable(),
                m.is_appendable(),
            ];
            assert_eq!(&got, expected, "mode {mode}");
        }
    }

    #[test]
    fn markers_are_stripped() {
        assert_eq!(OpenMode::parse("r+bt").unwrap().to_string(), "r+");
        assert_eq!(OpenMode::parse("rb").unwrap().to_string(), "r");
    }

    #[test]
    fn invalid_modes_rejected() {
        for mode in ["d+", "", "b", "+", "rw", "r++", "ra"] {
            let err = OpenMode::parse(mode).unwrap_err();
            assert!(
                matches!(err.kind(), ErrorKind::InvalidMode(_)),
                "mode {mode:?}"
            );
        }
    }
}
