//! POSIX stat model: file types, permission bits, minimal change-sets.

use serde::{Deserialize, Serialize};

/// Type bit patterns, stored in the high-order bits of `mode`.
pub const S_IFIFO: u32 = 0o010000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFSOCK: u32 = 0o140000;

/// Mask selecting the type bits of a mode.
pub const TYPE_MASK: u32 = 0o770000;

const READ: u32 = 0o4;
const WRITE: u32 = 0o2;
const EXECUTE: u32 = 0o1;

const OWNER: u32 = 0o100;
const GROUP: u32 = 0o010;
const OTHER: u32 = 0o001;

/// Current unix time in whole seconds.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// File type, decoded from the stat mode's type bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Fifo,
    Char,
    Dir,
    Block,
    File,
    Link,
    Socket,
    Unknown,
}

impl FileType {
    pub fn is_dir(self) -> bool {
        self == FileType::Dir
    }

    pub fn is_file(self) -> bool {
        self == FileType::File
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Fifo => "fifo",
            FileType::Char => "char",
            FileType::Dir => "dir",
            FileType::Block => "block",
            FileType::File => "file",
            FileType::Link => "link",
            FileType::Socket => "socket",
            FileType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full stat record for one resource.
///
/// Defaults describe a fresh regular file: mode `S_IFREG | 0o777`, one link,
/// `rdev`/`blksize`/`blocks` at `-1` (unknown/unsupported), everything else
/// zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub dev: i64,
    pub ino: i64,
    pub mode: u32,
    pub nlink: i64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: i64,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub blksize: i64,
    pub blocks: i64,
}

impl Default for Stat {
    fn default() -> Self {
        Self {
            dev: 0,
            ino: 0,
            mode: S_IFREG | 0o777,
            nlink: 1,
            uid: 0,
            gid: 0,
            rdev: -1,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            blksize: -1,
            blocks: -1,
        }
    }
}

impl Stat {
    /// Build a full record from a partial one, filling unset fields with the
    /// defaults. This is how backend metadata (which may carry any subset of
    /// fields) becomes a stat.
    pub fn from_patch(patch: &StatPatch) -> Self {
        let mut stat = Self::default();
        stat.apply(patch);
        stat
    }

    /// Overlay the set fields of `patch` onto this record.
    pub fn apply(&mut self, patch: &StatPatch) {
        if let Some(v) = patch.dev {
            self.dev = v;
        }
        if let Some(v) = patch.ino {
            self.ino = v;
        }
        if let Some(v) = patch.mode {
            self.mode = v;
        }
        if let Some(v) = patch.nlink {
            self.nlink = v;
        }
        if let Some(v) = patch.uid {
            self.uid = v;
        }
        if let Some(v) = patch.gid {
            self.gid = v;
        }
        if let Some(v) = patch.rdev {
            self.rdev = v;
        }
        if let Some(v) = patch.size {
            self.size = v;
        }
        if let Some(v) = patch.atime {
            self.atime = v;
        }
        if let Some(v) = patch.mtime {
            self.mtime = v;
        }
        if let Some(v) = patch.ctime {
            self.ctime = v;
        }
        if let Some(v) = patch.blksize {
            self.blksize = v;
        }
        if let Some(v) = patch.blocks {
            self.blocks = v;
        }
    }

    /// Decode the type bits. An unmatched pattern is `Unknown`, never an
    /// error.
    pub fn file_type(&self) -> FileType {
        match self.mode & TYPE_MASK {
            S_IFIFO => FileType::Fifo,
            S_IFCHR => FileType::Char,
            S_IFDIR => FileType::Dir,
            S_IFBLK => FileType::Block,
            S_IFREG => FileType::File,
            S_IFLNK => FileType::Link,
            S_IFSOCK => FileType::Socket,
            _ => FileType::Unknown,
        }
    }

    /// Update the given timestamps, stamping `ctime` whenever anything
    /// changed. Returns only the fields actually touched so backends can
    /// persist a minimal patch; both arguments `None` is a no-op yielding an
    /// empty patch.
    pub fn touch(&mut self, mtime: Option<i64>, atime: Option<i64>) -> StatPatch {
        if mtime.is_none() && atime.is_none() {
            return StatPatch::default();
        }

        let mut patch = StatPatch::default();
        if let Some(mtime) = mtime {
            self.mtime = mtime;
            patch.mtime = Some(mtime);
        }
        if let Some(atime) = atime {
            self.atime = atime;
            patch.atime = Some(atime);
        }
        self.ctime = unix_now();
        patch.ctime = Some(self.ctime);
        patch
    }

    /// Replace the permission bits, preserving the type bits and applying
    /// the caller's umask. Stamps `ctime`.
    pub fn chmod(&mut self, permission: u32, umask: u32) -> StatPatch {
        self.mode = (self.mode & TYPE_MASK) | (permission & !umask);
        self.ctime = unix_now();
        StatPatch {
            mode: Some(self.mode),
            ctime: Some(self.ctime),
            ..StatPatch::default()
        }
    }

    /// Replace the owner id, stamping `ctime`.
    pub fn chown(&mut self, uid: u32) -> StatPatch {
        self.uid = uid;
        self.ctime = unix_now();
        StatPatch {
            uid: Some(uid),
            ctime: Some(self.ctime),
            ..StatPatch::default()
        }
    }

    /// Replace the group id, stamping `ctime`.
    pub fn chgrp(&mut self, gid: u32) -> StatPatch {
        self.gid = gid;
        self.ctime = unix_now();
        StatPatch {
            gid: Some(gid),
            ctime: Some(self.ctime),
            ..StatPatch::default()
        }
    }

    pub fn is_readable(&self, uid: Option<u32>, gid: Option<u32>) -> bool {
        self.is_able(uid, gid, READ)
    }

    pub fn is_writable(&self, uid: Option<u32>, gid: Option<u32>) -> bool {
        self.is_able(uid, gid, WRITE)
    }

    pub fn is_executable(&self, uid: Option<u32>, gid: Option<u32>) -> bool {
        self.is_able(uid, gid, EXECUTE)
    }

    // Identity-based exclusivity: owner bits apply only to the owner, group
    // bits only to the group, other bits only when neither id matches. A
    // failed owner/group bit test never falls through to the other bits.
    fn is_able(&self, uid: Option<u32>, gid: Option<u32>, rwx: u32) -> bool {
        if uid == Some(0) {
            return true;
        }

        let uid_match = uid == Some(self.uid);
        let gid_match = gid == Some(self.gid);

        if uid_match && self.mode & (rwx * OWNER) != 0 {
            return true;
        }
        if gid_match && self.mode & (rwx * GROUP) != 0 {
            return true;
        }
        !uid_match && !gid_match && self.mode & (rwx * OTHER) != 0
    }
}

/// Partial stat: every field optional.
///
/// Used in both directions of the backend contract: `get_metadata` returns
/// whatever subset the backend tracks, and `set_metadata` receives the
/// minimal change-set produced by [`Stat::touch`]/[`Stat::chmod`] and
/// friends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatPatch {
    pub dev: Option<i64>,
    pub ino: Option<i64>,
    pub mode: Option<u32>,
    pub nlink: Option<i64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub rdev: Option<i64>,
    pub size: Option<u64>,
    pub atime: Option<i64>,
    pub mtime: Option<i64>,
    pub ctime: Option<i64>,
    pub blksize: Option<i64>,
    pub blocks: Option<i64>,
}

impl StatPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay the set fields of `other` onto this patch.
    pub fn merge(&mut self, other: &StatPatch) {
        macro_rules! fill {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        fill!(dev, ino, mode, nlink, uid, gid, rdev, size, atime, mtime, ctime, blksize, blocks);
    }
}

impl From<&Stat> for StatPatch {
    fn from(stat: &Stat) -> Self {
        Self {
            dev: Some(stat.dev),
            ino: Some(stat.ino),
            mode: Some(stat.mode),
            nlink: Some(stat.nlink),
            uid: Some(stat.uid),
            gid: Some(stat.gid),
            rdev: Some(stat.rdev),
            size: Some(stat.size),
            atime: Some(stat.atime),
            mtime: Some(stat.mtime),
            ctime: Some(stat.ctime),
            blksize: Some(stat.blksize),
            blocks: Some(stat.blocks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let stat = Stat::default();
        assert_eq!(stat.mode, S_IFREG | 0o777);
        assert_eq!(stat.nlink, 1);
        assert_eq!(stat.rdev, -1);
        assert_eq!(stat.blksize, -1);
        assert_eq!(stat.blocks, -1);
        assert_eq!(stat.size, 0);
        assert_eq!(stat.file_type(), FileType::File);
    }

    #[test]
    fn file_type_decoding() {
        for (bits, expected) in [
            (S_IFIFO, FileType::Fifo),
            (S_IFCHR, FileType::Char),
            (S_IFDIR, FileType::Dir),
            (S_IFBLK, FileType::Block),
            (S_IFREG, FileType::File),
            (S_IFLNK, FileType::Link),
            (S_IFSOCK, FileType::Socket),
        ] {
            let stat = Stat {
                mode: bits | 0o644,
                ..Stat::default()
            };
            assert_eq!(stat.file_type(), expected);
        }

        let odd = Stat {
            mode: 0o660000,
            ..Stat::default()
        };
        assert_eq!(odd.file_type(), FileType::Unknown);
    }

    #[test]
    fn touch_is_minimal() {
        let mut stat = Stat::default();
        assert!(stat.touch(None, None).is_empty());

        let patch = stat.touch(Some(100), None);
        assert_eq!(patch.mtime, Some(100));
        assert_eq!(patch.atime, None);
        assert!(patch.ctime.is_some());
        assert_eq!(stat.mtime, 100);

        let patch = stat.touch(Some(200), Some(300));
        assert_eq!(patch.mtime, Some(200));
        assert_eq!(patch.atime, Some(300));
        assert!(patch.ctime.is_some());
    }

    #[test]
    fn chmod_preserves_type_bits() {
        let mut stat = Stat {
            mode: S_IFDIR | 0o777,
            ..Stat::default()
        };
        let patch = stat.chmod(0o640, 0);
        assert_eq!(stat.mode, S_IFDIR | 0o640);
        assert_eq!(patch.mode, Some(S_IFDIR | 0o640));
        assert_eq!(stat.file_type(), FileType::Dir);
    }

    #[test]
    fn chmod_applies_umask() {
        let mut stat = Stat::default();
        stat.chmod(0o777, 0o022);
        assert_eq!(stat.mode & 0o7777, 0o755);
    }

    #[test]
    fn chown_chgrp() {
        let mut stat = Stat::default();
        let patch = stat.chown(48);
        assert_eq!(patch.uid, Some(48));
        assert_eq!(stat.uid, 48);

        let patch = stat.chgrp(27);
        assert_eq!(patch.gid, Some(27));
        assert_eq!(stat.gid, 27);
    }

    #[test]
    fn root_always_passes() {
        let stat = Stat {
            mode: S_IFREG,
            uid: 48,
            gid: 27,
            ..Stat::default()
        };
        assert!(stat.is_readable(Some(0), None));
        assert!(stat.is_writable(Some(0), Some(99)));
    }

    #[test]
    fn permission_exclusivity() {
        // Group-only bits: the owner does not fall through to group or
        // other bits merely because the owner bits fail.
        let stat = Stat {
            mode: S_IFREG | 0o070,
            uid: 48,
            gid: 27,
            ..Stat::default()
        };
        assert!(!stat.is_readable(Some(48), Some(99)));
        assert!(stat.is_readable(Some(99), Some(27)));
        assert!(!stat.is_readable(Some(99), Some(99)));

        // Other-only bits apply only when neither id matches.
        let stat = Stat {
            mode: S_IFREG | 0o007,
            uid: 48,
            gid: 27,
            ..Stat::default()
        };
        assert!(!stat.is_readable(Some(48), Some(99)));
        assert!(!stat.is_readable(Some(99), Some(27)));
        assert!(stat.is_readable(Some(99), Some(99)));
        assert!(stat.is_readable(None, None));
    }

    #[test]
    fn from_patch_fills_defaults() {
        let patch = StatPatch {
            size: Some(42),
            uid: Some(7),
            ..StatPatch::default()
        };
        let stat = Stat::from_patch(&patch);
        assert_eq!(stat.size, 42);
        assert_eq!(stat.uid, 7);
        assert_eq!(stat.mode, S_IFREG | 0o777);
        assert_eq!(stat.nlink, 1);
    }

    #[test]
    fn patch_merge() {
        let mut a = StatPatch {
            size: Some(1),
            mtime: Some(10),
            ..StatPatch::default()
        };
        let b = StatPatch {
            mtime: Some(20),
            ctime: Some(30),
            ..StatPatch::default()
        };
        a.merge(&b);
        assert_eq!(a.size, Some(1));
        assert_eq!(a.mtime, Some(20));
        assert_eq!(a.ctime, Some(30));
    }
}
