//! Open flags
//!
//! This module defines the bitmask passed to the engine when a database is opened.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Bitmask of `SQLITE_OPEN_*` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpenFlags(i32);

impl OpenFlags {
    /// Open read-only
    pub const READONLY: OpenFlags = OpenFlags(0x0000_0001);
    /// Open for reading and writing
    pub const READWRITE: OpenFlags = OpenFlags(0x0000_0002);
    /// Create the database if it does not exist
    pub const CREATE: OpenFlags = OpenFlags(0x0000_0004);
    /// Delete the file when closed (VFS only)
    pub const DELETEONCLOSE: OpenFlags = OpenFlags(0x0000_0008);
    /// Exclusive access (VFS only)
    pub const EXCLUSIVE: OpenFlags = OpenFlags(0x0000_0010);
    /// Automatic proxy locking (VFS only)
    pub const AUTOPROXY: OpenFlags = OpenFlags(0x0000_0020);
    /// Interpret the filename as a URI
    pub const URI: OpenFlags = OpenFlags(0x0000_0040);
    /// Open an in-memory database
    pub const MEMORY: OpenFlags = OpenFlags(0x0000_0080);
    /// Main database file (VFS only)
    pub const MAIN_DB: OpenFlags = OpenFlags(0x0000_0100);
    /// Temporary database (VFS only)
    pub const TEMP_DB: OpenFlags = OpenFlags(0x0000_0200);
    /// Transient database (VFS only)
    pub const TRANSIENT_DB: OpenFlags = OpenFlags(0x0000_0400);
    /// Main journal (VFS only)
    pub const MAIN_JOURNAL: OpenFlags = OpenFlags(0x0000_0800);
    /// Temporary journal (VFS only)
    pub const TEMP_JOURNAL: OpenFlags = OpenFlags(0x0000_1000);
    /// Sub-journal (VFS only)
    pub const SUBJOURNAL: OpenFlags = OpenFlags(0x0000_2000);
    /// Super-journal (VFS only)
    pub const SUPER_JOURNAL: OpenFlags = OpenFlags(0x0000_4000);
    /// Multi-thread mode: no per-connection mutex
    pub const NOMUTEX: OpenFlags = OpenFlags(0x0000_8000);
    /// Serialized mode: every call on the connection is mutex-protected
    pub const FULLMUTEX: OpenFlags = OpenFlags(0x0001_0000);
    /// Enable shared cache
    pub const SHAREDCACHE: OpenFlags = OpenFlags(0x0002_0000);
    /// Disable shared cache
    pub const PRIVATECACHE: OpenFlags = OpenFlags(0x0004_0000);
    /// Write-ahead log (VFS only)
    pub const WAL: OpenFlags = OpenFlags(0x0008_0000);
    /// Refuse to follow symbolic links
    pub const NOFOLLOW: OpenFlags = OpenFlags(0x0100_0000);

    const NAMES: &'static [(OpenFlags, &'static str)] = &[
        (OpenFlags::READONLY, "O_READONLY"),
        (OpenFlags::READWRITE, "O_READWRITE"),
        (OpenFlags::CREATE, "O_CREATE"),
        (OpenFlags::DELETEONCLOSE, "O_DELETEONCLOSE"),
        (OpenFlags::EXCLUSIVE, "O_EXCLUSIVE"),
        (OpenFlags::AUTOPROXY, "O_AUTOPROXY"),
        (OpenFlags::URI, "O_URI"),
        (OpenFlags::MEMORY, "O_MEMORY"),
        (OpenFlags::MAIN_DB, "O_MAIN_DB"),
        (OpenFlags::TEMP_DB, "O_TEMP_DB"),
        (OpenFlags::TRANSIENT_DB, "O_TRANSIENT_DB"),
        (OpenFlags::MAIN_JOURNAL, "O_MAIN_JOURNAL"),
        (OpenFlags::TEMP_JOURNAL, "O_TEMP_JOURNAL"),
        (OpenFlags::SUBJOURNAL, "O_SUBJOURNAL"),
        (OpenFlags::SUPER_JOURNAL, "O_SUPER_JOURNAL"),
        (OpenFlags::NOMUTEX, "O_NOMUTEX"),
        (OpenFlags::FULLMUTEX, "O_FULLMUTEX"),
        (OpenFlags::SHAREDCACHE, "O_SHAREDCACHE"),
        (OpenFlags::PRIVATECACHE, "O_PRIVATECACHE"),
        (OpenFlags::WAL, "O_WAL"),
        (OpenFlags::NOFOLLOW, "O_NOFOLLOW"),
    ];

    /// No flags set
    pub const fn empty() -> Self {
        OpenFlags(0)
    }

    /// Build flags from a raw bitmask
    pub const fn from_bits(bits: i32) -> Self {
        OpenFlags(bits)
    }

    /// The raw bitmask
    pub const fn bits(&self) -> i32 {
        self.0
    }

    /// Check if no flag is set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Check if every flag in `other` is set
    pub const fn contains(&self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// `O_FULLMUTEX | O_READWRITE | O_CREATE`
impl Default for OpenFlags {
    fn default() -> Self {
        OpenFlags::FULLMUTEX | OpenFlags::READWRITE | OpenFlags::CREATE
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: OpenFlags) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<OpenFlags> for OpenFlags {
    fn from_iter<I: IntoIterator<Item = OpenFlags>>(iter: I) -> Self {
        iter.into_iter().fold(OpenFlags::empty(), |acc, f| acc | f)
    }
}

impl fmt::Display for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}

impl FromStr for OpenFlags {
    type Err = String;

    /// Parse a `|`-separated list such as `"O_READWRITE|O_CREATE"`.
    ///
    /// The `O_` prefix and letter case are optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let upper = part.to_uppercase();
                let name = if upper.starts_with("O_") {
                    upper
                } else {
                    format!("O_{upper}")
                };
                Self::NAMES
                    .iter()
                    .find(|(_, n)| *n == name)
                    .map(|(flag, _)| *flag)
                    .ok_or_else(|| format!("Invalid open flag: '{}'", part))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let flags = OpenFlags::default();
        assert!(flags.contains(OpenFlags::FULLMUTEX));
        assert!(flags.contains(OpenFlags::READWRITE));
        assert!(flags.contains(OpenFlags::CREATE));
        assert!(!flags.contains(OpenFlags::READONLY));
        assert_eq!(flags.bits(), 0x0001_0006);
    }

    #[test]
    fn test_flags_display() {
        assert_eq!(
            OpenFlags::default().to_string(),
            "O_READWRITE|O_CREATE|O_FULLMUTEX"
        );
        assert_eq!(OpenFlags::empty().to_string(), "");
    }

    #[test]
    fn test_flags_from_str() {
        assert_eq!(
            "O_READWRITE|O_CREATE|O_FULLMUTEX".parse::<OpenFlags>().ok(),
            Some(OpenFlags::default())
        );
        assert_eq!(
            "readonly | uri".parse::<OpenFlags>().ok(),
            Some(OpenFlags::READONLY | OpenFlags::URI)
        );
        assert!("O_BOGUS".parse::<OpenFlags>().is_err());
    }

    #[test]
    fn test_flags_collect() {
        let flags: OpenFlags = [OpenFlags::READONLY, OpenFlags::NOMUTEX].into_iter().collect();
        assert_eq!(flags, OpenFlags::READONLY | OpenFlags::NOMUTEX);
    }
}
