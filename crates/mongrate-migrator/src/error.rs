use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use thiserror::Error;

/// Bit mask of failure categories. Codes combine with `|`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ErrorCode(u32);

impl ErrorCode {
    /// The script directory or a script file could not be read.
    pub const FILE_ACCESS: Self = Self(0x01);
    /// The history collection could not be reached or queried.
    pub const DB_ACCESS: Self = Self(0x02);
    /// A database read, write or command failed.
    pub const DB_OPERATION: Self = Self(0x04);
    /// A recorded script was visited after an unrecorded one in strict mode.
    pub const ORDER_FAILED: Self = Self(0x08);
    /// Hashing failed, or a recorded script's content changed.
    pub const HASHING_FAILED: Self = Self(0x10);

    const NAMES: [(Self, &'static str); 5] = [
        (Self::FILE_ACCESS, "FileAccess"),
        (Self::DB_ACCESS, "DbAccess"),
        (Self::DB_OPERATION, "DbOperation"),
        (Self::ORDER_FAILED, "OrderFailed"),
        (Self::HASHING_FAILED, "HashingFailed"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ErrorCode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ErrorCode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "{:#04x}", self.0)
        } else {
            f.write_str(&names.join(" | "))
        }
    }
}

/// The single failure that ended a migration run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct MigrationError {
    message: String,
    code: ErrorCode,
}

impl MigrationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Flag membership test, e.g. `err.is(ErrorCode::DB_OPERATION)`.
    pub fn is(&self, flag: ErrorCode) -> bool {
        self.code.contains(flag)
    }
}
