//! Status codes exchanged with the filesystem

use core::fmt;

/// Filesystem status code
///
/// The block-device operations only ever produce `Ok`, `Io` and `Inval`;
/// the rest of the table exists so codes reported by the filesystem itself
/// can be named and printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// No error
    Ok = 0,
    /// Error during device operation
    Io = -5,
    /// Corrupted
    Corrupt = -84,
    /// No directory entry
    NoEnt = -2,
    /// Entry already exists
    Exist = -17,
    /// Entry is not a dir
    NotDir = -20,
    /// Entry is a dir
    IsDir = -21,
    /// Dir is not empty
    NotEmpty = -39,
    /// Bad file number
    BadF = -9,
    /// File too large
    FBig = -27,
    /// Invalid parameter
    Inval = -22,
    /// No space left on device
    NoSpc = -28,
    /// No more memory available
    NoMem = -12,
    /// No data/attr available
    NoAttr = -61,
    /// File name too long
    NameTooLong = -36,
}

impl Status {
    const ALL: [Status; 15] = [
        Self::Ok,
        Self::Io,
        Self::Corrupt,
        Self::NoEnt,
        Self::Exist,
        Self::NotDir,
        Self::IsDir,
        Self::NotEmpty,
        Self::BadF,
        Self::FBig,
        Self::Inval,
        Self::NoSpc,
        Self::NoMem,
        Self::NoAttr,
        Self::NameTooLong,
    ];

    /// Numeric code as the filesystem returns it
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Look up a numeric code
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    /// Human-readable description
    pub const fn message(self) -> &'static str {
        match self {
            Self::Ok => "No error",
            Self::Io => "Error during device operation",
            Self::Corrupt => "Corrupted",
            Self::NoEnt => "No directory entry",
            Self::Exist => "Entry already exists",
            Self::NotDir => "Entry is not a dir",
            Self::IsDir => "Entry is a dir",
            Self::NotEmpty => "Dir is not empty",
            Self::BadF => "Bad file number",
            Self::FBig => "File too large",
            Self::Inval => "Invalid parameter",
            Self::NoSpc => "No space left on device",
            Self::NoMem => "No more memory available",
            Self::NoAttr => "No data/attr available",
            Self::NameTooLong => "File name too long",
        }
    }
}

/// Describe any numeric code, including ones outside the table
pub fn describe(code: i32) -> &'static str {
    Status::from_code(code).map_or("Unknown error", Status::message)
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<crate::Error> for Status {
    fn from(e: crate::Error) -> Self {
        e.status()
    }
}

/// Collapse a driver result into the code the filesystem expects
pub fn to_code(result: crate::Result<()>) -> i32 {
    match result {
        Ok(()) => Status::Ok.code(),
        Err(e) => e.status().code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Phase};

    #[test]
    fn test_codes() {
        assert_eq!(Status::Io.code(), -5);
        assert_eq!(Status::Inval.code(), -22);
        assert_eq!(Status::from_code(-84), Some(Status::Corrupt));
        assert_eq!(Status::from_code(1), None);
        assert_eq!(describe(-28), "No space left on device");
        assert_eq!(describe(-1000), "Unknown error");
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(to_code(Ok(())), 0);
        assert_eq!(to_code(Err(Error::BusyTimeout)), -5);
        assert_eq!(to_code(Err(Error::TransportTimeout(Phase::Transmit))), -5);
        assert_eq!(to_code(Err(Error::AddressOutOfRange)), -22);
        assert_eq!(Status::from(Error::InvalidRegister(9)), Status::Inval);
    }
}
