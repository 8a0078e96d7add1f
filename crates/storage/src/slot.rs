//! Slot identifiers.
//!
//! A slot is named by exactly two decimal digits, `01` through `99`. The same
//! string names both the physical directory under the store root and the key
//! of its record in the sidecar database.

use crate::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::str::FromStr;

/// Lowest valid slot number.
pub const MIN_SLOT: u8 = 1;
/// Highest valid slot number.
pub const MAX_SLOT: u8 = 99;

/// A validated slot number in `01..=99`.
///
/// Displays (and serializes) as the zero-padded two-digit string, which is
/// also the directory name.
///
/// # Examples
///
/// ```
/// use slotkeeper_storage::SlotId;
///
/// let slot: SlotId = "07".parse().unwrap();
/// assert_eq!(slot.number(), 7);
/// assert_eq!(slot.to_string(), "07");
/// assert!("7".parse::<SlotId>().is_err());
/// assert!("00".parse::<SlotId>().is_err());
/// assert!(SlotId::new(100).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotId(u8);

impl SlotId {
    /// Range-checks a slot number.
    pub fn new(number: impl TryInto<u8> + fmt::Display + Copy) -> Result<Self> {
        match number.try_into() {
            Ok(n) if (MIN_SLOT..=MAX_SLOT).contains(&n) => Ok(Self(n)),
            _ => exn::bail!(ErrorKind::InvalidSlot(number.to_string())),
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    /// Interprets a directory entry name as a slot, if it is one.
    ///
    /// Anything that isn't valid UTF-8 or isn't exactly two digits is not a
    /// slot; this never errors.
    pub fn from_dir_name(name: &OsStr) -> Option<Self> {
        name.to_str().and_then(|s| s.parse().ok())
    }
}

impl FromStr for SlotId {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
            exn::bail!(ErrorKind::InvalidSlot(s.to_string()));
        }
        match s.parse::<u8>() {
            Ok(n) if (MIN_SLOT..=MAX_SLOT).contains(&n) => Ok(Self(n)),
            _ => exn::bail!(ErrorKind::InvalidSlot(s.to_string())),
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl TryFrom<String> for SlotId {
    type Error = ErrorKind;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse::<SlotId>().map_err(|_| ErrorKind::InvalidSlot(value))
    }
}

impl From<SlotId> for String {
    fn from(slot: SlotId) -> Self {
        slot.to_string()
    }
}
