use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Board message identifier: 8 lowercase hexadecimal characters.
///
/// Short enough to type into `hotdesk reply`, random enough that the
/// collision check at post time almost never has to regenerate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub const HEX_LEN: usize = 8;

    /// Generate a fresh message ID using OS-backed CSPRNG entropy.
    pub fn generate() -> io::Result<Self> {
        Self::generate_with(|bytes| getrandom::fill(bytes).map_err(io::Error::other))
    }

    /// Test hook: inject deterministic random bytes when needed.
    pub(crate) fn generate_with<F>(mut fill_random: F) -> io::Result<Self>
    where
        F: FnMut(&mut [u8]) -> io::Result<()>,
    {
        let mut bytes = [0_u8; std::mem::size_of::<u32>()];
        fill_random(&mut bytes)?;
        Ok(Self::from(u32::from_be_bytes(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate_and_normalize(value: &str) -> Result<String, MessageIdParseError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(MessageIdParseError::Empty);
        }
        if trimmed.len() != Self::HEX_LEN {
            return Err(MessageIdParseError::InvalidLength(trimmed.len()));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MessageIdParseError::InvalidCharacter);
        }

        Ok(trimmed.to_ascii_lowercase())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = MessageIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Self::validate_and_normalize(s)?))
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<u32> for MessageId {
    fn from(value: u32) -> Self {
        Self(format!("{value:08x}"))
    }
}

impl From<MessageId> for String {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

impl Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageIdParseError {
    Empty,
    InvalidLength(usize),
    InvalidCharacter,
}

impl fmt::Display for MessageIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "message id cannot be empty"),
            Self::InvalidLength(actual) => write!(
                f,
                "message id must be exactly {} hex characters (got {})",
                MessageId::HEX_LEN,
                actual
            ),
            Self::InvalidCharacter => {
                write!(f, "message id must contain only ASCII hex characters (0-9, a-f)")
            }
        }
    }
}

impl std::error::Error for MessageIdParseError {}
