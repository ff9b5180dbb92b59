//! Participant identity
//!
//! The user id is generated once by the composition root and passed
//! down explicitly; the username is validated here before a session
//! can start.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::UserInputError;

/// Characters used for generated user ids (base 36)
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of a generated user id
const ID_LEN: usize = 9;

/// Per-process client identifier sent as a connection parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Generate a fresh random id like "k3x9q0abz"
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..ID_LEN)
            .map(|_| *ID_ALPHABET.choose(&mut rng).unwrap_or(&b'0') as char)
            .collect();
        Self(id)
    }

    /// Use an existing id (e.g. a fixed one in tests)
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display name chosen at session start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Trim and validate a raw username
    pub fn parse(raw: &str) -> Result<Self, UserInputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UserInputError::EmptyUsername);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
