use std::fmt;

use rand::Rng;

/// Number of random bytes in a [`JobId`].
pub const JOB_ID_BYTES: usize = 8;

/// Unique identifier for a single compile job.
///
/// Eight bytes drawn from the thread-local CSPRNG, rendered as 16 lowercase
/// hex characters. The id names the job's sandbox directory, so two
/// concurrent jobs must never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct JobId(pub [u8; JOB_ID_BYTES]);

impl JobId {
    /// Creates a new random `JobId`.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = [0u8; JOB_ID_BYTES];
        rand::rng().fill(&mut bytes);
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; JOB_ID_BYTES] {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A SHA-256 digest of a compiled artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Creates a `ContentHash` from a raw 32-byte array.
    #[must_use]
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
