//! Concrete hash algorithms.
//!
//! Every algorithm appends an optional salt to its input before hashing, so a
//! deployment can change every signature at once without touching the stages.

use super::HashFunction;
use crate::errors::HashError;
use clap::ValueEnum;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Algorithm selector used by configuration and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// MD5, lowercase hex
    Md5,
    /// CRC-32 (IEEE), decimal
    Crc32,
    /// SHA-256, lowercase hex
    Sha256,
    /// XXH64 with seed 0, decimal
    Xxh64,
}

impl HashAlgorithm {
    /// Instantiate the algorithm with the given salt.
    pub fn build(self, salt: &str) -> Box<dyn HashFunction> {
        match self {
            Self::Md5 => Box::new(Md5Hash::with_salt(salt)),
            Self::Crc32 => Box::new(Crc32Hash::with_salt(salt)),
            Self::Sha256 => Box::new(Sha256Hash::with_salt(salt)),
            Self::Xxh64 => Box::new(Xxh64Hash::with_salt(salt)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Crc32 => "crc32",
            Self::Sha256 => "sha256",
            Self::Xxh64 => "xxh64",
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn salted<'a>(data: &'a str, salt: &str) -> std::borrow::Cow<'a, str> {
    if salt.is_empty() {
        std::borrow::Cow::Borrowed(data)
    } else {
        std::borrow::Cow::Owned(format!("{data}{salt}"))
    }
}

/// MD5 digest rendered as lowercase hex.
#[derive(Debug, Clone, Default)]
pub struct Md5Hash {
    salt: String,
}

impl Md5Hash {
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl HashFunction for Md5Hash {
    fn name(&self) -> &str {
        "md5"
    }

    fn hash(&self, data: &str) -> Result<String, HashError> {
        let mut hasher = Md5::new();
        hasher.update(salted(data, &self.salt).as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// CRC-32 (IEEE) checksum rendered as an unsigned decimal.
#[derive(Debug, Clone, Default)]
pub struct Crc32Hash {
    salt: String,
}

impl Crc32Hash {
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl HashFunction for Crc32Hash {
    fn name(&self) -> &str {
        "crc32"
    }

    fn hash(&self, data: &str) -> Result<String, HashError> {
        let checksum = crc32fast::hash(salted(data, &self.salt).as_bytes());
        Ok(checksum.to_string())
    }
}

/// SHA-256 digest rendered as lowercase hex.
#[derive(Debug, Clone, Default)]
pub struct Sha256Hash {
    salt: String,
}

impl Sha256Hash {
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl HashFunction for Sha256Hash {
    fn name(&self) -> &str {
        "sha256"
    }

    fn hash(&self, data: &str) -> Result<String, HashError> {
        let mut hasher = Sha256::new();
        hasher.update(salted(data, &self.salt).as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// XXH64 (seed 0) rendered as an unsigned decimal.
#[derive(Debug, Clone, Default)]
pub struct Xxh64Hash {
    salt: String,
}

impl Xxh64Hash {
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl HashFunction for Xxh64Hash {
    fn name(&self) -> &str {
        "xxh64"
    }

    fn hash(&self, data: &str) -> Result<String, HashError> {
        let value = xxhash_rust::xxh64::xxh64(salted(data, &self.salt).as_bytes(), 0);
        Ok(value.to_string())
    }
}
