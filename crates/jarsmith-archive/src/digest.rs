//! Named message digests used for manifest checksums.

use jarsmith_core::{ArchiveError, ArchiveResult};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::io::{self, Read, Write};

/// Algorithms used when checksums are requested without a list
pub const DEFAULT_DIGEST_ALGORITHMS: [&str; 2] = ["SHA", "MD5"];

const CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Md5,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Resolve a digest name; `SHA` is the historical name of SHA-1
    pub fn from_name(name: &str) -> ArchiveResult<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SHA" | "SHA1" | "SHA-1" => Ok(DigestAlgorithm::Sha1),
            "MD5" => Ok(DigestAlgorithm::Md5),
            "SHA256" | "SHA-256" => Ok(DigestAlgorithm::Sha256),
            "SHA512" | "SHA-512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(ArchiveError::UnsupportedDigest(name.to_string())),
        }
    }
}

/// A running digest that can be fed as a [`Write`] sink
pub enum Digester {
    Sha1(Sha1),
    Md5(Md5),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Digester {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha1 => Digester::Sha1(Sha1::new()),
            DigestAlgorithm::Md5 => Digester::Md5(Md5::new()),
            DigestAlgorithm::Sha256 => Digester::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Digester::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Sha1(d) => d.update(data),
            Digester::Md5(d) => d.update(data),
            Digester::Sha256(d) => d.update(data),
            Digester::Sha512(d) => d.update(data),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        match self {
            Digester::Sha1(d) => d.finalize().to_vec(),
            Digester::Md5(d) => d.finalize().to_vec(),
            Digester::Sha256(d) => d.finalize().to_vec(),
            Digester::Sha512(d) => d.finalize().to_vec(),
        }
    }
}

impl Write for Digester {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Feed a stream through several digests at once in fixed-size chunks
pub fn update_all(digesters: &mut [Digester], input: &mut dyn Read) -> io::Result<()> {
    let mut buffer = vec![0u8; CHUNK];
    loop {
        let n = input.read(&mut buffer)?;
        if n == 0 {
            return Ok(());
        }
        for digester in digesters.iter_mut() {
            digester.update(&buffer[..n]);
        }
    }
}

/// Compute SHA256 hash of data and return as hex string.
pub fn compute_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
