//! File fingerprinting and similarity scoring.
//!
//! Two digests per file, both over the *normalized* text:
//! 1. `sha256_normalized`: exact content identity, and the cache key.
//! 2. `simhash64`: a locality-sensitive 64-bit digest. Tokenize into
//!    word-like tokens, hash each distinct token weighted by its occurrence
//!    count, and take the signed bit-vote per position. Near-duplicate
//!    inputs land at small Hamming distance, which is the entire reason a
//!    non-cryptographic digest exists next to the SHA-256.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::hash::Hasher;

use rustc_hash::FxHasher;
use sha2::{Digest, Sha256};

use driftscan_types::FileFingerprint;

/// Hex-encoded SHA-256 of a string's UTF-8 bytes.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Split normalized text into word-like tokens: maximal runs of
/// alphanumerics and `_`.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
}

fn token_hash(token: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(token.as_bytes());
    hasher.finish()
}

/// Weighted signed bit-vote over 64-bit values.
///
/// Zero input weight produces 0, not the all-ones value the `sum >= 0` rule
/// would otherwise yield.
pub fn weighted_simhash64(weighted: impl IntoIterator<Item = (u64, u64)>) -> u64 {
    let mut votes = [0i64; 64];
    let mut any = false;
    for (value, weight) in weighted {
        if weight == 0 {
            continue;
        }
        any = true;
        let w = weight as i64;
        for (i, vote) in votes.iter_mut().enumerate() {
            if (value >> i) & 1 == 1 {
                *vote += w;
            } else {
                *vote -= w;
            }
        }
    }
    if !any {
        return 0;
    }
    let mut digest = 0u64;
    for (i, vote) in votes.iter().enumerate() {
        if *vote >= 0 {
            digest |= 1 << i;
        }
    }
    digest
}

/// Simhash of normalized text. Empty text (no tokens) digests to 0.
pub fn simhash64(text: &str) -> u64 {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    weighted_simhash64(counts.into_iter().map(|(t, n)| (token_hash(t), n)))
}

/// Fingerprint one file's normalized text.
pub fn fingerprint_file(path: &str, normalized: &str) -> FileFingerprint {
    FileFingerprint {
        path: path.to_string(),
        sha256_normalized: sha256_hex(normalized),
        simhash64: simhash64(normalized),
        normalized_byte_length: normalized.len() as u64,
    }
}

/// Count of differing bits between two simhash values (0..=64).
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Closeness score in [0, 1] between two (sha256, simhash) fingerprints.
///
/// Identical content hashes score exactly 1.0 regardless of the simhash
/// values; otherwise the score decays linearly with Hamming distance.
pub fn similarity(sha_a: &str, simhash_a: u64, sha_b: &str, simhash_b: u64) -> f64 {
    if sha_a == sha_b {
        return 1.0;
    }
    1.0 - f64::from(hamming_distance(simhash_a, simhash_b)) / 64.0
}
