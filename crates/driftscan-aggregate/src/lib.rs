//! Module-level fingerprint aggregation.
//!
//! Aggregation must be invariant to discovery order: constituents are
//! sorted by `path` before folding, never by hash and never by the order a
//! walker or worker pool produced them. The aggregate sha is a digest over
//! the sorted constituent hashes; the aggregate simhash treats each file's
//! simhash as one token weighted by its normalized byte length, so longer
//! files pull the module signature proportionally harder.

#![forbid(unsafe_code)]

use sha2::{Digest, Sha256};

use driftscan_fingerprint::weighted_simhash64;
use driftscan_types::{FileFingerprint, ModuleFingerprint};

/// Separator between constituent hashes inside the aggregate digest.
const HASH_SEPARATOR: &[u8] = b"\n";

/// Fold file fingerprints into one module fingerprint.
///
/// The input may arrive in any order. Callers must not pass an empty slice;
/// an empty module is classified `MISSING` upstream and never aggregated.
pub fn aggregate(module_id: &str, file_fingerprints: &[FileFingerprint]) -> ModuleFingerprint {
    debug_assert!(
        !file_fingerprints.is_empty(),
        "empty modules are classified MISSING before aggregation"
    );

    let mut files = file_fingerprints.to_vec();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Sha256::new();
    for (i, fp) in files.iter().enumerate() {
        if i > 0 {
            hasher.update(HASH_SEPARATOR);
        }
        hasher.update(fp.sha256_normalized.as_bytes());
    }
    let aggregate_sha256 = hex_encode(&hasher.finalize());

    let aggregate_simhash64 = weighted_simhash64(
        files
            .iter()
            .map(|fp| (fp.simhash64, fp.normalized_byte_length)),
    );

    ModuleFingerprint {
        module_id: module_id.to_string(),
        aggregate_sha256,
        aggregate_simhash64,
        files,
    }
}

/// Cache key for a module fingerprint: digest over the module id plus the
/// path-sorted constituent hash tuple. A pure function of content, never of
/// timestamps or discovery order.
pub fn module_cache_key(module_id: &str, file_fingerprints: &[FileFingerprint]) -> String {
    let mut order: Vec<&FileFingerprint> = file_fingerprints.iter().collect();
    order.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Sha256::new();
    hasher.update(module_id.as_bytes());
    for fp in order {
        hasher.update(HASH_SEPARATOR);
        hasher.update(fp.sha256_normalized.as_bytes());
    }
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
