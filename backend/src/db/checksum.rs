//! Checksums identifying a ledger and the parameters it was partitioned with.

use sha2::{Digest, Sha256};

use crate::algorithms::RoundParameters;
use crate::models::Match;

/// Calculate SHA-256 checksum of arbitrary content.
///
/// # Returns
/// Hexadecimal string representation of the SHA-256 hash.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checksum of a season ledger together with the round parameters.
///
/// Matches are hashed in sequence order using only the fields the engine
/// reads, so storage ids, round assignments and input order do not change the
/// result. Two recomputes with the same checksum produce the same rounds.
pub fn calculate_ledger_checksum(ledger: &[Match], params: &RoundParameters) -> String {
    let mut ordered: Vec<&Match> = ledger.iter().collect();
    ordered.sort_by_key(|m| m.sequence_number);

    let mut content = format!(
        "tolerance={};spacing={};max_rounds={}\n",
        params.tolerance, params.spacing, params.max_rounds
    );
    for m in ordered {
        content.push_str(&format!(
            "{}|{}|{}|{}|{}\n",
            m.season,
            m.sequence_number,
            m.team_a,
            m.team_b,
            m.timestamp.timestamp()
        ));
    }
    calculate_checksum(&content)
}
