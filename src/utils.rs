//! Utility functions for identifiers and ledger keys

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Namespaced ledger key for a passport record.
pub fn passport_key(prefix: &str, dpp_id: &str) -> String {
    format!("{prefix}/{dpp_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passport_keys_are_namespaced() {
        assert_eq!(passport_key("dpp", "BATCH-7"), "dpp/BATCH-7");
    }

    #[test]
    fn empty_hrp_is_rejected() {
        assert!(new_uuid_to_bech32("").is_err());
    }
}
