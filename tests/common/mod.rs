//! Shared fixtures for the integration tests
#![allow(dead_code)]

use product_passport::{PassportDraft, TimeStamp, TxContext};

/// Install a tracing subscriber that writes through the test harness.
///
/// Uses `try_init` so every test can call it; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Deterministic transaction context; `seq` distinguishes transactions.
pub fn tx(org: &str, seq: u32) -> TxContext {
    TxContext::new_with(
        &format!("tx_{org}_{seq}"),
        org,
        TimeStamp::new_with(2024, 5, 1 + (seq % 28), 8, 0, 0).unwrap(),
    )
}

pub fn draft(dpp_id: &str) -> PassportDraft {
    PassportDraft::new()
        .set_dpp_id(dpp_id)
        .set_product_id(&format!("urn:epc:id:sgtin:4012345.011111.{dpp_id}"))
        .set_product_type_id("PP-Granulate")
        .set_manufacturing_site("SITE-RAW-1")
        .set_batch(&format!("BATCH-{dpp_id}"))
        .set_production_date("2024-05-01")
}

/// Two mandatory standards and one optional one.
pub const SPECS_JSON: &str = r#"[
    {"name": "Tensile", "isNumeric": true, "lowerLimit": 10.0, "upperLimit": 15.0, "unit": "MPa", "mandatory": true},
    {"name": "Visual", "isNumeric": false, "expectedValue": "OK", "mandatory": true},
    {"name": "MFI", "isNumeric": true, "lowerLimit": 0.1, "upperLimit": 0.5, "unit": "g/10min", "mandatory": false}
]"#;

pub const TENSILE_ONLY_JSON: &str = r#"[
    {"name": "Tensile", "isNumeric": true, "lowerLimit": 10.0, "upperLimit": 15.0, "unit": "MPa", "mandatory": true}
]"#;

pub const VISUAL_ONLY_JSON: &str = r#"[
    {"name": "Visual", "isNumeric": false, "expectedValue": "OK", "mandatory": false}
]"#;
