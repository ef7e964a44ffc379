//! Walks one batch of granulate from a raw-material producer through a
//! compounder, printing the passport after every step.
//!
//! Run with `cargo run --example supply_chain`.
use anyhow::Context;
use product_passport::{
    PassportDraft, PassportService, SledLedger, TxContext, transfer::InspectionOutcome,
};

const SPECIFICATIONS: &str = r#"[
    {"name": "Density", "isNumeric": true, "lowerLimit": 0.94, "upperLimit": 0.96, "unit": "g/cm3", "mandatory": true},
    {"name": "Colour", "isNumeric": false, "expectedValue": "natural", "mandatory": true},
    {"name": "MFI", "isNumeric": true, "lowerLimit": 0.1, "upperLimit": 0.5, "unit": "g/10min", "mandatory": false}
]"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let temp_dir = tempfile::tempdir()?;
    let ledger = SledLedger::open(temp_dir.path().join("supply_chain.db"))?;
    let service = PassportService::new(ledger);

    let producer = "PolymerWorks";
    let compounder = "CompoundCo";

    let draft = PassportDraft::new()
        .set_dpp_id("DPP-PE-2024-001")
        .set_product_id("urn:epc:id:sgtin:4012345.011111.1001")
        .set_product_type_id("PE-HD Granulate")
        .set_manufacturing_site("SITE-ANTWERP")
        .set_batch("B-2024-05-001")
        .set_production_date("2024-05-01");
    service
        .create_dpp_json(&TxContext::new(producer)?, draft, SPECIFICATIONS)
        .context("create")?;

    service.record_test_result_json(
        &TxContext::new(producer)?,
        "DPP-PE-2024-001",
        r#"{"standardName": "Density", "result": 0.952}"#,
        "LAB-ANTWERP",
    )?;
    service.record_test_result_json(
        &TxContext::new(producer)?,
        "DPP-PE-2024-001",
        r#"{"standardName": "Colour", "result": "Natural"}"#,
        "LAB-ANTWERP",
    )?;
    service.anchor_transport_log(
        &TxContext::new(producer)?,
        "DPP-PE-2024-001",
        r#"{"route": "Antwerp-Lyon", "minTempC": 6.1, "maxTempC": 31.8, "alarmSummary": "NO"}"#,
        "TRUCK-17",
    )?;

    service
        .transfer(&TxContext::new(producer)?, "DPP-PE-2024-001", compounder, "DOCK-3")
        .context("transfer")?;
    service
        .acknowledge_receipt(
            &TxContext::new(compounder)?,
            "DPP-PE-2024-001",
            "GATE-LYON",
            Some(InspectionOutcome::Ok),
        )
        .context("acknowledge")?;

    let compound = PassportDraft::new()
        .set_dpp_id("DPP-CMP-2024-001")
        .set_product_id("urn:epc:id:sgtin:4012345.022222.2001")
        .set_product_type_id("PE-HD Compound")
        .set_manufacturing_site("SITE-LYON")
        .set_batch("C-2024-05-001")
        .set_production_date("2024-05-06");
    service
        .transform_json(
            &TxContext::new(compounder)?,
            compound,
            "",
            r#"["DPP-PE-2024-001"]"#,
            "EXTRUDER-2",
            Some(r#"{"standardName": "Melt Index", "result": "0.31"}"#),
        )
        .context("transform")?;

    println!("{}", service.query_dpp_json("DPP-CMP-2024-001")?);
    println!(
        "{}",
        serde_json::to_string_pretty(&service.trace_provenance("DPP-CMP-2024-001")?)?
    );

    Ok(())
}
