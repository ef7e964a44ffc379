//! Schema validation for JSON payloads arriving at the operation boundary
//!
//! Every payload is decoded into an explicit wire type before any field is
//! used. Unknown fields are rejected, an optional `schemaVersion` must match
//! [`PAYLOAD_SCHEMA_VERSION`], and an empty payload reads as `{}` (or `[]`
//! for lists).
use chrono::Utc;
use serde::Deserialize;

use super::error::DppError;
use super::evaluation::{Criterion, Outcome, TestStandard};
use super::quality::AlarmSummary;
use super::types::TimeStamp;

pub const PAYLOAD_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TestStandardPayload {
    #[serde(default)]
    schema_version: Option<u32>,
    name: String,
    is_numeric: bool,
    #[serde(default)]
    lower_limit: Option<f64>,
    #[serde(default)]
    upper_limit: Option<f64>,
    #[serde(default)]
    expected_value: Option<String>,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    mandatory: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TestResultPayload {
    #[serde(default)]
    schema_version: Option<u32>,
    #[serde(default)]
    standard_name: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    recording_org: Option<String>,
    #[serde(default)]
    timestamp: Option<TimeStamp<Utc>>,
    #[serde(default)]
    evaluation_outcome: Option<Outcome>,
}

/// A test result as submitted, before evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestResultDraft {
    pub standard_name: String,
    pub result: String,
    pub unit: Option<String>,
    pub recording_org: Option<String>,
    pub timestamp: Option<TimeStamp<Utc>>,
    /// Caller-asserted outcome; only PASSED or FAILED are accepted.
    pub evaluation_outcome: Option<Outcome>,
}

impl TestResultDraft {
    pub fn new(standard_name: &str, result: &str) -> Self {
        Self {
            standard_name: standard_name.to_string(),
            result: result.to_string(),
            ..Self::default()
        }
    }
    pub fn set_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }
    pub fn set_recording_org(mut self, org: &str) -> Self {
        self.recording_org = Some(org.to_string());
        self
    }
    pub fn set_timestamp(mut self, timestamp: TimeStamp<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
    pub fn set_outcome(mut self, outcome: Outcome) -> Self {
        self.evaluation_outcome = Some(outcome);
        self
    }

    pub fn validate(&self) -> Result<(), DppError> {
        if self.standard_name.trim().is_empty() {
            return Err(DppError::payload("standardName", "must not be empty"));
        }
        if self.evaluation_outcome == Some(Outcome::InfoNoStandard) {
            return Err(DppError::payload(
                "evaluationOutcome",
                "only PASSED or FAILED may be asserted by a caller",
            ));
        }
        // records store nanoseconds since the epoch as an i64
        if let Some(timestamp) = &self.timestamp {
            if timestamp.to_datetime_utc().timestamp_nanos_opt().is_none() {
                return Err(DppError::payload(
                    "timestamp",
                    format!(
                        "{} is outside the storable range 1677-09-21 to 2262-04-11",
                        timestamp.to_rfc3339()
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// A transport log reduced to its canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportLogPayload {
    pub canonical_json: String,
    pub payload_hash: String,
    pub alarm_summary: AlarmSummary,
}

fn or_empty<'a>(raw: &'a str, empty: &'a str) -> &'a str {
    if raw.trim().is_empty() { empty } else { raw }
}

fn check_version(field: &str, version: Option<u32>) -> Result<(), DppError> {
    match version {
        None => Ok(()),
        Some(PAYLOAD_SCHEMA_VERSION) => Ok(()),
        Some(other) => Err(DppError::payload(
            field,
            format!("unsupported schemaVersion {other}, expected {PAYLOAD_SCHEMA_VERSION}"),
        )),
    }
}

fn finite(field: &str, value: Option<f64>) -> Result<f64, DppError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(DppError::payload(field, "must be a finite number")),
        None => Err(DppError::payload(field, "required when isNumeric is true")),
    }
}

/// Parses a JSON array of specifications.
pub fn parse_specifications(raw: &str) -> Result<Vec<TestStandard>, DppError> {
    let payloads: Vec<TestStandardPayload> = serde_json::from_str(or_empty(raw, "[]"))
        .map_err(|e| DppError::payload("specifications", e.to_string()))?;

    payloads
        .into_iter()
        .enumerate()
        .map(|(index, spec)| {
            let field = |name: &str| format!("specifications[{index}].{name}");

            check_version(&field("schemaVersion"), spec.schema_version)?;
            if spec.name.trim().is_empty() {
                return Err(DppError::payload(&field("name"), "must not be empty"));
            }

            let criterion = if spec.is_numeric {
                let lower = finite(&field("lowerLimit"), spec.lower_limit)?;
                let upper = finite(&field("upperLimit"), spec.upper_limit)?;
                if lower > upper {
                    return Err(DppError::payload(
                        &field("lowerLimit"),
                        format!("{lower} exceeds upperLimit {upper}"),
                    ));
                }
                Criterion::Range { lower, upper }
            } else {
                let value = spec.expected_value.ok_or_else(|| {
                    DppError::payload(&field("expectedValue"), "required when isNumeric is false")
                })?;
                Criterion::Expected { value }
            };

            Ok(TestStandard {
                name: spec.name,
                criterion,
                unit: spec.unit,
                mandatory: spec.mandatory,
            })
        })
        .collect()
}

/// Parses a single test-result submission.
pub fn parse_test_result(raw: &str) -> Result<TestResultDraft, DppError> {
    let payload: TestResultPayload = serde_json::from_str(or_empty(raw, "{}"))
        .map_err(|e| DppError::payload("testResult", e.to_string()))?;
    check_version("schemaVersion", payload.schema_version)?;

    // numeric results are accepted and kept in their JSON text form
    let result = match payload.result {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(DppError::payload(
                "result",
                format!("expected a string or number, got {other}"),
            ));
        }
        None => return Err(DppError::payload("result", "missing")),
    };

    let draft = TestResultDraft {
        standard_name: payload.standard_name.unwrap_or_default(),
        result,
        unit: payload.unit,
        recording_org: payload.recording_org,
        timestamp: payload.timestamp,
        evaluation_outcome: payload.evaluation_outcome,
    };
    draft.validate()?;

    Ok(draft)
}

/// Parses an opaque transport log object, lifting out its alarm summary.
pub fn parse_transport_log(raw: &str) -> Result<TransportLogPayload, DppError> {
    let value: serde_json::Value = serde_json::from_str(or_empty(raw, "{}"))
        .map_err(|e| DppError::payload("transportLog", e.to_string()))?;

    let serde_json::Value::Object(object) = &value else {
        return Err(DppError::payload("transportLog", "must be a JSON object"));
    };

    let alarm_summary = match object.get("alarmSummary") {
        None | Some(serde_json::Value::Null) => AlarmSummary::No,
        Some(serde_json::Value::String(s)) => s.parse()?,
        Some(other) => {
            return Err(DppError::payload(
                "alarmSummary",
                format!("expected \"YES\" or \"NO\", got {other}"),
            ));
        }
    };

    // serde_json maps are ordered by key, so this text is canonical
    let canonical_json = value.to_string();
    let payload_hash = sha256::digest(canonical_json.as_bytes());

    Ok(TransportLogPayload {
        canonical_json,
        payload_hash,
        alarm_summary,
    })
}

/// Parses a JSON array of passport ids, e.g. transformation inputs.
pub fn parse_id_list(field: &str, raw: &str) -> Result<Vec<String>, DppError> {
    serde_json::from_str(or_empty(raw, "[]")).map_err(|e| DppError::payload(field, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: DppError) -> String {
        match err {
            DppError::InvalidPayload { field, .. } => field,
            other => panic!("expected InvalidPayload, got {other:?}"),
        }
    }

    #[test]
    fn specifications_parse_both_kinds() {
        let raw = r#"[
            {"name": "Tensile", "isNumeric": true, "lowerLimit": 10, "upperLimit": 15, "unit": "MPa", "mandatory": true},
            {"name": "Visual", "isNumeric": false, "expectedValue": "OK"}
        ]"#;
        let specs = parse_specifications(raw).unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(
            specs[0].criterion,
            Criterion::Range {
                lower: 10.0,
                upper: 15.0
            }
        );
        assert!(specs[0].mandatory);
        assert!(!specs[1].mandatory);
        assert!(!specs[1].is_numeric());
    }

    #[test]
    fn empty_specification_payload_is_empty_list() {
        assert!(parse_specifications("").unwrap().is_empty());
        assert!(parse_specifications("   ").unwrap().is_empty());
    }

    #[test]
    fn numeric_spec_requires_limits() {
        let raw = r#"[{"name": "Tensile", "isNumeric": true, "lowerLimit": 10}]"#;
        assert_eq!(
            field_of(parse_specifications(raw).unwrap_err()),
            "specifications[0].upperLimit"
        );
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let raw = r#"[{"name": "T", "isNumeric": true, "lowerLimit": 5, "upperLimit": 1}]"#;
        assert_eq!(
            field_of(parse_specifications(raw).unwrap_err()),
            "specifications[0].lowerLimit"
        );
    }

    #[test]
    fn string_spec_requires_expected_value() {
        let raw = r#"[{"name": "Visual", "isNumeric": false}]"#;
        assert_eq!(
            field_of(parse_specifications(raw).unwrap_err()),
            "specifications[0].expectedValue"
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"[{"name": "Visual", "isNumeric": false, "expectedValue": "OK", "colour": "red"}]"#;
        let err = parse_specifications(raw).unwrap_err();
        match err {
            DppError::InvalidPayload { field, reason } => {
                assert_eq!(field, "specifications");
                assert!(reason.contains("colour"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_result_accepts_numeric_json_result() {
        let draft = parse_test_result(r#"{"standardName": "Tensile", "result": 12.3}"#).unwrap();
        assert_eq!(draft.result, "12.3");
        assert_eq!(draft.evaluation_outcome, None);
    }

    #[test]
    fn test_result_with_asserted_outcome() {
        let draft = parse_test_result(
            r#"{"standardName": "IncomingInspection", "result": "OK", "evaluationOutcome": "PASSED"}"#,
        )
        .unwrap();
        assert_eq!(draft.evaluation_outcome, Some(Outcome::Passed));
    }

    #[test]
    fn caller_cannot_assert_info_no_standard() {
        let raw = r#"{"standardName": "X", "result": "1", "evaluationOutcome": "INFO_NO_STANDARD"}"#;
        assert_eq!(field_of(parse_test_result(raw).unwrap_err()), "evaluationOutcome");
    }

    #[test]
    fn boolean_result_is_rejected() {
        let raw = r#"{"standardName": "Visual", "result": true}"#;
        assert_eq!(field_of(parse_test_result(raw).unwrap_err()), "result");
    }

    #[test]
    fn timestamp_must_fit_the_record_encoding() {
        let raw = |ts: &str| format!(r#"{{"standardName": "Tensile", "result": "12", "timestamp": "{ts}"}}"#);

        let latest = parse_test_result(&raw("2262-04-11T23:47:16.854775807Z")).unwrap();
        assert!(latest.timestamp.is_some());
        assert!(parse_test_result(&raw("1677-09-21T00:12:44Z")).is_ok());

        assert_eq!(
            field_of(parse_test_result(&raw("2262-04-11T23:47:16.854775808Z")).unwrap_err()),
            "timestamp"
        );
        assert_eq!(
            field_of(parse_test_result(&raw("1677-09-21T00:12:43Z")).unwrap_err()),
            "timestamp"
        );
        assert_eq!(
            field_of(parse_test_result(&raw("2300-01-01T00:00:00Z")).unwrap_err()),
            "timestamp"
        );
    }

    #[test]
    fn empty_test_result_reports_missing_field() {
        assert_eq!(field_of(parse_test_result("").unwrap_err()), "result");
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let raw = r#"{"schemaVersion": 2, "standardName": "X", "result": "1"}"#;
        assert_eq!(field_of(parse_test_result(raw).unwrap_err()), "schemaVersion");
    }

    #[test]
    fn transport_log_is_canonicalised() {
        let a = parse_transport_log(r#"{"b": 1, "a": 2, "alarmSummary": "YES"}"#).unwrap();
        let b = parse_transport_log(r#"{"alarmSummary": "YES", "a": 2, "b": 1}"#).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.alarm_summary, AlarmSummary::Yes);
        assert_eq!(a.payload_hash.len(), 64);
    }

    #[test]
    fn empty_transport_log_defaults_to_no_alarm() {
        let log = parse_transport_log("").unwrap();
        assert_eq!(log.alarm_summary, AlarmSummary::No);
        assert_eq!(log.canonical_json, "{}");
    }

    #[test]
    fn transport_log_must_be_object() {
        assert_eq!(
            field_of(parse_transport_log("[1, 2]").unwrap_err()),
            "transportLog"
        );
        assert_eq!(
            field_of(parse_transport_log(r#"{"alarmSummary": true}"#).unwrap_err()),
            "alarmSummary"
        );
    }
}
