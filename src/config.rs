//! Service configuration

use super::error::DppError;

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ServiceConfig {
    /// Ledger key namespace; records live at `{key_prefix}/{dppId}`.
    pub key_prefix: String,
    /// Test name used for results recorded by an incoming inspection.
    pub incoming_inspection_name: String,
    pub quality_alarm_event: String,
    pub transport_alarm_event: String,
    pub max_transform_inputs: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            key_prefix: "dpp".to_string(),
            incoming_inspection_name: "IncomingInspection".to_string(),
            quality_alarm_event: "QualityAlarm".to_string(),
            transport_alarm_event: "TransportAlarm".to_string(),
            max_transform_inputs: 64,
        }
    }
}

impl ServiceConfig {
    /// Reads a JSON config; an empty string yields the defaults.
    pub fn from_json(raw: &str) -> Result<Self, DppError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_json::from_str(raw).map_err(|e| DppError::payload("config", e.to_string()))?;

        if config.key_prefix.is_empty() {
            return Err(DppError::payload("keyPrefix", "must not be empty"));
        }
        if config.max_transform_inputs == 0 {
            return Err(DppError::payload("maxTransformInputs", "must be at least 1"));
        }
        Ok(config)
    }
}
