//! Shared value types: timestamps and the per-transaction context
use chrono::{DateTime, TimeZone, Utc};

use super::utils::new_uuid_to_bech32;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    /// `None` when the fields do not name a valid UTC instant.
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
    }
    pub fn parse_rfc3339(raw: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(raw).map(|dt| TimeStamp(dt.with_timezone(&Utc)))
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        TimeStamp(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

// JSON carries timestamps as RFC 3339 strings
impl serde::Serialize for TimeStamp<Utc> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> serde::Deserialize<'de> for TimeStamp<Utc> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TimeStamp::parse_rfc3339(&raw).map_err(serde::de::Error::custom)
    }
}

/// Everything the hosting ledger tells the core about the invoking transaction.
///
/// The core never consults the wall clock or a random source itself; every
/// timestamp and identifier it derives flows from this context, so replaying
/// a transaction on another node yields a bit-identical record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    pub tx_id: String,
    pub caller_org: String,
    pub timestamp: TimeStamp<Utc>,
}

impl TxContext {
    /// Host-side convenience: fresh bech32 transaction id stamped with the current time.
    pub fn new(caller_org: &str) -> anyhow::Result<Self> {
        Ok(Self {
            tx_id: new_uuid_to_bech32("tx_")?,
            caller_org: caller_org.to_string(),
            timestamp: TimeStamp::new(),
        })
    }
    pub fn new_with(tx_id: &str, caller_org: &str, timestamp: TimeStamp<Utc>) -> Self {
        Self {
            tx_id: tx_id.to_string(),
            caller_org: caller_org.to_string(),
            timestamp,
        }
    }
}
