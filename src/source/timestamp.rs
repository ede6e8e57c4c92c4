use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("failed to parse timestamp '{value}' with format '{format}': {source}")]
    ParseError {
        value: String,
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("timestamp value {0} has an unsupported JSON type")]
    UnsupportedType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampFormat {
    Strptime(String),
    Iso8601,
    Epoch,
    EpochMs,
}

impl TimestampFormat {
    /// Parse a format name: one of 'iso8601', 'epoch', 'epoch_ms', or a strptime format string
    pub fn from_name(format: &str) -> Self {
        match format {
            "iso8601" => TimestampFormat::Iso8601,
            "epoch" => TimestampFormat::Epoch,
            "epoch_ms" => TimestampFormat::EpochMs,
            other => TimestampFormat::Strptime(other.to_string()),
        }
    }

    fn name(&self) -> &str {
        match self {
            TimestampFormat::Iso8601 => "iso8601",
            TimestampFormat::Epoch => "epoch",
            TimestampFormat::EpochMs => "epoch_ms",
            TimestampFormat::Strptime(fmt) => fmt,
        }
    }
}

/// Converts feed timestamps into epoch milliseconds
#[derive(Debug, Clone)]
pub struct TimestampParser {
    format: TimestampFormat,
}

impl TimestampParser {
    pub fn new(format: &str) -> Self {
        Self {
            format: TimestampFormat::from_name(format),
        }
    }

    pub fn iso8601() -> Self {
        Self {
            format: TimestampFormat::Iso8601,
        }
    }

    /// Convert a JSON timestamp value to epoch milliseconds.
    ///
    /// Strings are parsed with the configured format. Integers are accepted for the
    /// epoch formats only.
    pub fn parse_value(&self, value: &Value) -> Result<i64, TimestampError> {
        match value {
            Value::String(s) => self.parse_ms(s),
            Value::Number(n) => match (&self.format, n.as_i64()) {
                (TimestampFormat::Epoch, Some(secs)) => self.epoch_ms_checked(&n.to_string(), secs, 1000),
                (TimestampFormat::EpochMs, Some(ms)) => Ok(ms),
                _ => Err(TimestampError::UnsupportedType(value.to_string())),
            },
            other => Err(TimestampError::UnsupportedType(other.to_string())),
        }
    }

    /// Parse a textual timestamp into epoch milliseconds
    pub fn parse_ms(&self, value: &str) -> Result<i64, TimestampError> {
        match &self.format {
            TimestampFormat::Iso8601 => parse_iso8601(value).map(|dt| dt.timestamp_millis()),
            TimestampFormat::Epoch => {
                let seconds = self.parse_integer(value)?;
                self.epoch_ms_checked(value, seconds, 1000)
            }
            TimestampFormat::EpochMs => self.parse_integer(value),
            TimestampFormat::Strptime(fmt) => {
                parse_strptime(value, fmt).map(|dt| dt.timestamp_millis())
            }
        }
    }

    fn parse_integer(&self, value: &str) -> Result<i64, TimestampError> {
        value
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| TimestampError::ParseError {
                value: value.to_string(),
                format: self.format.name().to_string(),
                source: Box::new(e),
            })
    }

    fn epoch_ms_checked(&self, value: &str, amount: i64, factor: i64) -> Result<i64, TimestampError> {
        amount
            .checked_mul(factor)
            .ok_or_else(|| TimestampError::ParseError {
                value: value.to_string(),
                format: self.format.name().to_string(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "timestamp out of range",
                )),
            })
    }
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// Accepts RFC 3339 (`Z` or numeric offset). A timestamp without any offset is
/// interpreted as UTC.
pub fn parse_iso8601(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .map_err(|e| TimestampError::ParseError {
            value: value.to_string(),
            format: "iso8601".to_string(),
            source: Box::new(e),
        })
}

fn parse_strptime(value: &str, format: &str) -> Result<DateTime<Utc>, TimestampError> {
    if format.contains("%z") || format.contains("%Z") || format.contains("%:z") {
        DateTime::parse_from_str(value, format)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| TimestampError::ParseError {
                value: value.to_string(),
                format: format.to_string(),
                source: Box::new(e),
            })
    } else {
        NaiveDateTime::parse_from_str(value, format)
            .map(|ndt| Utc.from_utc_datetime(&ndt))
            .map_err(|e| TimestampError::ParseError {
                value: value.to_string(),
                format: format.to_string(),
                source: Box::new(e),
            })
    }
}

/// Render epoch milliseconds as RFC 3339, for display
pub fn format_epoch_ms(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339())
}
