//! Candle granularities accepted by the history endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported resolution '{0}'")]
pub struct ParseResolutionError(pub String);

/// Time-series granularity of a history request.
///
/// Serialized as the API code (`"1"`, `"15"`, `"D"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resolution {
    Sec5,
    Sec10,
    Sec15,
    Sec30,
    Sec45,
    #[default]
    Min1,
    Min2,
    Min3,
    Min5,
    Min10,
    Min15,
    Min20,
    Min30,
    Min60,
    Min120,
    Min240,
    Day,
    Week,
    Month,
}

impl Resolution {
    pub const ALL: [Resolution; 19] = [
        Self::Sec5,
        Self::Sec10,
        Self::Sec15,
        Self::Sec30,
        Self::Sec45,
        Self::Min1,
        Self::Min2,
        Self::Min3,
        Self::Min5,
        Self::Min10,
        Self::Min15,
        Self::Min20,
        Self::Min30,
        Self::Min60,
        Self::Min120,
        Self::Min240,
        Self::Day,
        Self::Week,
        Self::Month,
    ];

    /// Code sent in the `resolution` query parameter.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Sec5 => "5S",
            Self::Sec10 => "10S",
            Self::Sec15 => "15S",
            Self::Sec30 => "30S",
            Self::Sec45 => "45S",
            Self::Min1 => "1",
            Self::Min2 => "2",
            Self::Min3 => "3",
            Self::Min5 => "5",
            Self::Min10 => "10",
            Self::Min15 => "15",
            Self::Min20 => "20",
            Self::Min30 => "30",
            Self::Min60 => "60",
            Self::Min120 => "120",
            Self::Min240 => "240",
            Self::Day => "D",
            Self::Week => "W",
            Self::Month => "M",
        }
    }

    /// Label used in artifact file names (`1min`, `1day`, ...).
    pub fn label(self) -> String {
        match self {
            Self::Day => "1day".into(),
            Self::Week => "1week".into(),
            Self::Month => "1month".into(),
            seconds if seconds.is_sub_minute() => {
                format!("{}sec", seconds.code().trim_end_matches('S'))
            }
            minutes => format!("{}min", minutes.code()),
        }
    }

    pub const fn is_sub_minute(self) -> bool {
        matches!(
            self,
            Self::Sec5 | Self::Sec10 | Self::Sec15 | Self::Sec30 | Self::Sec45
        )
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    /// Accepts API codes (`1`, `5S`, `D`, `1D`, `1M`) and file labels (`1min`, `1day`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        let upper = needle.to_ascii_uppercase();
        let upper = match upper.as_str() {
            "1D" => "D",
            "1W" => "W",
            "1M" => "M",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|r| r.code() == upper || r.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ParseResolutionError(s.to_string()))
    }
}

impl TryFrom<String> for Resolution {
    type Error = ParseResolutionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.code().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(Resolution::Min1.label(), "1min");
        assert_eq!(Resolution::Min240.label(), "240min");
        assert_eq!(Resolution::Sec5.label(), "5sec");
        assert_eq!(Resolution::Day.label(), "1day");
        assert_eq!(Resolution::Month.label(), "1month");
    }

    #[test]
    fn parses_codes_and_labels() {
        assert_eq!("1".parse::<Resolution>().unwrap(), Resolution::Min1);
        assert_eq!("d".parse::<Resolution>().unwrap(), Resolution::Day);
        assert_eq!("1D".parse::<Resolution>().unwrap(), Resolution::Day);
        assert_eq!("1W".parse::<Resolution>().unwrap(), Resolution::Week);
        assert_eq!("1M".parse::<Resolution>().unwrap(), Resolution::Month);
        assert_eq!("1month".parse::<Resolution>().unwrap(), Resolution::Month);
        assert_eq!("15min".parse::<Resolution>().unwrap(), Resolution::Min15);
        assert_eq!("30s".parse::<Resolution>().unwrap(), Resolution::Sec30);
        assert!("7".parse::<Resolution>().is_err());
    }

    #[test]
    fn serde_uses_api_code() {
        let json = serde_json::to_string(&Resolution::Min60).unwrap();
        assert_eq!(json, "\"60\"");
        let back: Resolution = serde_json::from_str("\"W\"").unwrap();
        assert_eq!(back, Resolution::Week);
    }
}
