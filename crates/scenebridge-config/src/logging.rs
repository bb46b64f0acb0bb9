//! Output format for the daemon's `tracing` subscriber.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How log events are rendered on stderr.
///
/// Parsing is case-insensitive, so `LOG_FORMAT=JSON` and `log_format = "json"`
/// select the same variant.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Single-line text for terminals.
    Compact,
}

impl LogFormat {
    /// Returns true when events are emitted as machine-readable records.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Returned when text names no known [`LogFormat`].
pub type LogFormatParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("JSON", LogFormat::Json)]
    #[case("Compact", LogFormat::Compact)]
    fn formats_parse_without_regard_to_case(#[case] text: &str, #[case] expected: LogFormat) {
        assert_eq!(LogFormat::from_str(text).expect("known format"), expected);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(LogFormat::from_str("pretty").is_err());
    }

    #[rstest]
    #[case(LogFormat::Json, true)]
    #[case(LogFormat::Compact, false)]
    fn only_json_is_structured(#[case] format: LogFormat, #[case] structured: bool) {
        assert_eq!(format.is_structured(), structured);
        assert_eq!(format.to_string(), if structured { "json" } else { "compact" });
    }
}
