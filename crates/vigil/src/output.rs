//! Output helpers shared by the command modules.

use clap::ValueEnum;

/// Output format for commands that render structured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output without ANSI escapes.
    Plain,
    /// Machine-readable JSON on stdout.
    Json,
}

/// Render an epoch-ms timestamp as UTC RFC 3339 with millisecond precision.
///
/// Values outside chrono's representable range render as the raw number.
/// The zero stamp a clock outage produces renders as the epoch itself.
pub fn format_timestamp_ms(ts_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms as i64).map_or_else(
        || ts_ms.to_string(),
        |dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_known_timestamp() {
        assert_eq!(
            format_timestamp_ms(1_700_000_000_000),
            "2023-11-14T22:13:20.000Z"
        );
    }

    #[test]
    fn zero_stamp_renders_epoch() {
        assert_eq!(format_timestamp_ms(0), "1970-01-01T00:00:00.000Z");
    }
}
