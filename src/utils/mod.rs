//! Utility functions and helpers for knapsack
//!
//! - Time and duration utilities (scroll keep-alive values)
//! - Byte size parsing and formatting (transfer budgets)
//! - File system helpers
//! - Entry name encoding

use std::path::PathBuf;
use std::time::Duration;

/// String utilities
pub mod string {
    /// Percent-encode a single archive entry name component
    ///
    /// Unreserved characters (`A-Z a-z 0-9 - _ . ~`) pass through, every other
    /// byte of the UTF-8 encoding becomes `%XX`.
    ///
    /// # Arguments
    /// * `s` - Component to encode
    ///
    /// # Returns
    /// * `String` - Encoded component
    pub fn percent_encode(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for byte in s.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(byte as char)
                }
                _ => out.push_str(&format!("%{:02X}", byte)),
            }
        }
        out
    }
}

/// Time and duration utilities
pub mod time {
    use super::*;

    /// Format an elapsed time for job summaries
    ///
    /// Sub-second values print as milliseconds, sub-minute values as
    /// fractional seconds, anything longer as `h:mm:ss`.
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        match secs {
            0 => format!("{}ms", duration.subsec_millis()),
            1..60 => format!("{:.1}s", duration.as_secs_f64()),
            _ => format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60),
        }
    }

    /// Parse a keep-alive style duration (`"250ms"`, `"30s"`, `"5m"`, `"1h"`, `"2d"`)
    ///
    /// A unit is required. Values that overflow are rejected.
    pub fn parse_duration(s: &str) -> Option<Duration> {
        let s = s.trim();
        let (num, unit) = s.split_at(s.find(|c: char| !c.is_ascii_digit())?);
        let num: u64 = num.parse().ok()?;

        let secs = match unit {
            "ms" => return Some(Duration::from_millis(num)),
            "s" => num,
            "m" => num.checked_mul(60)?,
            "h" => num.checked_mul(3600)?,
            "d" => num.checked_mul(86_400)?,
            _ => return None,
        };
        Some(Duration::from_secs(secs))
    }

    /// Render a duration as a cluster time value (`"90s"`, `"250ms"`)
    pub fn to_time_value(duration: Duration) -> String {
        if duration.subsec_millis() != 0 || duration.as_secs() == 0 {
            format!("{}ms", duration.as_millis())
        } else {
            format!("{}s", duration.as_secs())
        }
    }
}

/// File system utilities
pub mod fs {
    use super::*;

    /// Expand home directory in path
    ///
    /// # Arguments
    /// * `path` - Path potentially starting with ~
    ///
    /// # Returns
    /// * `PathBuf` - Expanded path
    pub fn expand_home(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }
}

/// Conversion utilities
pub mod convert {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    /// Format a byte count with binary units (`"1.5 MB"`)
    pub fn format_bytes(bytes: u64) -> String {
        match (1..UNITS.len()).rev().find(|&i| bytes >> (10 * i) > 0) {
            Some(i) => format!("{:.1} {}", bytes as f64 / (1u64 << (10 * i)) as f64, UNITS[i]),
            None => format!("{} B", bytes),
        }
    }

    /// Parse a transfer budget (`"1024"`, `"512KB"`, `"2mb"`)
    ///
    /// Whole numbers only; values that overflow are rejected.
    pub fn parse_bytes(s: &str) -> Option<u64> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (num, unit) = s.split_at(split);
        let num: u64 = num.parse().ok()?;

        let unit = unit.trim().to_ascii_uppercase();
        let shift = match unit.as_str() {
            "" | "B" => 0,
            other => 10 * (UNITS.iter().position(|u| *u == other)? as u32),
        };
        num.checked_mul(1u64 << shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_encode() {
        assert_eq!(string::percent_encode("logs-2024.01"), "logs-2024.01");
        assert_eq!(string::percent_encode("a/b c"), "a%2Fb%20c");
        assert_eq!(string::percent_encode("é"), "%C3%A9");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(time::format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(time::format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(time::format_duration(Duration::from_secs(90)), "0:01:30");
        assert_eq!(time::format_duration(Duration::from_secs(3661)), "1:01:01");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(time::parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(time::parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(time::parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(time::parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(time::parse_duration("invalid"), None);
        assert_eq!(time::parse_duration("5é"), None);
        assert_eq!(time::parse_duration("2d"), Some(Duration::from_secs(172_800)));
        assert_eq!(time::parse_duration("30"), None);
        assert_eq!(time::parse_duration(""), None);
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert_eq!(time::parse_duration("999999999999999999d"), None);
        assert_eq!(time::parse_duration("999999999999999999999s"), None);
        assert_eq!(time::parse_duration(&format!("{}m", u64::MAX / 60 + 1)), None);
    }

    #[test]
    fn test_to_time_value() {
        assert_eq!(time::to_time_value(Duration::from_secs(60)), "60s");
        assert_eq!(time::to_time_value(Duration::from_millis(1500)), "1500ms");
        assert_eq!(time::to_time_value(Duration::ZERO), "0ms");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(convert::format_bytes(500), "500 B");
        assert_eq!(convert::format_bytes(1024), "1.0 KB");
        assert_eq!(convert::format_bytes(1536 * 1024), "1.5 MB");
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(convert::parse_bytes("1024"), Some(1024));
        assert_eq!(convert::parse_bytes("1KB"), Some(1024));
        assert_eq!(convert::parse_bytes("1MB"), Some(1024 * 1024));
        assert_eq!(convert::parse_bytes("2mb"), Some(2 * 1024 * 1024));
        assert_eq!(convert::parse_bytes("nope"), None);
        assert_eq!(convert::parse_bytes("1.5MB"), None);
        assert_eq!(convert::parse_bytes("99999999TB"), None);
    }
}
