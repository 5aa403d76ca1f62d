use crate::error::PxcError;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Parse a human-readable size string into bytes.
///
/// Accepts formats like `"20G"`, `"512M"`, `"100K"`, `"1073741824"`.
/// Uses binary units (1G = 1024³ = 1,073,741,824 bytes).
pub fn parse_size(s: &str) -> Result<u64, PxcError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(PxcError::Validation {
            message: "size cannot be empty".into(),
        });
    }

    let (num_str, suffix) = match s.find(|c: char| c.is_ascii_alphabetic()) {
        Some(i) => (s[..i].trim(), s[i..].to_ascii_uppercase()),
        None => (s, String::new()),
    };

    let num: u64 = num_str.parse().map_err(|_| PxcError::Validation {
        message: format!("invalid size number: '{num_str}'"),
    })?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "K" | "KB" => KIB,
        "M" | "MB" => MIB,
        "G" | "GB" => GIB,
        "T" | "TB" => 1024 * GIB,
        _ => {
            return Err(PxcError::Validation {
                message: format!("unknown size suffix: '{suffix}' (use G, M, K, or T)"),
            });
        }
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| PxcError::Validation {
            message: format!("size overflows: '{s}'"),
        })
}

/// Parse a memory amount: a bare number is megabytes, a suffixed value
/// (`"4G"`) is converted to whole megabytes.
pub fn parse_memory_mb(s: &str) -> Result<u64, PxcError> {
    let s = s.trim();
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().map_err(|_| PxcError::Validation {
            message: format!("invalid memory size: '{s}'"),
        });
    }
    Ok(parse_size(s)? / MIB)
}

/// Parse a disk size: a bare number is gigabytes, a suffixed value
/// (`"512G"`, `"1T"`) is converted to whole gigabytes.
pub fn parse_disk_gb(s: &str) -> Result<u64, PxcError> {
    let s = s.trim();
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().map_err(|_| PxcError::Validation {
            message: format!("invalid disk size: '{s}'"),
        });
    }
    Ok(parse_size(s)? / GIB)
}

/// `1536` → `"1.5 KB"`. Zero renders as `"-"` so idle columns stay quiet.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "-".into();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// `90061` → `"1d 1h"`, `3660` → `"1h 1m"`, `0` → `"-"`.
pub fn format_uptime(seconds: u64) -> String {
    if seconds == 0 {
        return "-".into();
    }
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    if days > 0 {
        return format!("{days}d {hours}h");
    }
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        return format!("{hours}h {minutes}m");
    }
    format!("{minutes}m")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_gibibytes() {
        assert_eq!(parse_size("20G").unwrap(), 20 * GIB);
        assert_eq!(parse_size("1GB").unwrap(), GIB);
    }

    #[test]
    fn parse_size_mebibytes() {
        assert_eq!(parse_size("512M").unwrap(), 512 * MIB);
    }

    #[test]
    fn parse_size_bytes() {
        assert_eq!(parse_size("1073741824").unwrap(), 1073741824);
    }

    #[test]
    fn parse_size_rejects_empty() {
        assert!(parse_size("").is_err());
    }

    #[test]
    fn parse_size_rejects_bad_suffix() {
        assert!(parse_size("10X").is_err());
    }

    #[test]
    fn memory_bare_number_is_megabytes() {
        assert_eq!(parse_memory_mb("2048").unwrap(), 2048);
        assert_eq!(parse_memory_mb("4G").unwrap(), 4096);
        assert_eq!(parse_memory_mb("512m").unwrap(), 512);
        assert!(parse_memory_mb("lots").is_err());
    }

    #[test]
    fn disk_bare_number_is_gigabytes() {
        assert_eq!(parse_disk_gb("32").unwrap(), 32);
        assert_eq!(parse_disk_gb("1T").unwrap(), 1024);
        assert_eq!(parse_disk_gb("512M").unwrap(), 0);
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(0), "-");
        assert_eq!(format_bytes(512), "512.0 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(4 * GIB), "4.0 GB");
    }

    #[test]
    fn uptime_picks_two_largest_units() {
        assert_eq!(format_uptime(0), "-");
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3660), "1h 1m");
        assert_eq!(format_uptime(90061), "1d 1h");
    }
}
