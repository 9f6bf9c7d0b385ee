//! Utility functions for timestamps and report file naming.

pub mod timestamps;

pub use timestamps::{elapsed_ms, format_iso8601, iso_timestamp, Timestamp};

/// Replaces characters that are unsafe in file names with `_`.
#[must_use]
pub fn sanitize_file_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_component() {
        assert_eq!(sanitize_file_component("image scan/trivy"), "image_scan_trivy");
        assert_eq!(sanitize_file_component("zap-report.html"), "zap-report.html");
        assert_eq!(sanitize_file_component(""), "_");
    }
}
