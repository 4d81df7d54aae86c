//! core/tags/util.rs
//! Small parsing helpers shared by tag scanning and tag writing.

/// Parse a number the way C `atof` does.
/// - "-6.50 dB" -> -6.5 (longest numeric prefix wins)
/// - "  89" -> 89.0 (leading whitespace skipped)
/// - "loud" -> 0.0 (nothing parsable)
pub(crate) fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return 0.0;
    }

    // Exponent only counts if it has at least one digit.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().unwrap_or(0.0)
}

/// Format TRCK/TPOS-style values:
/// - (Some("3"), None) -> "3"
/// - (Some("3"), Some("12")) -> "3/12"
/// - (None, Some("12")) -> None (a total alone is meaningless)
pub(crate) fn format_slash_pair(n: Option<&str>, total: Option<&str>) -> Option<String> {
    let n = n.map(str::trim).filter(|s| !s.is_empty())?;
    match total.map(str::trim).filter(|s| !s.is_empty()) {
        Some(t) => Some(format!("{n}/{t}")),
        None => Some(n.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_prefix_matches_atof() {
        assert_eq!(parse_float_prefix("-6.50 dB"), -6.5);
        assert_eq!(parse_float_prefix("+2.1 dB"), 2.1);
        assert_eq!(parse_float_prefix("  89.0 dB"), 89.0);
        assert_eq!(parse_float_prefix(".5"), 0.5);
        assert_eq!(parse_float_prefix("7."), 7.0);
        assert_eq!(parse_float_prefix("1e3x"), 1000.0);
        assert_eq!(parse_float_prefix("1e"), 1.0);
    }

    #[test]
    fn float_prefix_unparsable_is_zero() {
        assert_eq!(parse_float_prefix(""), 0.0);
        assert_eq!(parse_float_prefix("loud"), 0.0);
        assert_eq!(parse_float_prefix("-"), 0.0);
        assert_eq!(parse_float_prefix("."), 0.0);
    }

    #[test]
    fn slash_pair() {
        assert_eq!(format_slash_pair(Some("3"), None).as_deref(), Some("3"));
        assert_eq!(
            format_slash_pair(Some("3"), Some("12")).as_deref(),
            Some("3/12")
        );
        assert_eq!(format_slash_pair(Some(" "), Some("12")), None);
        assert_eq!(format_slash_pair(None, Some("12")), None);
    }
}
