pub(crate) fn parse_timecode(raw: &str) -> f64 {
    let trimmed = raw.trim();
    match trimmed.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes = parse_component(minutes);
            let seconds = parse_component(seconds);
            minutes * 60.0 + seconds
        }
        None => parse_component(trimmed),
    }
}

fn parse_component(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

pub(crate) fn format_timecode(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00".to_string();
    }
    let whole = seconds.floor() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes_and_seconds() {
        assert_eq!(parse_timecode("01:30"), 90.0);
        assert_eq!(parse_timecode(" 2:05 "), 125.0);
    }

    #[test]
    fn bare_number_is_seconds() {
        assert_eq!(parse_timecode("95"), 95.0);
        assert_eq!(parse_timecode("12.5"), 12.5);
    }

    #[test]
    fn unparsable_parts_count_as_zero() {
        assert_eq!(parse_timecode(""), 0.0);
        assert_eq!(parse_timecode("ab:10"), 10.0);
        assert_eq!(parse_timecode("3:"), 180.0);
    }

    #[test]
    fn formats_with_padding_and_floor() {
        assert_eq!(format_timecode(0.0), "00:00");
        assert_eq!(format_timecode(90.9), "01:30");
        assert_eq!(format_timecode(3725.0), "62:05");
        assert_eq!(format_timecode(f64::NAN), "00:00");
    }

    #[test]
    fn formatted_values_parse_back_to_whole_seconds() {
        for secs in [0.0, 59.0, 61.0, 754.0] {
            assert_eq!(parse_timecode(&format_timecode(secs)), secs);
        }
    }
}
