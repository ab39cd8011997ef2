//! Conversions between `HH:MM:SS,mmm` time strings and numeric times.

/// Parse `HH:MM:SS,mmm`, `HH:MM:SS` or `MM:SS` into milliseconds.
///
/// Anything that does not match one of those shapes yields 0.
pub fn str_to_milliseconds(text: &str) -> i64 {
    let text = text.trim();
    let (clock, millis) = match text.split_once(',') {
        Some((clock, millis)) => match millis.trim().parse::<u32>() {
            Ok(ms) => (clock, i64::from(ms)),
            Err(_) => (clock, 0),
        },
        None => (text, 0),
    };

    let parts: Option<Vec<i64>> = clock
        .split(':')
        .map(|part| part.trim().parse::<u32>().ok().map(i64::from))
        .collect();

    match parts.as_deref() {
        Some([hours, minutes, seconds]) => (hours * 3600 + minutes * 60 + seconds) * 1000 + millis,
        Some([minutes, seconds]) => (minutes * 60 + seconds) * 1000,
        _ => 0,
    }
}

/// Format `seconds` as `HH:MM:SS`, or `HH:MM:SS,mmm` with `with_millis`
pub fn seconds_to_str(seconds: f64, with_millis: bool) -> String {
    let total = if seconds.is_finite() {
        (seconds.max(0.0) * 1000.0).round() as u64
    } else {
        0
    };

    let hours = total / 3_600_000;
    let minutes = (total / 60_000) % 60;
    let secs = (total / 1000) % 60;

    if with_millis {
        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, total % 1000)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}
