//! Talkytime timestamp recognition and the generated filename grammar:
//!
//! ```text
//! <prefix>.<YYYYMMDD-HHMMSS-Ddd>[+?].<runtime>.<notes>.<orig_basename>.flac
//! ```
//!
//! `Ddd` is the three-letter weekday, `+?` marks a low-confidence guess, and
//! `<runtime>` is `HhMmSs` with zero-valued components omitted.
//!
//! The recognizer's exact token grammar is an external collaborator (the
//! speech-to-text backend) we don't have ground truth for here; we detect a
//! run of 14 consecutive digits (`YYYYMMDDHHMMSS`) in the recognized text,
//! which is the one detail every talkytime encoding agrees on.

use chrono::{Datelike, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::model::TimestampGuess;

fn digit_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{14}").unwrap())
}

/// Scan recognized speech text for a 14-digit `YYYYMMDDHHMMSS` run.
pub fn parse_talkytime(text: &str) -> Option<TimestampGuess> {
    let m = digit_run_re().find(text)?;
    let when = NaiveDateTime::parse_from_str(m.as_str(), "%Y%m%d%H%M%S").ok()?;
    Some(TimestampGuess {
        when,
        low_confidence: false,
    })
}

fn weekday_abbrev(w: chrono::Weekday) -> &'static str {
    match w {
        chrono::Weekday::Mon => "Mon",
        chrono::Weekday::Tue => "Tue",
        chrono::Weekday::Wed => "Wed",
        chrono::Weekday::Thu => "Thu",
        chrono::Weekday::Fri => "Fri",
        chrono::Weekday::Sat => "Sat",
        chrono::Weekday::Sun => "Sun",
    }
}

fn parse_weekday_abbrev(s: &str) -> Option<chrono::Weekday> {
    match s {
        "Mon" => Some(chrono::Weekday::Mon),
        "Tue" => Some(chrono::Weekday::Tue),
        "Wed" => Some(chrono::Weekday::Wed),
        "Thu" => Some(chrono::Weekday::Thu),
        "Fri" => Some(chrono::Weekday::Fri),
        "Sat" => Some(chrono::Weekday::Sat),
        "Sun" => Some(chrono::Weekday::Sun),
        _ => None,
    }
}

/// Render `duration` seconds as `HhMmSs`, omitting any zero-valued component
/// (but always emitting at least one, e.g. `0s` for an empty recording).
pub fn format_runtime(duration_secs: f64) -> String {
    let total = duration_secs.round().max(0.0) as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{s}s"));
    }
    out
}

/// Build the generated (pre-`.flac`) basename from its components.
pub fn build_guessed_basename(
    prefix: &str,
    guess: &TimestampGuess,
    runtime_secs: f64,
    notes: &str,
    orig_basename: &str,
) -> String {
    let stamp = guess.when.format("%Y%m%d-%H%M%S").to_string();
    let weekday = weekday_abbrev(guess.weekday());
    let confidence = if guess.low_confidence { "+?" } else { "" };
    let runtime = format_runtime(runtime_secs);
    format!(
        "{prefix}.{stamp}-{weekday}{confidence}.{runtime}.{notes}.{orig_basename}"
    )
}

/// Parsed timestamp portion of a generated or operator-provided basename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTimestamp {
    pub when: NaiveDateTime,
    pub low_confidence: bool,
}

fn timestamp_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{8})-(\d{6})-(Mon|Tue|Wed|Thu|Fri|Sat|Sun)(\+\?)?").unwrap()
    })
}

/// Extract and validate the timestamp token embedded in a basename: it must
/// parse, and its recorded weekday must match the weekday its own date
/// implies.
pub fn parse_and_validate_timestamp(basename: &str) -> Option<ParsedTimestamp> {
    let caps = timestamp_token_re().captures(basename)?;
    let date = &caps[1];
    let time = &caps[2];
    let weekday = parse_weekday_abbrev(&caps[3])?;
    let low_confidence = caps.get(4).is_some();
    let when = NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M%S").ok()?;
    if when.weekday() != weekday {
        return None;
    }
    Some(ParsedTimestamp {
        when,
        low_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn talkytime_extracts_digit_run() {
        let guess = parse_talkytime("um so it's twenty 20211106104400 okay recording now").unwrap();
        assert_eq!(
            guess.when,
            NaiveDate::from_ymd_opt(2021, 11, 6)
                .unwrap()
                .and_hms_opt(10, 44, 0)
                .unwrap()
        );
    }

    #[test]
    fn talkytime_none_without_digit_run() {
        assert!(parse_talkytime("no timestamp here at all").is_none());
    }

    #[test]
    fn runtime_omits_zero_components() {
        assert_eq!(format_runtime(0.0), "0s");
        assert_eq!(format_runtime(65.0), "1m5s");
        assert_eq!(format_runtime(3600.0), "1h");
        assert_eq!(format_runtime(3723.0), "1h2m3s");
    }

    #[test]
    fn build_and_parse_round_trip() {
        let when = NaiveDate::from_ymd_opt(2021, 11, 6)
            .unwrap()
            .and_hms_opt(10, 44, 0)
            .unwrap();
        assert_eq!(when.weekday(), chrono::Weekday::Sat);
        let guess = TimestampGuess {
            when,
            low_confidence: false,
        };
        let basename = build_guessed_basename(
            "piano",
            &guess,
            93.0 * 60.0,
            "Bach-Minuet-93bpm.sv2",
            "audio001",
        );
        assert_eq!(
            basename,
            "piano.20211106-104400-Sat.1h33m.Bach-Minuet-93bpm.sv2.audio001"
        );
        let parsed = parse_and_validate_timestamp(&basename).unwrap();
        assert_eq!(parsed.when, when);
        assert!(!parsed.low_confidence);
    }

    #[test]
    fn mismatched_weekday_rejected() {
        // Nov 6 2021 is a Saturday, not a Monday.
        assert!(parse_and_validate_timestamp("x.20211106-104400-Mon.1m.notes.orig").is_none());
    }

    #[test]
    fn low_confidence_marker_round_trips() {
        let when = NaiveDate::from_ymd_opt(2021, 11, 6)
            .unwrap()
            .and_hms_opt(10, 44, 0)
            .unwrap();
        let guess = TimestampGuess {
            when,
            low_confidence: true,
        };
        let basename = build_guessed_basename("piano", &guess, 0.0, "notes", "orig");
        let parsed = parse_and_validate_timestamp(&basename).unwrap();
        assert!(parsed.low_confidence);
    }
}
