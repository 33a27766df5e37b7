use bson::Bson;
use chrono::{DateTime, Utc};

pub mod activity;
pub mod class;
pub mod user;
pub mod year;

/// Timestamps persist as BSON datetimes, which carry millisecond precision.
/// Values are truncated up front so a freshly built model serializes exactly
/// like its later read-back.
pub(crate) fn clamp_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    bson::DateTime::from_chrono(dt).to_chrono()
}

pub(crate) fn now_millis() -> DateTime<Utc> {
    clamp_to_millis(Utc::now())
}

/// Case-insensitive substring match, with the needle escaped so user input
/// can't smuggle regex syntax into the query.
pub(crate) fn ci_regex(needle: &str) -> Bson {
    Bson::RegularExpression(bson::Regex {
        pattern: regex_escape(needle),
        options: "i".to_string(),
    })
}

fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(
            c,
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert_eq!(regex_escape("10.A (b)"), "10\\.A \\(b\\)");
        assert_eq!(regex_escape("plain"), "plain");
    }

    #[test]
    fn clamped_timestamps_survive_bson_round_trip() {
        let clamped = clamp_to_millis(Utc::now());
        assert_eq!(clamped, bson::DateTime::from_chrono(clamped).to_chrono());
    }

    #[test]
    fn ci_regex_is_case_insensitive() {
        match ci_regex("Math") {
            Bson::RegularExpression(re) => {
                assert_eq!(re.pattern, "Math");
                assert_eq!(re.options, "i");
            }
            other => panic!("expected a regex, got {:?}", other),
        }
    }
}
