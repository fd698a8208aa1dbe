use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// Day value reserved for screening visits, which precede the study calendar.
pub const SCREENING_DAY: i64 = -999;

// The hours in pattern 1 are unsigned; a leading minus belongs to pattern 2/3.
static HOURS_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.\-])(\d+\.?\d*)\s*hours?\s*\(Day\s*(-?\d+)\)").unwrap()
});
static BASELINE_HOURS_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Baseline\s*(-?\d+)\s*hours?\s*\(Day\s*(-?\d+)\)").unwrap()
});
static HRS_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(-?\d+)\s*hrs?\s*\(Day\s*(-?\d+)\)").unwrap());
static BARE_DAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Day\s*(-?\d+)").unwrap());
static BASELINE_PAREN_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Baseline.*\(Day\s*(-?\d+)\)").unwrap());
static BASELINE_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^Baseline$").unwrap());
static SCREENING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Screening").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimepointResult {
    pub original: Option<String>,
    pub day: Option<i64>,
    pub hour: Option<f64>,
    pub normalized_label: Option<String>,
    pub is_pre_challenge: Option<bool>,
    pub is_inoculation: Option<bool>,
    pub is_post_challenge: Option<bool>,
    pub is_screening: Option<bool>,
}

impl TimepointResult {
    pub fn is_parsed(&self) -> bool {
        self.day.is_some()
    }

    pub fn study_day(&self) -> Option<i64> {
        self.day.filter(|day| *day != SCREENING_DAY)
    }
}

pub struct TimepointNormalizer;

impl TimepointNormalizer {
    pub fn extract_day_hour(raw: &str) -> Option<(i64, Option<f64>)> {
        let text = raw.trim();

        if let Some(found) = capture_hour_day(&HOURS_DAY, text) {
            return Some(found);
        }
        if let Some(found) = capture_hour_day(&BASELINE_HOURS_DAY, text) {
            return Some(found);
        }
        if let Some(found) = capture_hour_day(&HRS_DAY, text) {
            return Some(found);
        }
        if let Some(day) = capture_day(&BARE_DAY, text) {
            return Some((day, None));
        }
        if let Some(day) = capture_day(&BASELINE_PAREN_DAY, text) {
            return Some((day, Some(0.0)));
        }
        // Heuristic carried over from the curated data: a bare "Baseline" is
        // taken to be the day before inoculation. Not a validated rule.
        if BASELINE_ONLY.is_match(text) {
            return Some((-1, Some(0.0)));
        }
        if SCREENING.is_match(text) {
            return Some((SCREENING_DAY, None));
        }
        None
    }

    pub fn normalize(raw: Option<&str>) -> TimepointResult {
        let Some(raw) = raw else {
            return TimepointResult::default();
        };
        let mut result = TimepointResult {
            original: Some(raw.to_string()),
            ..TimepointResult::default()
        };
        if raw.trim().is_empty() {
            return result;
        }

        let Some((day, hour)) = Self::extract_day_hour(raw) else {
            return result;
        };

        result.day = Some(day);
        result.hour = hour;

        if day == SCREENING_DAY {
            result.normalized_label = Some("Screening".to_string());
            result.is_screening = Some(true);
            result.is_pre_challenge = Some(true);
            result.is_inoculation = Some(false);
            result.is_post_challenge = Some(false);
            return result;
        }

        result.is_pre_challenge = Some(day < 0);
        result.is_inoculation = Some(day == 0);
        result.is_post_challenge = Some(day > 0);
        result.is_screening = Some(false);
        result.normalized_label = Some(match hour {
            Some(hour) => format!("Day {day} ({hour:.1} hrs)"),
            None => format!("Day {day}"),
        });
        result
    }
}

fn capture_hour_day(regex: &Regex, text: &str) -> Option<(i64, Option<f64>)> {
    let captures = regex.captures(text)?;
    let hour = captures.get(1)?.as_str().parse::<f64>().ok()?;
    let day = captures.get(2)?.as_str().parse::<i64>().ok()?;
    Some((day, Some(hour)))
}

fn capture_day(regex: &Regex, text: &str) -> Option<i64> {
    regex.captures(text)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_with_day() {
        let result = TimepointNormalizer::normalize(Some("72 hours (Day 3)"));
        assert_eq!(result.day, Some(3));
        assert_eq!(result.hour, Some(72.0));
        assert_eq!(result.normalized_label.as_deref(), Some("Day 3 (72.0 hrs)"));
        assert_eq!(result.is_post_challenge, Some(true));
    }

    #[test]
    fn baseline_negative_hours() {
        let result = TimepointNormalizer::normalize(Some("Baseline -24 hours (Day -1)"));
        assert_eq!(result.day, Some(-1));
        assert_eq!(result.hour, Some(-24.0));
        assert_eq!(result.is_pre_challenge, Some(true));
    }

    #[test]
    fn bare_baseline_is_day_minus_one() {
        let result = TimepointNormalizer::normalize(Some("baseline"));
        assert_eq!(result.day, Some(-1));
        assert_eq!(result.hour, Some(0.0));
    }

    #[test]
    fn blank_input_is_unparsed() {
        let result = TimepointNormalizer::normalize(Some("   "));
        assert!(!result.is_parsed());
        assert_eq!(result.is_screening, None);
    }
}
