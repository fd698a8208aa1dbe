use biobank_curator::timepoint::{SCREENING_DAY, TimepointNormalizer, TimepointResult};

fn day_hour(raw: &str) -> (Option<i64>, Option<f64>) {
    let result = TimepointNormalizer::normalize(Some(raw));
    (result.day, result.hour)
}

fn assert_unparsed(result: &TimepointResult) {
    assert_eq!(result.day, None);
    assert_eq!(result.hour, None);
    assert_eq!(result.normalized_label, None);
    assert_eq!(result.is_pre_challenge, None);
    assert_eq!(result.is_inoculation, None);
    assert_eq!(result.is_post_challenge, None);
    assert_eq!(result.is_screening, None);
}

#[test]
fn hours_with_day_in_parentheses() {
    assert_eq!(day_hour("72 hours (Day 3)"), (Some(3), Some(72.0)));
    assert_eq!(day_hour("2.5 hours (Day 0)"), (Some(0), Some(2.5)));
    assert_eq!(day_hour("1 hour (Day 0)"), (Some(0), Some(1.0)));
}

#[test]
fn baseline_with_negative_hours() {
    assert_eq!(day_hour("Baseline -24 hours (Day -1)"), (Some(-1), Some(-24.0)));
    assert_eq!(day_hour("Baseline 0 hours (Day 0)"), (Some(0), Some(0.0)));
}

#[test]
fn hrs_abbreviation() {
    assert_eq!(day_hour("-12 hrs (Day -1)"), (Some(-1), Some(-12.0)));
    assert_eq!(day_hour("12 hr (Day 0)"), (Some(0), Some(12.0)));
}

#[test]
fn bare_day() {
    assert_eq!(day_hour("Day 7"), (Some(7), None));
    assert_eq!(day_hour("Day -2"), (Some(-2), None));
    assert_eq!(day_hour("day 28 follow-up"), (Some(28), None));
}

#[test]
fn labels_and_phase_flags() {
    let post = TimepointNormalizer::normalize(Some("72 hours (Day 3)"));
    assert_eq!(post.normalized_label.as_deref(), Some("Day 3 (72.0 hrs)"));
    assert_eq!(post.is_post_challenge, Some(true));
    assert_eq!(post.is_pre_challenge, Some(false));

    let inoculation = TimepointNormalizer::normalize(Some("Day 0"));
    assert_eq!(inoculation.normalized_label.as_deref(), Some("Day 0"));
    assert_eq!(inoculation.is_inoculation, Some(true));

    let pre = TimepointNormalizer::normalize(Some("Day -2"));
    assert_eq!(pre.is_pre_challenge, Some(true));
    assert_eq!(pre.is_screening, Some(false));
}

#[test]
fn screening_uses_sentinel_day() {
    let result = TimepointNormalizer::normalize(Some("Screening and pre-dose"));
    assert_eq!(result.is_screening, Some(true));
    assert_eq!(result.day, Some(SCREENING_DAY));
    assert_eq!(result.hour, None);
    assert_eq!(result.normalized_label.as_deref(), Some("Screening"));
    assert_eq!(result.study_day(), None);
}

#[test]
fn empty_and_missing_are_unparsed() {
    assert_unparsed(&TimepointNormalizer::normalize(Some("")));
    assert_unparsed(&TimepointNormalizer::normalize(None));
}

#[test]
fn garbage_is_unparsed_not_an_error() {
    let result = TimepointNormalizer::normalize(Some("garbage-unparseable-xyz"));
    assert_unparsed(&result);
    assert_eq!(result.original.as_deref(), Some("garbage-unparseable-xyz"));
}
