//! Relative time-expression parser.
//!
//! Resolves natural-language expressions like "tomorrow 2pm", "next friday
//! at 3", or "in 2 hours" against a reference instant in the user's
//! timezone. The extractor leaves such expressions unresolved; the action
//! resolver calls into this module to make them absolute.
//!
//! Expressions that cannot be parsed resolve to `None`, which the resolver
//! turns into a clarification question rather than a guess.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

/// A resolved expression. `has_time_of_day` distinguishes "friday" (a day,
/// resolved to midnight) from "friday at 3pm" (an instant); query windows
/// treat day-only expressions as whole days.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeExpression {
    pub instant: DateTime<Tz>,
    pub has_time_of_day: bool,
}

static AMPM_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").expect("valid regex"));
static CLOCK_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("valid regex"));
static AT_HOUR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bat\s+(\d{1,2})\b").expect("valid regex"));
static IN_DELTA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bin\s+(\d+)\s+(minute|minutes|min|mins|hour|hours|day|days|week|weeks)\b")
        .expect("valid regex")
});
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(next\s+|this\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("valid regex")
});

/// Resolve a natural-language time expression against `now`.
///
/// Accepts RFC 3339 timestamps as a fast path, since the extractor may
/// already produce absolute values for explicit dates.
pub fn resolve_time_expression(expr: &str, now: DateTime<Tz>) -> Option<TimeExpression> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(absolute) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(TimeExpression {
            instant: absolute.with_timezone(&now.timezone()),
            has_time_of_day: true,
        });
    }

    let lowered = trimmed.to_lowercase();

    // "in N minutes/hours" resolves fully relative to now.
    if let Some(caps) = IN_DELTA.captures(&lowered) {
        let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2)?.as_str();
        return match unit {
            "minute" | "minutes" | "min" | "mins" => Some(TimeExpression {
                instant: now + Duration::minutes(amount),
                has_time_of_day: true,
            }),
            "hour" | "hours" => Some(TimeExpression {
                instant: now + Duration::hours(amount),
                has_time_of_day: true,
            }),
            "day" | "days" => {
                combine(now, shift_date(now, amount)?, parse_time_of_day(&lowered))
            }
            "week" | "weeks" => {
                combine(now, shift_date(now, amount * 7)?, parse_time_of_day(&lowered))
            }
            _ => None,
        };
    }

    let date = parse_date_word(&lowered, now);
    let time = parse_time_of_day(&lowered);

    match (date, time) {
        (Some(date), time) => combine(now, date, time),
        // Time only: anchored to today.
        (None, Some(time)) => combine(now, now.date_naive(), Some(time)),
        (None, None) => None,
    }
}

fn combine(
    now: DateTime<Tz>,
    date: NaiveDate,
    time: Option<NaiveTime>,
) -> Option<TimeExpression> {
    let has_time_of_day = time.is_some();
    let time = time.unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default());
    let instant = local_instant(now.timezone(), date, time)?;
    Some(TimeExpression { instant, has_time_of_day })
}

/// Map a wall-clock date+time into the zone. Ambiguous local times (DST
/// fall-back) take the earlier instant; nonexistent ones (spring-forward
/// gap) slide forward an hour.
fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

fn shift_date(now: DateTime<Tz>, days: i64) -> Option<NaiveDate> {
    now.date_naive().checked_add_signed(Duration::days(days))
}

fn parse_date_word(expr: &str, now: DateTime<Tz>) -> Option<NaiveDate> {
    let today = now.date_naive();

    if expr.contains("day after tomorrow") {
        return today.checked_add_signed(Duration::days(2));
    }
    if expr.contains("tomorrow") {
        return today.checked_add_signed(Duration::days(1));
    }
    if expr.contains("yesterday") {
        return today.checked_sub_signed(Duration::days(1));
    }
    if expr.contains("today") || expr.contains("tonight") {
        return Some(today);
    }

    if let Some(caps) = WEEKDAY.captures(expr) {
        let qualifier = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        let target = weekday_from_name(caps.get(2)?.as_str())?;

        let current = today.weekday().num_days_from_monday() as i64;
        let wanted = target.num_days_from_monday() as i64;
        let mut ahead = (wanted - current).rem_euclid(7);
        // Bare "friday" on a Friday means today; "next friday" never does.
        if qualifier == "next" && ahead == 0 {
            ahead = 7;
        }
        return today.checked_add_signed(Duration::days(ahead));
    }

    None
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_time_of_day(expr: &str) -> Option<NaiveTime> {
    if expr.contains("noon") {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }
    if expr.contains("midnight") {
        return NaiveTime::from_hms_opt(0, 0, 0);
    }

    if let Some(caps) = AMPM_TIME.captures(expr) {
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let meridiem = caps.get(3)?.as_str().to_lowercase();
        if hour == 0 || hour > 12 {
            return None;
        }
        let hour24 = match (meridiem.as_str(), hour) {
            ("am", 12) => 0,
            ("am", h) => h,
            ("pm", 12) => 12,
            ("pm", h) => h + 12,
            _ => return None,
        };
        return NaiveTime::from_hms_opt(hour24, minute, 0);
    }

    if let Some(caps) = CLOCK_TIME.captures(expr) {
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = caps.get(2)?.as_str().parse().ok()?;
        if hour < 24 && minute < 60 {
            return NaiveTime::from_hms_opt(hour, minute, 0);
        }
        return None;
    }

    // Bare "at 3": no meridiem given. Assistant convention: small hours
    // are afternoon (3 -> 15:00), 8 and up are taken literally.
    if let Some(caps) = AT_HOUR.captures(expr) {
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        if hour >= 24 {
            return None;
        }
        let hour24 = if (1..8).contains(&hour) { hour + 12 } else { hour };
        return NaiveTime::from_hms_opt(hour24, 0, 0);
    }

    None
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;
    use chrono_tz::America::New_York;
    use chrono_tz::Europe::Berlin;

    use super::*;

    /// Monday 2024-06-10, 09:00 in New York (EDT, UTC-4).
    fn monday_morning() -> DateTime<Tz> {
        New_York.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).single().expect("valid reference")
    }

    fn resolve(expr: &str) -> TimeExpression {
        resolve_time_expression(expr, monday_morning())
            .unwrap_or_else(|| panic!("expected `{expr}` to resolve"))
    }

    #[test]
    fn tomorrow_at_2pm() {
        let resolved = resolve("tomorrow 2pm");
        assert_eq!(
            resolved.instant,
            New_York.with_ymd_and_hms(2024, 6, 11, 14, 0, 0).single().expect("valid")
        );
        assert!(resolved.has_time_of_day);
    }

    #[test]
    fn tomorrow_at_2pm_with_filler_words() {
        assert_eq!(resolve("tomorrow at 2pm").instant, resolve("tomorrow 2pm").instant);
        assert_eq!(resolve("Tomorrow at 2:00 PM").instant, resolve("tomorrow 2pm").instant);
    }

    #[test]
    fn next_friday_at_3() {
        let resolved = resolve("next friday at 3");
        assert_eq!(
            resolved.instant,
            New_York.with_ymd_and_hms(2024, 6, 14, 15, 0, 0).single().expect("valid")
        );
    }

    #[test]
    fn bare_weekday_is_day_only() {
        let resolved = resolve("friday");
        assert_eq!(resolved.instant.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
        assert!(!resolved.has_time_of_day);
    }

    #[test]
    fn bare_weekday_today_resolves_to_today() {
        let resolved = resolve("monday");
        assert_eq!(resolved.instant.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
    }

    #[test]
    fn next_monday_skips_today() {
        let resolved = resolve("next monday");
        assert_eq!(resolved.instant.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 17).unwrap());
    }

    #[test]
    fn noon_and_midnight() {
        assert_eq!(resolve("tomorrow at noon").instant.hour(), 12);
        assert_eq!(resolve("tomorrow at midnight").instant.hour(), 0);
    }

    #[test]
    fn twenty_four_hour_clock() {
        let resolved = resolve("tomorrow 15:30");
        assert_eq!(resolved.instant.hour(), 15);
        assert_eq!(resolved.instant.minute(), 30);
    }

    #[test]
    fn time_only_anchors_to_today() {
        let resolved = resolve("3pm");
        assert_eq!(
            resolved.instant,
            New_York.with_ymd_and_hms(2024, 6, 10, 15, 0, 0).single().expect("valid")
        );
    }

    #[test]
    fn in_two_hours() {
        let resolved = resolve("in 2 hours");
        assert_eq!(resolved.instant, monday_morning() + Duration::hours(2));
        assert!(resolved.has_time_of_day);
    }

    #[test]
    fn in_three_days_is_day_only() {
        let resolved = resolve("in 3 days");
        assert_eq!(resolved.instant.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 13).unwrap());
        assert!(!resolved.has_time_of_day);
    }

    #[test]
    fn rfc3339_fast_path() {
        let resolved = resolve("2024-06-11T14:00:00-04:00");
        assert_eq!(
            resolved.instant,
            New_York.with_ymd_and_hms(2024, 6, 11, 14, 0, 0).single().expect("valid")
        );
    }

    #[test]
    fn twelve_am_and_pm_edge_cases() {
        assert_eq!(resolve("tomorrow 12am").instant.hour(), 0);
        assert_eq!(resolve("tomorrow 12pm").instant.hour(), 12);
    }

    #[test]
    fn gibberish_does_not_resolve() {
        assert!(resolve_time_expression("whenever works", monday_morning()).is_none());
        assert!(resolve_time_expression("", monday_morning()).is_none());
    }

    #[test]
    fn dst_spring_forward_gap_slides_ahead() {
        // 2024-03-31 02:30 does not exist in Berlin; expect 03:30.
        let reference =
            Berlin.with_ymd_and_hms(2024, 3, 30, 9, 0, 0).single().expect("valid reference");
        let resolved =
            resolve_time_expression("tomorrow 2:30", reference).expect("should resolve");
        assert_eq!(resolved.instant.hour(), 3);
        assert_eq!(resolved.instant.minute(), 30);
    }
}
