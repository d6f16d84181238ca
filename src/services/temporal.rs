//! Free-text date and time-of-day resolution.
//!
//! Phrases are matched against ordered rule tables, most specific first.
//! When no phrase rule fires, a generic single-date parser looks for an
//! explicit calendar date or weekday name. Nothing found means unbounded,
//! never "today only".

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use serde::Serialize;

use crate::models::{DateRange, TimeRange};

/// Date and time windows recovered from a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub date_range: Option<DateRange>,
    pub time_range: Option<TimeRange>,
}

impl Resolution {
    /// Field-wise preference: `self` where set, otherwise `fallback`.
    pub fn or(self, fallback: Resolution) -> Resolution {
        Resolution {
            date_range: self.date_range.or(fallback.date_range),
            time_range: self.time_range.or(fallback.time_range),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.date_range.is_none() && self.time_range.is_none()
    }
}

/// Resolve date and time windows from a query using the rule tables.
pub fn resolve(query: &str, now: NaiveDateTime) -> Resolution {
    let q = query.to_lowercase();
    Resolution {
        date_range: resolve_date(&q, now.date()),
        time_range: resolve_time(&q),
    }
}

type DateRule = fn(NaiveDate) -> Option<DateRange>;

struct PhraseRule {
    pattern: Regex,
    apply: DateRule,
}

impl PhraseRule {
    fn new(pattern: &str, apply: DateRule) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("valid date phrase regex"),
            apply,
        }
    }
}

static DATE_PHRASES: LazyLock<Vec<PhraseRule>> = LazyLock::new(|| {
    vec![
        PhraseRule::new(r"\btonight\b", |today| Some(DateRange::day(today))),
        PhraseRule::new(r"\btoday\b", |today| Some(DateRange::day(today))),
        PhraseRule::new(r"\btomorrow\b", |today| {
            today.checked_add_days(Days::new(1)).map(DateRange::day)
        }),
        PhraseRule::new(r"\bnext\s+weekend\b", |today| {
            let sat = next_monday(today)?.checked_add_days(Days::new(5))?;
            DateRange::new(sat, sat.checked_add_days(Days::new(1))?)
        }),
        PhraseRule::new(r"\b(?:this\s+)?weekend\b", weekend_of),
        PhraseRule::new(r"\bnext\s+week\b", |today| {
            let monday = next_monday(today)?;
            DateRange::new(monday, monday.checked_add_days(Days::new(6))?)
        }),
        PhraseRule::new(r"\bthis\s+week\b", |today| {
            let left = 6 - u64::from(today.weekday().num_days_from_monday());
            DateRange::new(today, today.checked_add_days(Days::new(left))?)
        }),
        PhraseRule::new(r"\bnext\s+month\b", |today| {
            let first = first_of_next_month(today)?;
            DateRange::new(first, last_of_month(first)?)
        }),
        PhraseRule::new(r"\bthis\s+month\b", |today| {
            DateRange::new(today, last_of_month(today)?)
        }),
    ]
});

fn resolve_date(q: &str, today: NaiveDate) -> Option<DateRange> {
    DATE_PHRASES
        .iter()
        .filter(|rule| rule.pattern.is_match(q))
        .find_map(|rule| (rule.apply)(today))
        .or_else(|| parse_single_date(q, today).map(DateRange::day))
        .or_else(|| named_month(q, today))
}

/// Upcoming Saturday-Sunday. On a Saturday or Sunday this is the weekend in
/// progress (its remaining days), never the following one; "next weekend"
/// covers that.
fn weekend_of(today: NaiveDate) -> Option<DateRange> {
    match today.weekday().num_days_from_monday() {
        5 => DateRange::new(today, today.checked_add_days(Days::new(1))?),
        6 => Some(DateRange::day(today)),
        wd => {
            let sat = today.checked_add_days(Days::new(u64::from(5 - wd)))?;
            DateRange::new(sat, sat.checked_add_days(Days::new(1))?)
        }
    }
}

fn next_monday(today: NaiveDate) -> Option<NaiveDate> {
    let wd = u64::from(today.weekday().num_days_from_monday());
    today.checked_add_days(Days::new(7 - wd))
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    match date.month() {
        12 => NaiveDate::from_ymd_opt(date.year() + 1, 1, 1),
        m => NaiveDate::from_ymd_opt(date.year(), m + 1, 1),
    }
}

fn last_of_month(date: NaiveDate) -> Option<NaiveDate> {
    first_of_next_month(date)?.pred_opt()
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

const MONTH_WORD: &str = r"(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)";

/// Month number for a full name or an abbreviation.
fn month_number(word: &str) -> Option<u32> {
    let word = word.trim_end_matches('.');
    if word.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(word))
        .map(|i| i as u32 + 1)
}

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid iso regex"));
static SLASH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2}|\d{4}))?\b").expect("valid slash date regex")
});
static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b{MONTH_WORD}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}})\b)?"
    ))
    .expect("valid month-day regex")
});
static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH_WORD}\b(?:,?\s+(\d{{4}})\b)?"
    ))
    .expect("valid day-month regex")
});
static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(this|next)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("valid weekday regex")
});
static NAMED_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(in|during|of|for)\s+)?(january|february|march|april|may|june|july|august|september|october|november|december)\b",
    )
    .expect("valid named month regex")
});

/// Find the first explicit calendar date or weekday name in the query.
pub fn parse_single_date(q: &str, today: NaiveDate) -> Option<NaiveDate> {
    let q = q.to_lowercase();

    if let Some(c) = ISO_DATE.captures(&q) {
        if let Some(date) = NaiveDate::from_ymd_opt(num(&c, 1)?, num(&c, 2)?, num(&c, 3)?) {
            return Some(date);
        }
    }
    if let Some(c) = SLASH_DATE.captures(&q) {
        let year = c.get(3).and_then(|y| y.as_str().parse::<i32>().ok()).map(|y| {
            if y < 100 { 2000 + y } else { y }
        });
        if let Some(date) = calendar_date(num(&c, 1)?, num(&c, 2)?, year, today) {
            return Some(date);
        }
    }
    if let Some(c) = MONTH_DAY.captures(&q) {
        let month = month_number(c.get(1)?.as_str())?;
        if let Some(date) = calendar_date(month, num(&c, 2)?, num(&c, 3), today) {
            return Some(date);
        }
    }
    if let Some(c) = DAY_MONTH.captures(&q) {
        let month = month_number(c.get(2)?.as_str())?;
        if let Some(date) = calendar_date(month, num(&c, 1)?, num(&c, 3), today) {
            return Some(date);
        }
    }
    WEEKDAY.captures(&q).and_then(|c| weekday_date(&c, today))
}

fn num<T: std::str::FromStr>(c: &Captures, group: usize) -> Option<T> {
    c.get(group)?.as_str().parse().ok()
}

/// Build a date; a yearless date that already passed rolls to next year.
fn calendar_date(month: u32, day: u32, year: Option<i32>, today: NaiveDate) -> Option<NaiveDate> {
    match year {
        Some(y) => NaiveDate::from_ymd_opt(y, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(d) if d >= today => Some(d),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            }
        }
    }
}

fn weekday_date(c: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let name = c.get(2)?.as_str();
    let target = WEEKDAYS.iter().position(|w| *w == name)? as u64;
    let current = u64::from(today.weekday().num_days_from_monday());
    match c.get(1).map(|m| m.as_str()) {
        Some("next") => next_monday(today)?.checked_add_days(Days::new(target)),
        _ => today.checked_add_days(Days::new((target + 7 - current) % 7)),
    }
}

/// A bare month name: the rest of it if current, otherwise the whole month
/// in its next occurrence.
fn named_month(q: &str, today: NaiveDate) -> Option<DateRange> {
    let month = NAMED_MONTH.captures_iter(q).find_map(|c| {
        let name = c.get(2)?.as_str();
        // "may" is usually the verb unless introduced by a preposition.
        if name == "may" && c.get(1).is_none() {
            return None;
        }
        month_number(name)
    })?;

    if month == today.month() {
        return DateRange::new(today, last_of_month(today)?);
    }
    let year = if month > today.month() {
        today.year()
    } else {
        today.year() + 1
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    DateRange::new(first, last_of_month(first)?)
}

static BETWEEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bbetween\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\s+(?:and|-)\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b",
    )
    .expect("valid between regex")
});
static AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bafter\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").expect("valid after regex")
});
static BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bbefore\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").expect("valid before regex")
});
static LATE_NIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:late|at)\s+night\b").expect("valid night regex"));
static MORNING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bmorning\b").expect("valid morning regex"));
static AFTERNOON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bafternoon\b").expect("valid afternoon regex"));
static EVENING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bevening\b").expect("valid evening regex"));
static TONIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btonight\b").expect("valid tonight regex"));

static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}(?::\d{2})?\s*(?:am|pm)\b|\b\d{1,2}:\d{2}\b").expect("valid clock regex")
});

/// Lowercased query with explicit dates and clock times blanked out, so the
/// digits they carry are not mistaken for search terms.
pub fn strip_expressions(query: &str) -> String {
    let patterns: [&Regex; 8] = [
        &BETWEEN, &AFTER, &BEFORE, &ISO_DATE, &SLASH_DATE, &MONTH_DAY, &DAY_MONTH, &CLOCK,
    ];
    patterns
        .into_iter()
        .fold(query.to_lowercase(), |q, re| re.replace_all(&q, " ").into_owned())
}

fn hm(hour: u32, minute: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Clock time from hour, optional minutes and optional meridiem. Without a
/// meridiem the hour is read on the 24-hour clock.
fn clock(hour: u32, minute: Option<u32>, meridiem: Option<&str>) -> Option<NaiveTime> {
    let hour = match meridiem {
        Some("pm") if (1..12).contains(&hour) => hour + 12,
        Some("am") if hour == 12 => 0,
        Some(_) if hour == 0 || hour > 12 => return None,
        _ => hour,
    };
    hm(hour, minute.unwrap_or(0))
}

fn clock_at(c: &Captures, first: usize, meridiem: Option<&str>) -> Option<NaiveTime> {
    clock(num(c, first)?, num(c, first + 1), meridiem)
}

fn resolve_time(q: &str) -> Option<TimeRange> {
    if let Some(c) = BETWEEN.captures(q) {
        let end_meridiem = c.get(6).map(|m| m.as_str());
        let start_meridiem = c.get(3).map(|m| m.as_str()).or(end_meridiem);
        let start = clock_at(&c, 1, start_meridiem);
        let end = clock_at(&c, 4, end_meridiem);
        if let (Some(start), Some(end)) = (start, end) {
            if let Some(range) = TimeRange::new(Some(start), Some(end)) {
                return Some(range);
            }
        }
    }
    if let Some(c) = AFTER.captures(q) {
        if let Some(start) = clock_at(&c, 1, c.get(3).map(|m| m.as_str())) {
            return Some(TimeRange::after(start));
        }
    }
    if let Some(c) = BEFORE.captures(q) {
        if let Some(end) = clock_at(&c, 1, c.get(3).map(|m| m.as_str())) {
            return Some(TimeRange::before(end));
        }
    }
    if LATE_NIGHT.is_match(q) {
        return hm(20, 0).map(TimeRange::after);
    }
    if MORNING.is_match(q) {
        return TimeRange::new(hm(6, 0), hm(12, 0));
    }
    if AFTERNOON.is_match(q) {
        return TimeRange::new(hm(12, 0), hm(17, 0));
    }
    if EVENING.is_match(q) {
        return TimeRange::new(hm(17, 0), hm(21, 0));
    }
    if TONIGHT.is_match(q) {
        return hm(17, 0).map(TimeRange::after);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range(a: NaiveDate, b: NaiveDate) -> Option<DateRange> {
        DateRange::new(a, b)
    }

    // Wednesday
    fn now() -> NaiveDateTime {
        ymd(2026, 4, 8).and_hms_opt(10, 30, 0).unwrap()
    }

    fn date_of(q: &str) -> Option<DateRange> {
        resolve(q, now()).date_range
    }

    fn t(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    #[test]
    fn test_relative_days() {
        assert_eq!(date_of("concerts today"), range(ymd(2026, 4, 8), ymd(2026, 4, 8)));
        assert_eq!(date_of("trivia tonight"), range(ymd(2026, 4, 8), ymd(2026, 4, 8)));
        assert_eq!(date_of("Tomorrow yoga"), range(ymd(2026, 4, 9), ymd(2026, 4, 9)));
    }

    #[test]
    fn test_weeks_and_weekends() {
        assert_eq!(date_of("pizza night this weekend"), range(ymd(2026, 4, 11), ymd(2026, 4, 12)));
        assert_eq!(date_of("weekend hikes"), range(ymd(2026, 4, 11), ymd(2026, 4, 12)));
        assert_eq!(date_of("next weekend"), range(ymd(2026, 4, 18), ymd(2026, 4, 19)));
        assert_eq!(date_of("this week"), range(ymd(2026, 4, 8), ymd(2026, 4, 12)));
        assert_eq!(date_of("next week"), range(ymd(2026, 4, 13), ymd(2026, 4, 19)));
    }

    #[test]
    fn test_weekend_from_weekend_days() {
        let saturday = ymd(2026, 4, 11).and_hms_opt(9, 0, 0).unwrap();
        let sunday = ymd(2026, 4, 12).and_hms_opt(9, 0, 0).unwrap();
        assert_eq!(
            resolve("this weekend", saturday).date_range,
            range(ymd(2026, 4, 11), ymd(2026, 4, 12))
        );
        assert_eq!(
            resolve("this weekend", sunday).date_range,
            range(ymd(2026, 4, 12), ymd(2026, 4, 12))
        );
        assert_eq!(
            resolve("next weekend", saturday).date_range,
            range(ymd(2026, 4, 18), ymd(2026, 4, 19))
        );
        assert_eq!(
            resolve("next weekend", sunday).date_range,
            range(ymd(2026, 4, 18), ymd(2026, 4, 19))
        );
    }

    #[test]
    fn test_months() {
        assert_eq!(date_of("this month"), range(ymd(2026, 4, 8), ymd(2026, 4, 30)));
        assert_eq!(date_of("next month"), range(ymd(2026, 5, 1), ymd(2026, 5, 31)));
        assert_eq!(date_of("theatre in june"), range(ymd(2026, 6, 1), ymd(2026, 6, 30)));
        assert_eq!(date_of("march lectures"), range(ymd(2027, 3, 1), ymd(2027, 3, 31)));
        assert_eq!(date_of("april"), range(ymd(2026, 4, 8), ymd(2026, 4, 30)));
        assert_eq!(date_of("events in may"), range(ymd(2026, 5, 1), ymd(2026, 5, 31)));
        assert_eq!(date_of("things i may like"), None);
    }

    #[test]
    fn test_next_month_in_december() {
        let december = ymd(2026, 12, 3).and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(
            resolve("next month", december).date_range,
            range(ymd(2027, 1, 1), ymd(2027, 1, 31))
        );
    }

    #[test]
    fn test_explicit_dates() {
        let today = ymd(2026, 4, 8);
        assert_eq!(parse_single_date("on 2026-05-03", today), Some(ymd(2026, 5, 3)));
        assert_eq!(parse_single_date("4/20", today), Some(ymd(2026, 4, 20)));
        assert_eq!(parse_single_date("4/1", today), Some(ymd(2027, 4, 1)));
        assert_eq!(parse_single_date("1/5/27", today), Some(ymd(2027, 1, 5)));
        assert_eq!(parse_single_date("march 14", today), Some(ymd(2027, 3, 14)));
        assert_eq!(parse_single_date("Apr. 21st, 2026", today), Some(ymd(2026, 4, 21)));
        assert_eq!(parse_single_date("the 14th of may", today), Some(ymd(2026, 5, 14)));
        assert_eq!(parse_single_date("13/45", today), None);
    }

    #[test]
    fn test_weekdays() {
        let today = ymd(2026, 4, 8);
        assert_eq!(parse_single_date("friday", today), Some(ymd(2026, 4, 10)));
        assert_eq!(parse_single_date("this friday", today), Some(ymd(2026, 4, 10)));
        assert_eq!(parse_single_date("next friday", today), Some(ymd(2026, 4, 17)));
        assert_eq!(parse_single_date("wednesday", today), Some(ymd(2026, 4, 8)));
        assert_eq!(parse_single_date("monday", today), Some(ymd(2026, 4, 13)));
    }

    #[test]
    fn test_explicit_date_beats_month_name() {
        assert_eq!(date_of("june 2 recital"), range(ymd(2026, 6, 2), ymd(2026, 6, 2)));
    }

    #[test]
    fn test_time_of_day_phrases() {
        let time_of = |q: &str| resolve(q, now()).time_range;
        assert_eq!(time_of("morning run"), TimeRange::new(t(6, 0), t(12, 0)));
        assert_eq!(time_of("afternoon tea"), TimeRange::new(t(12, 0), t(17, 0)));
        assert_eq!(time_of("friday evening"), TimeRange::new(t(17, 0), t(21, 0)));
        assert_eq!(time_of("tonight"), Some(TimeRange::after(hm(17, 0).unwrap())));
        assert_eq!(time_of("something late night"), Some(TimeRange::after(hm(20, 0).unwrap())));
        assert_eq!(time_of("pizza night"), None);
    }

    #[test]
    fn test_clock_bounds() {
        let time_of = |q: &str| resolve(q, now()).time_range;
        assert_eq!(time_of("after 6pm"), Some(TimeRange::after(hm(18, 0).unwrap())));
        assert_eq!(time_of("after 18:30"), Some(TimeRange::after(hm(18, 30).unwrap())));
        assert_eq!(time_of("before 9am"), Some(TimeRange::before(hm(9, 0).unwrap())));
        assert_eq!(time_of("before 12am"), Some(TimeRange::before(hm(0, 0).unwrap())));
        assert_eq!(time_of("between 5 and 7pm"), TimeRange::new(t(17, 0), t(19, 0)));
        assert_eq!(time_of("between 9am and 11am"), TimeRange::new(t(9, 0), t(11, 0)));
        assert_eq!(time_of("between 9pm and 7pm"), None);
        assert_eq!(time_of("after 25"), None);
    }

    #[test]
    fn test_strip_expressions() {
        let words = |q: &str| -> Vec<String> {
            strip_expressions(q).split_whitespace().map(str::to_string).collect()
        };
        assert_eq!(words("Jazz after 6pm"), vec!["jazz"]);
        assert_eq!(words("after 18:30"), Vec::<String>::new());
        assert_eq!(words("fair on 4/20"), vec!["fair", "on"]);
        assert_eq!(words("2026-04-20 talks"), vec!["talks"]);
        assert_eq!(words("recital june 2nd at 7:30 pm"), vec!["recital", "at"]);
        assert_eq!(words("between 5 and 7pm yoga"), vec!["yoga"]);
        assert_eq!(words("5k run"), vec!["5k", "run"]);
    }

    #[test]
    fn test_no_signal_is_unbounded() {
        let r = resolve("jazz concert", now());
        assert!(r.is_empty());
    }

    #[test]
    fn test_or_prefers_self() {
        let collaborator = Resolution {
            date_range: range(ymd(2026, 5, 1), ymd(2026, 5, 2)),
            time_range: None,
        };
        let rules = resolve("tonight", now());
        let merged = collaborator.or(rules);
        assert_eq!(merged.date_range, range(ymd(2026, 5, 1), ymd(2026, 5, 2)));
        assert_eq!(merged.time_range, rules.time_range);
    }
}
