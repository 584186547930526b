//! Date and value formatting for display, in Hebrew.

use chrono::{DateTime, Local, Locale, NaiveDate, NaiveDateTime, TimeZone, Utc};

const LOCALE: Locale = Locale::he_IL;

/// Layout used by the entry form's date field.
pub const INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Display styles, from most to least detailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// `יום רביעי, 17 דצמבר 2025 14:30:00`
    Full,
    /// `17 דצמבר 2025, 14:30`
    Long,
    /// `17 דצמ 2025, 14:30`
    Medium,
    /// `17/12/2025, 14:30`
    Short,
    /// `17 דצמ 2025`
    DateOnly,
    /// `יום רביעי, 17 דצמבר 2025`
    FullDate,
    /// `17/12/2025`
    ShortDate,
    /// `14:30`
    TimeOnly,
}

impl DateStyle {
    fn pattern(&self) -> &'static str {
        match self {
            Self::Full => "%A, %-d %B %Y %H:%M:%S",
            Self::Long => "%-d %B %Y, %H:%M",
            Self::Medium => "%-d %b %Y, %H:%M",
            Self::Short => "%d/%m/%Y, %H:%M",
            Self::DateOnly => "%-d %b %Y",
            Self::FullDate => "%A, %-d %B %Y",
            Self::ShortDate => "%d/%m/%Y",
            Self::TimeOnly => "%H:%M",
        }
    }
}

/// Parse the date formats the backend and the entry form produce.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(date.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", INPUT_FORMAT, "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    // Dates typed without an offset are local wall-clock time.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|date| date.with_timezone(&Utc))
}

/// Format `input` in the given style; unparseable input is echoed back.
pub fn format(input: &str, style: DateStyle) -> String {
    match parse_date(input) {
        Some(date) => format_datetime(date, style),
        None => input.to_string(),
    }
}

pub fn format_datetime(date: DateTime<Utc>, style: DateStyle) -> String {
    date.with_timezone(&Local)
        .format_localized(style.pattern(), LOCALE)
        .to_string()
}

/// The default style for feed cards.
pub fn medium_datetime(input: &str) -> String {
    format(input, DateStyle::Medium)
}

pub fn date_only(input: &str) -> String {
    format(input, DateStyle::DateOnly)
}

pub fn short_date(input: &str) -> String {
    format(input, DateStyle::ShortDate)
}

/// Local wall-clock text for the entry form.
pub fn input_value(input: &str) -> String {
    match parse_date(input) {
        Some(date) => date.with_timezone(&Local).format(INPUT_FORMAT).to_string(),
        None => input.to_string(),
    }
}

/// Normalise form input to the RFC 3339 form stored in the backend.
pub fn storage_value(input: &str) -> Option<String> {
    parse_date(input).map(|date| date.to_rfc3339())
}

/// "לפני 5 דקות", "אתמול", ... relative to now.
pub fn relative_time(input: &str) -> String {
    relative_time_at(input, Utc::now())
}

pub fn relative_time_at(input: &str, now: DateTime<Utc>) -> String {
    let Some(date) = parse_date(input) else {
        return String::new();
    };

    let seconds = (now - date).num_seconds();
    if seconds < 0 {
        return "בעתיד".to_string();
    }
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if seconds < 60 {
        "כרגע".to_string()
    } else if minutes < 60 {
        ago(minutes, "דקה", "דקות")
    } else if hours < 24 {
        ago(hours, "שעה", "שעות")
    } else if days == 1 {
        "אתמול".to_string()
    } else if days < 7 {
        format!("לפני {days} ימים")
    } else if days < 30 {
        ago(days / 7, "שבוע", "שבועות")
    } else if days < 365 {
        ago(days / 30, "חודש", "חודשים")
    } else {
        ago(days / 365, "שנה", "שנים")
    }
}

fn ago(count: i64, one: &str, many: &str) -> String {
    format!("לפני {count} {}", if count == 1 { one } else { many })
}

pub fn is_today(input: &str) -> bool {
    is_days_ago(input, 0)
}

pub fn is_yesterday(input: &str) -> bool {
    is_days_ago(input, 1)
}

fn is_days_ago(input: &str, days: i64) -> bool {
    let Some(date) = parse_date(input) else {
        return false;
    };
    let target = Local::now().date_naive() - chrono::Duration::days(days);
    date.with_timezone(&Local).date_naive() == target
}

/// `₪12.5`
pub fn price(value: f64) -> String {
    format!("₪{value}")
}

/// `⭐ 9/10`
pub fn rating(value: u8) -> String {
    format!("⭐ {value}/10")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(input: &str) -> DateTime<Utc> {
        parse_date(input).unwrap()
    }

    #[test]
    fn parses_backend_and_form_dates() {
        assert_eq!(
            at("2025-12-17T12:00:00+00:00"),
            Utc.with_ymd_and_hms(2025, 12, 17, 12, 0, 0).unwrap()
        );
        assert_eq!(
            at("2025-12-17 12:00:00.5+00"),
            Utc.with_ymd_and_hms(2025, 12, 17, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(500)
        );
        assert!(parse_date("2025-12-17 14:30").is_some());
        assert!(parse_date("2025-12-17").is_some());
        assert!(parse_date("").is_none());
        assert!(parse_date("tomorrow").is_none());
    }

    #[test]
    fn unparseable_input_is_echoed() {
        assert_eq!(medium_datetime("sometime"), "sometime");
        assert_eq!(input_value("sometime"), "sometime");
        assert_eq!(storage_value("sometime"), None);
    }

    #[test]
    fn short_date_uses_day_month_year() {
        // Noon UTC lands on the same calendar day in every common zone.
        assert_eq!(short_date("2025-12-17T12:00:00Z"), "17/12/2025");
    }

    #[test]
    fn form_value_round_trips() {
        let stored = storage_value("2025-12-17 14:30").unwrap();
        assert_eq!(input_value(&stored), "2025-12-17 14:30");
    }

    #[test]
    fn relative_times() {
        let now = at("2025-12-17T12:00:00Z");
        let cases = [
            ("2025-12-17T12:00:30Z", "בעתיד"),
            ("2025-12-17T11:59:30Z", "כרגע"),
            ("2025-12-17T11:59:00Z", "לפני 1 דקה"),
            ("2025-12-17T11:55:00Z", "לפני 5 דקות"),
            ("2025-12-17T09:00:00Z", "לפני 3 שעות"),
            ("2025-12-16T11:00:00Z", "אתמול"),
            ("2025-12-14T12:00:00Z", "לפני 3 ימים"),
            ("2025-12-03T12:00:00Z", "לפני 2 שבועות"),
            ("2025-10-17T12:00:00Z", "לפני 2 חודשים"),
            ("2024-12-01T12:00:00Z", "לפני 1 שנה"),
        ];
        for (input, expected) in cases {
            assert_eq!(relative_time_at(input, now), expected, "{input}");
        }
        assert_eq!(relative_time_at("nope", now), "");
    }

    #[test]
    fn today_and_yesterday() {
        let now = Utc::now().to_rfc3339();
        assert!(is_today(&now));
        assert!(!is_yesterday(&now));
        let yesterday = (Local::now() - chrono::Duration::days(1)).to_rfc3339();
        assert!(is_yesterday(&yesterday));
    }

    #[test]
    fn values() {
        assert_eq!(price(12.5), "₪12.5");
        assert_eq!(price(8.0), "₪8");
        assert_eq!(rating(9), "⭐ 9/10");
    }
}
