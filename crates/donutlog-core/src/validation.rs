//! Client-side input checks, run before anything is sent to the backend.
//!
//! Each check returns `Err(Error::Validation)` carrying the field key and a
//! Hebrew message. [`validate_entry`] collects every failing field at once.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::{Error, Result};
use crate::format;
use crate::join_code;
use crate::models::{EntryDraft, Visibility};

pub const PASSWORD_MIN_LENGTH: usize = 6;
pub const PLACE_NAME_MAX_LENGTH: usize = 100;
pub const DONUT_NAME_MAX_LENGTH: usize = 100;
pub const NOTES_MAX_LENGTH: usize = 500;
pub const GROUP_NAME_MAX_LENGTH: usize = 50;
pub const RATING_MIN: u8 = 1;
pub const RATING_MAX: u8 = 10;
pub const PRICE_MAX: f64 = 1000.0;
const SANITIZED_MAX_LENGTH: usize = 1000;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
static HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.+").expect("valid url pattern"));
static SCRIPT_PROTOCOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid protocol pattern"));

/// Field key -> message, ordered for stable display.
pub type FieldErrors = BTreeMap<&'static str, String>;

pub fn email(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation("email", "נא להזין כתובת אימייל"));
    }
    if !EMAIL.is_match(value.trim()) {
        return Err(Error::validation("email", "כתובת האימייל אינה תקינה"));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation("password", "נא להזין סיסמה"));
    }
    if value.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(Error::validation(
            "password",
            format!("הסיסמה חייבת להכיל לפחות {PASSWORD_MIN_LENGTH} תווים"),
        ));
    }
    Ok(())
}

pub fn join_code(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation("join_code", "נא להזין קוד הצטרפות"));
    }
    if !join_code::is_valid(value) {
        return Err(Error::validation(
            "join_code",
            "קוד ההצטרפות חייב להכיל 6 תווים (אותיות ומספרים באנגלית)",
        ));
    }
    Ok(())
}

/// Non-empty after trimming.
pub fn required(value: &str, key: &str, label: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(key, format!("{label} הוא שדה חובה")));
    }
    Ok(())
}

/// Trimmed length within `min..=max` characters.
pub fn length(value: &str, min: usize, max: usize, key: &str, label: &str) -> Result<()> {
    let len = value.trim().chars().count();
    if len < min {
        if len == 0 {
            return Err(Error::validation(key, format!("{label} הוא שדה חובה")));
        }
        return Err(Error::validation(
            key,
            format!("{label} חייב להכיל לפחות {min} תווים"),
        ));
    }
    if len > max {
        return Err(Error::validation(
            key,
            format!("{label} חייב להכיל עד {max} תווים"),
        ));
    }
    Ok(())
}

pub fn in_range(value: f64, min: f64, max: f64, key: &str, label: &str) -> Result<()> {
    if value.is_nan() {
        return Err(Error::validation(key, format!("{label} חייב להיות מספר")));
    }
    if value < min || value > max {
        return Err(Error::validation(
            key,
            format!("{label} חייב להיות בין {min} ל-{max}"),
        ));
    }
    Ok(())
}

pub fn rating(value: u8) -> Result<()> {
    in_range(
        f64::from(value),
        f64::from(RATING_MIN),
        f64::from(RATING_MAX),
        "rating",
        "דירוג",
    )
}

/// Parse a typed rating.
pub fn parse_rating(input: &str) -> Result<u8> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::validation("rating", "דירוג הוא שדה חובה"));
    }
    let value: u8 = input
        .parse()
        .map_err(|_| Error::validation("rating", "דירוג חייב להיות מספר שלם בין 1 ל-10"))?;
    rating(value)?;
    Ok(value)
}

/// Parse a typed price; blank means no price.
pub fn parse_price(input: &str) -> Result<Option<f64>> {
    let input = input.trim().trim_start_matches('₪').trim();
    if input.is_empty() {
        return Ok(None);
    }
    let value: f64 = input
        .parse()
        .map_err(|_| Error::validation("price", "מחיר חייב להיות מספר"))?;
    in_range(value, 0.0, PRICE_MAX, "price", "מחיר")?;
    Ok(Some(value))
}

pub fn group_name(value: &str) -> Result<()> {
    length(value, 1, GROUP_NAME_MAX_LENGTH, "name", "שם המשפחה")
}

pub fn url(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation("url", "נא להזין כתובת URL"));
    }
    if !HTTP_URL.is_match(value.trim()) {
        return Err(Error::validation("url", "כתובת ה-URL אינה תקינה"));
    }
    Ok(())
}

/// The tasting cannot be dated after `now`.
pub fn not_future_date(value: &str, now: DateTime<Utc>) -> Result<()> {
    match format::parse_date(value) {
        Some(date) if date > now => Err(Error::validation("date", "התאריך לא יכול להיות בעתיד")),
        Some(_) => Ok(()),
        None => Err(Error::validation("date", "התאריך אינו תקין")),
    }
}

/// Strip angle brackets and `javascript:`, trim, and cap the length.
pub fn sanitize(value: &str) -> String {
    let stripped: String = value.trim().chars().filter(|c| *c != '<' && *c != '>').collect();
    SCRIPT_PROTOCOL
        .replace_all(&stripped, "")
        .chars()
        .take(SANITIZED_MAX_LENGTH)
        .collect()
}

/// Check every field of an entry form.
pub fn validate_entry(draft: &EntryDraft) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let mut record = |key: &'static str, result: Result<()>| {
        if let Err(err) = result {
            errors.entry(key).or_insert_with(|| err.user_message());
        }
    };

    record(
        "place_name",
        length(&draft.place_name, 1, PLACE_NAME_MAX_LENGTH, "place_name", "שם המקום"),
    );
    record(
        "donut_name",
        length(&draft.donut_name, 1, DONUT_NAME_MAX_LENGTH, "donut_name", "שם הסופגנייה"),
    );
    record("rating", rating(draft.rating));

    if let Some(notes) = &draft.notes {
        record("notes", length(notes, 0, NOTES_MAX_LENGTH, "notes", "הערות"));
    }
    if let Some(price) = draft.price {
        record("price", in_range(price, 0.0, PRICE_MAX, "price", "מחיר"));
    }
    if let Some(photo_url) = &draft.photo_url {
        record("photo_url", url(photo_url));
    }
    if format::parse_date(&draft.date).is_none() {
        record("date", Err(Error::validation("date", "התאריך אינו תקין")));
    }
    if draft.visibility == Visibility::Group && draft.group_id.is_none() {
        record(
            "visibility",
            Err(Error::validation(
                "visibility",
                "כדי לשתף צריך קודם להצטרף למשפחה",
            )),
        );
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_draft() -> EntryDraft {
        EntryDraft {
            place_name: "רולדין".into(),
            donut_name: "פיסטוק".into(),
            rating: 9,
            ..EntryDraft::default()
        }
    }

    #[test]
    fn checks_email_and_password() {
        assert!(email("noa@example.com").is_ok());
        assert!(email("  ").is_err());
        assert_eq!(
            email("noa@example").unwrap_err().user_message(),
            "כתובת האימייל אינה תקינה"
        );
        assert!(password("123456").is_ok());
        assert_eq!(password("12345").unwrap_err().field(), Some("password"));
    }

    #[test]
    fn checks_join_code_format() {
        assert!(join_code("abc234").is_ok());
        assert!(join_code("").is_err());
        assert!(join_code("AB2").is_err());
    }

    #[test]
    fn parses_rating_and_price() {
        assert_eq!(parse_rating(" 7 ").unwrap(), 7);
        assert!(parse_rating("0").is_err());
        assert!(parse_rating("11").is_err());
        assert!(parse_rating("seven").is_err());

        assert_eq!(parse_price("").unwrap(), None);
        assert_eq!(parse_price("₪12.5").unwrap(), Some(12.5));
        assert!(parse_price("-1").is_err());
        assert!(parse_price("1001").is_err());
    }

    #[test]
    fn length_messages() {
        assert_eq!(
            length("", 1, 5, "name", "שם").unwrap_err().user_message(),
            "שם הוא שדה חובה"
        );
        assert_eq!(
            length("abcdef", 1, 5, "name", "שם").unwrap_err().user_message(),
            "שם חייב להכיל עד 5 תווים"
        );
        assert!(group_name("משפחת לוי").is_ok());
        assert!(group_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn valid_entry_has_no_errors() {
        assert!(validate_entry(&valid_draft()).is_empty());
    }

    #[test]
    fn reports_every_failing_field() {
        let draft = EntryDraft {
            place_name: " ".into(),
            donut_name: String::new(),
            rating: 0,
            notes: Some("x".repeat(501)),
            price: Some(2000.0),
            photo_url: Some("ftp://x".into()),
            visibility: Visibility::Group,
            group_id: None,
            date: "yesterday-ish".into(),
            ..EntryDraft::default()
        };
        let errors = validate_entry(&draft);
        let keys: Vec<_> = errors.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                "date",
                "donut_name",
                "notes",
                "photo_url",
                "place_name",
                "price",
                "rating",
                "visibility"
            ]
        );
        assert_eq!(errors["place_name"], "שם המקום הוא שדה חובה");
    }

    #[test]
    fn future_dates_are_rejected() {
        let now = Utc::now();
        let tomorrow = (now + chrono::Duration::days(1)).to_rfc3339();
        assert!(not_future_date(&tomorrow, now).is_err());
        assert!(not_future_date("2024-12-25", now).is_ok());
        assert!(not_future_date("garbage", now).is_err());
    }

    #[test]
    fn sanitizes_markup() {
        assert_eq!(sanitize("  <b>hi</b> "), "bhi/b");
        assert_eq!(sanitize("JavaScript:alert(1)"), "alert(1)");
        assert_eq!(sanitize(&"a".repeat(1200)).len(), 1000);
    }
}
