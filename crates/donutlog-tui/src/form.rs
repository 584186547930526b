//! The add / edit entry form.

use chrono::Utc;
use donutlog_core::format;
use donutlog_core::validation::{self, FieldErrors};
use donutlog_core::{Entry, EntryDraft, Visibility};

/// A field of the entry form, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Date,
    Place,
    Donut,
    Filling,
    Rating,
    Price,
    Notes,
    PhotoUrl,
    Visibility,
}

impl FormField {
    pub const ALL: [FormField; 9] = [
        Self::Date,
        Self::Place,
        Self::Donut,
        Self::Filling,
        Self::Rating,
        Self::Price,
        Self::Notes,
        Self::PhotoUrl,
        Self::Visibility,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Date => "תאריך",
            Self::Place => "מקום *",
            Self::Donut => "סופגנייה *",
            Self::Filling => "מילוי",
            Self::Rating => "דירוג (1-10) *",
            Self::Price => "מחיר ₪",
            Self::Notes => "הערות",
            Self::PhotoUrl => "קישור לתמונה",
            Self::Visibility => "נראות",
        }
    }

    /// Key of this field in [`FieldErrors`].
    pub fn key(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Place => "place_name",
            Self::Donut => "donut_name",
            Self::Filling => "filling",
            Self::Rating => "rating",
            Self::Price => "price",
            Self::Notes => "notes",
            Self::PhotoUrl => "photo_url",
            Self::Visibility => "visibility",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Text buffers behind the entry form.
#[derive(Debug, Clone)]
pub struct EntryForm {
    pub date: String,
    pub place_name: String,
    pub donut_name: String,
    pub filling: String,
    pub rating: String,
    pub price: String,
    pub notes: String,
    pub photo_url: String,
    pub visibility: Visibility,
    /// Group of the entry being edited, if it already has one.
    pub group_id: Option<String>,
    pub focus: FormField,
    pub errors: FieldErrors,
}

impl Default for EntryForm {
    fn default() -> Self {
        let draft = EntryDraft::default();
        Self {
            date: format::input_value(&draft.date),
            place_name: String::new(),
            donut_name: String::new(),
            filling: String::new(),
            rating: draft.rating.to_string(),
            price: String::new(),
            notes: String::new(),
            photo_url: String::new(),
            visibility: draft.visibility,
            group_id: None,
            focus: FormField::Place,
            errors: FieldErrors::new(),
        }
    }
}

impl EntryForm {
    pub fn from_entry(entry: &Entry) -> Self {
        Self {
            date: format::input_value(&entry.date),
            place_name: entry.place_name.clone(),
            donut_name: entry.donut_name.clone(),
            filling: entry.filling.clone().unwrap_or_default(),
            rating: entry.rating.to_string(),
            price: entry.price.map(|p| p.to_string()).unwrap_or_default(),
            notes: entry.notes.clone().unwrap_or_default(),
            photo_url: entry.photo_url.clone().unwrap_or_default(),
            visibility: entry.visibility,
            group_id: entry.group_id.clone(),
            ..Self::default()
        }
    }

    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Date => &self.date,
            FormField::Place => &self.place_name,
            FormField::Donut => &self.donut_name,
            FormField::Filling => &self.filling,
            FormField::Rating => &self.rating,
            FormField::Price => &self.price,
            FormField::Notes => &self.notes,
            FormField::PhotoUrl => &self.photo_url,
            FormField::Visibility => self.visibility.label(),
        }
    }

    fn focused_buffer(&mut self) -> Option<&mut String> {
        match self.focus {
            FormField::Date => Some(&mut self.date),
            FormField::Place => Some(&mut self.place_name),
            FormField::Donut => Some(&mut self.donut_name),
            FormField::Filling => Some(&mut self.filling),
            FormField::Rating => Some(&mut self.rating),
            FormField::Price => Some(&mut self.price),
            FormField::Notes => Some(&mut self.notes),
            FormField::PhotoUrl => Some(&mut self.photo_url),
            FormField::Visibility => None,
        }
    }

    /// Type into the focused field. On the visibility field a space toggles.
    pub fn insert_char(&mut self, c: char) {
        if self.focus == FormField::Visibility {
            if c == ' ' {
                self.toggle_visibility();
            }
        } else if let Some(buffer) = self.focused_buffer() {
            buffer.push(c);
        }
        self.errors.remove(self.focus.key());
    }

    pub fn backspace(&mut self) {
        if let Some(buffer) = self.focused_buffer() {
            buffer.pop();
        }
    }

    pub fn toggle_visibility(&mut self) {
        self.visibility = self.visibility.toggled();
        self.errors.remove(FormField::Visibility.key());
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    /// Build a draft, or every field error found.
    ///
    /// Shared entries go to the group they already belong to, else to the
    /// active family.
    pub fn to_draft(&self, active_group: Option<&str>) -> Result<EntryDraft, FieldErrors> {
        let mut errors = FieldErrors::new();

        let date = match format::storage_value(&self.date) {
            Some(date) => {
                if let Err(e) = validation::not_future_date(&date, Utc::now()) {
                    errors.insert("date", e.user_message());
                }
                date
            }
            None => {
                errors.insert("date", "התאריך אינו תקין".to_string());
                self.date.clone()
            }
        };
        let rating = validation::parse_rating(&self.rating).unwrap_or_else(|e| {
            errors.insert("rating", e.user_message());
            0
        });
        let price = validation::parse_price(&self.price).unwrap_or_else(|e| {
            errors.insert("price", e.user_message());
            None
        });

        let group_id = match self.visibility {
            Visibility::Group => self
                .group_id
                .clone()
                .or_else(|| active_group.map(str::to_string)),
            Visibility::Private => None,
        };

        let draft = EntryDraft {
            date,
            place_name: self.place_name.trim().to_string(),
            donut_name: self.donut_name.trim().to_string(),
            filling: optional(&self.filling),
            rating,
            price,
            notes: optional(&validation::sanitize(&self.notes)),
            photo_url: optional(&self.photo_url),
            visibility: self.visibility,
            group_id,
        };

        for (key, message) in validation::validate_entry(&draft) {
            errors.entry(key).or_insert(message);
        }

        if errors.is_empty() {
            Ok(draft)
        } else {
            Err(errors)
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
