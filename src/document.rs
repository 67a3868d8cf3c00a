// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine-side document model.
//!
//! A [`Document`] is what one content item looks like inside the index.
//! Custom-field values fan out into every typed projection that applies
//! (see [`MetaValue::project`]) so one stored field can be queried
//! lexically, numerically or temporally without re-indexing. Calendar
//! units of the canonical date are precomputed into [`DateTerms`].
//!
//! # Example
//!
//! ```
//! use search_sync::document::{Document, TermRef};
//! use chrono::NaiveDate;
//!
//! let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(10, 0, 0).unwrap();
//! let doc = Document::new(42, "post", date)
//!     .with_title("Hello")
//!     .with_meta("price", &["19.99"])
//!     .with_terms("category", vec![TermRef::new(7, "news", "News")]);
//!
//! assert_eq!(doc.date_terms.year, 2024);
//! assert_eq!(doc.meta["price"][0].double, Some(19.99));
//! assert_eq!(doc.meta["price"][0].long, Some(19));
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Engine date format (`Y-m-d H:i:s`).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Author reference stored under `post_author`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: u64,
    #[serde(default)]
    pub login: String,
}

/// One taxonomy term assigned to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRef {
    #[serde(alias = "id")]
    pub term_id: u64,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub parent: u64,
}

impl TermRef {
    pub fn new(term_id: u64, slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            term_id,
            slug: slug.into(),
            name: name.into(),
            parent: 0,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: u64) -> Self {
        self.parent = parent;
        self
    }
}

/// Typed projections of one custom-field value.
///
/// A projection that does not apply is absent, never null: a missing
/// `long` means the value was never indexed as an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaValue {
    pub value: String,
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl MetaValue {
    /// Project a raw stored value into every applicable typed field.
    pub fn project(raw: &str) -> Self {
        let trimmed = raw.trim();
        let mut projected = Self {
            value: raw.to_string(),
            raw: raw.to_string(),
            long: None,
            double: None,
            boolean: None,
            date: None,
            datetime: None,
            time: None,
        };

        if let Ok(n) = trimmed.parse::<i64>() {
            projected.long = Some(n);
            projected.double = Some(n as f64);
        } else if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                projected.long = Some(f.trunc() as i64);
                projected.double = Some(f);
            }
        }

        projected.boolean = match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Some(true),
            "false" | "no" | "off" | "" => Some(false),
            _ => projected.double.map(|d| d != 0.0),
        };

        if let Some(dt) = parse_datetime(trimmed) {
            projected.date = Some(dt.format(DATE_FORMAT).to_string());
            projected.datetime = Some(dt.format(DATETIME_FORMAT).to_string());
            projected.time = Some(dt.format(TIME_FORMAT).to_string());
        } else if let Ok(t) = NaiveTime::parse_from_str(trimmed, TIME_FORMAT) {
            projected.time = Some(t.format(TIME_FORMAT).to_string());
        }

        projected
    }
}

/// Parse the date shapes the content store hands us.
///
/// All-digit strings of 9+ digits are unix seconds; shorter numbers are
/// plain numbers, not dates.
pub fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if s.len() >= 9 && s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, DATETIME_FORMAT) {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Calendar units precomputed from the canonical date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateTerms {
    pub year: i32,
    pub month: u32,
    /// ISO week number
    pub week: u32,
    pub dayofyear: u32,
    pub day: u32,
    /// 0 = Sunday
    pub dayofweek: u32,
    /// 1 = Monday
    pub dayofweek_iso: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// `YYYYMM`
    pub yearmonth: u32,
}

impl DateTerms {
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            week: dt.iso_week().week(),
            dayofyear: dt.ordinal(),
            day: dt.day(),
            dayofweek: dt.weekday().num_days_from_sunday(),
            dayofweek_iso: dt.weekday().number_from_monday(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            yearmonth: (dt.year().max(0) as u32) * 100 + dt.month(),
        }
    }
}

/// The search-engine representation of one content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "post_id")]
    pub id: u64,
    pub post_type: String,
    pub post_status: String,
    #[serde(default)]
    pub post_mime_type: String,
    #[serde(default)]
    pub post_parent: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_author: Option<AuthorRef>,
    #[serde(with = "engine_datetime")]
    pub post_date: NaiveDateTime,
    #[serde(with = "engine_datetime")]
    pub post_date_gmt: NaiveDateTime,
    #[serde(with = "engine_datetime")]
    pub post_modified: NaiveDateTime,
    #[serde(with = "engine_datetime")]
    pub post_modified_gmt: NaiveDateTime,
    #[serde(default)]
    pub post_title: String,
    #[serde(default)]
    pub post_excerpt: String,
    #[serde(default)]
    pub post_content: String,
    #[serde(default)]
    pub post_name: String,
    #[serde(default)]
    pub menu_order: i64,
    #[serde(default)]
    pub terms: BTreeMap<String, Vec<TermRef>>,
    #[serde(default)]
    pub meta: BTreeMap<String, Vec<MetaValue>>,
    #[serde(default)]
    pub date_terms: DateTerms,
}

impl Document {
    /// New published document; all four timestamps start at `date`.
    pub fn new(id: u64, post_type: impl Into<String>, date: NaiveDateTime) -> Self {
        Self {
            id,
            post_type: post_type.into(),
            post_status: "publish".to_string(),
            post_mime_type: String::new(),
            post_parent: 0,
            post_author: None,
            post_date: date,
            post_date_gmt: date,
            post_modified: date,
            post_modified_gmt: date,
            post_title: String::new(),
            post_excerpt: String::new(),
            post_content: String::new(),
            post_name: String::new(),
            menu_order: 0,
            terms: BTreeMap::new(),
            meta: BTreeMap::new(),
            date_terms: DateTerms::from_datetime(&date),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.post_status = status.into();
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.post_title = title.into();
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.post_content = content.into();
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: u64) -> Self {
        self.post_parent = parent;
        self
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.post_mime_type = mime.into();
        self
    }

    /// Attach raw meta values; each one is projected into its typed fields.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, values: &[&str]) -> Self {
        self.meta
            .insert(key.into(), values.iter().map(|v| MetaValue::project(v)).collect());
        self
    }

    #[must_use]
    pub fn with_terms(mut self, taxonomy: impl Into<String>, terms: Vec<TermRef>) -> Self {
        self.terms.insert(taxonomy.into(), terms);
        self
    }

    /// Recompute `date_terms` after `post_date` was changed in place.
    pub fn refresh_date_terms(&mut self) {
        self.date_terms = DateTerms::from_datetime(&self.post_date);
    }

    /// Whether a custom field made it into the prepared document.
    #[must_use]
    pub fn has_meta(&self, key: &str) -> bool {
        self.meta.contains_key(key)
    }
}

mod engine_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.format(super::DATETIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_datetime(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(10, 30, 15).unwrap()
    }

    #[test]
    fn test_project_integer() {
        let v = MetaValue::project("42");
        assert_eq!(v.long, Some(42));
        assert_eq!(v.double, Some(42.0));
        assert_eq!(v.boolean, Some(true));
        assert!(v.date.is_none());
        assert_eq!(v.raw, "42");
    }

    #[test]
    fn test_project_date_string() {
        let v = MetaValue::project("2024-03-05");
        assert_eq!(v.date.as_deref(), Some("2024-03-05"));
        assert_eq!(v.datetime.as_deref(), Some("2024-03-05 00:00:00"));
        assert_eq!(v.value, "2024-03-05");
        assert!(v.long.is_none());
        assert!(v.double.is_none());
    }

    #[test]
    fn test_project_text_and_booleans() {
        let v = MetaValue::project("blue");
        assert!(v.long.is_none());
        assert!(v.boolean.is_none());
        assert!(v.date.is_none());

        assert_eq!(MetaValue::project("yes").boolean, Some(true));
        assert_eq!(MetaValue::project("off").boolean, Some(false));
        assert_eq!(MetaValue::project("0").boolean, Some(false));
    }

    #[test]
    fn test_project_time_only() {
        let v = MetaValue::project("08:15:00");
        assert_eq!(v.time.as_deref(), Some("08:15:00"));
        assert!(v.date.is_none());
    }

    #[test]
    fn test_unix_timestamp_is_date() {
        let v = MetaValue::project("1709632800");
        assert_eq!(v.date.as_deref(), Some("2024-03-05"));
        assert_eq!(v.long, Some(1_709_632_800));
    }

    #[test]
    fn test_absent_projections_not_serialized() {
        let value = serde_json::to_value(MetaValue::project("blue")).unwrap();
        assert!(value.get("long").is_none());
        assert!(value.get("date").is_none());
        assert_eq!(value["raw"], "blue");
    }

    #[test]
    fn test_date_terms() {
        // 2024-03-05 is a Tuesday
        let terms = DateTerms::from_datetime(&at(2024, 3, 5));
        assert_eq!(terms.year, 2024);
        assert_eq!(terms.month, 3);
        assert_eq!(terms.day, 5);
        assert_eq!(terms.dayofyear, 65);
        assert_eq!(terms.dayofweek, 2);
        assert_eq!(terms.dayofweek_iso, 2);
        assert_eq!(terms.week, 10);
        assert_eq!(terms.hour, 10);
        assert_eq!(terms.minute, 30);
        assert_eq!(terms.second, 15);
        assert_eq!(terms.yearmonth, 202403);
    }

    #[test]
    fn test_document_serializes_engine_fields() {
        let doc = Document::new(7, "post", at(2024, 3, 5))
            .with_title("Title")
            .with_terms("category", vec![TermRef::new(3, "news", "News")]);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["post_id"], 7);
        assert_eq!(value["post_date"], "2024-03-05 10:30:15");
        assert_eq!(value["terms"]["category"][0]["term_id"], 3);
        assert_eq!(value["date_terms"]["yearmonth"], 202403);
    }

    #[test]
    fn test_document_roundtrip_accepts_term_id_alias() {
        let value = json!({
            "post_id": 1,
            "post_type": "page",
            "post_status": "publish",
            "post_date": "2024-01-01 00:00:00",
            "post_date_gmt": "2024-01-01 00:00:00",
            "post_modified": "2024-01-02 00:00:00",
            "post_modified_gmt": "2024-01-02 00:00:00",
            "terms": {"tag": [{"id": 9, "slug": "rust", "name": "Rust"}]}
        });
        let doc: Document = serde_json::from_value(value).unwrap();
        assert_eq!(doc.terms["tag"][0].term_id, 9);
        assert_eq!(doc.post_modified, at(2024, 1, 2).date().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_refresh_date_terms() {
        let mut doc = Document::new(1, "post", at(2024, 3, 5));
        doc.post_date = at(2020, 12, 31);
        doc.refresh_date_terms();
        assert_eq!(doc.date_terms.year, 2020);
        assert_eq!(doc.date_terms.dayofyear, 366);
    }
}
