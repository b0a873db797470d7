//! Local filtering over an in-memory record collection.
//!
//! Criteria are conjunctive. Text criteria are case-insensitive substring
//! tests; date criteria are inclusive whole-day bounds in UTC.

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::model::FieldRecord;

/// Date strings accepted for `date_from` / `date_to`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Filter inputs as the user typed them. `Default` is the reset state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Matched against field, value and location; any one may hit.
    pub search_term: Option<String>,
    pub field: Option<String>,
    pub location: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl FilterCriteria {
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn date_from(mut self, date: impl Into<String>) -> Self {
        self.date_from = Some(date.into());
        self
    }

    pub fn date_to(mut self, date: impl Into<String>) -> Self {
        self.date_to = Some(date.into());
        self
    }

    /// True when no criterion constrains anything.
    pub fn is_empty(&self) -> bool {
        [
            &self.search_term,
            &self.field,
            &self.location,
            &self.date_from,
            &self.date_to,
        ]
        .into_iter()
        .all(|c| normalized(c).is_none())
    }

    /// Parse and normalize the criteria.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFilter`] if a date is not `YYYY-MM-DD`.
    pub fn compile(&self) -> Result<CompiledFilter> {
        let from = normalized(&self.date_from)
            .map(|d| parse_date("date_from", d))
            .transpose()?
            .map(start_of_day);
        // Exclusive upper bound at the next midnight, so the whole end day counts.
        let until = normalized(&self.date_to)
            .map(|d| parse_date("date_to", d))
            .transpose()?
            .map(|d| {
                d.checked_add_days(Days::new(1))
                    .map(start_of_day)
                    .ok_or_else(|| Error::InvalidFilter(format!("date_to out of range: {d}")))
            })
            .transpose()?;

        Ok(CompiledFilter {
            search_term: text_term(&self.search_term),
            field: text_term(&self.field),
            location: text_term(&self.location),
            from,
            until,
        })
    }
}

/// Validated criteria, ready to test records against.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    search_term: Option<String>,
    field: Option<String>,
    location: Option<String>,
    from: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
}

impl CompiledFilter {
    pub fn matches(&self, record: &FieldRecord) -> bool {
        if let Some(term) = &self.search_term {
            let hit = [&record.field, &record.value, &record.location]
                .into_iter()
                .any(|text| contains_folded(text, term));
            if !hit {
                return false;
            }
        }
        if let Some(field) = &self.field {
            if !contains_folded(&record.field, field) {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !contains_folded(&record.location, location) {
                return false;
            }
        }
        if self.from.is_some_and(|from| record.timestamp < from) {
            return false;
        }
        if self.until.is_some_and(|until| record.timestamp >= until) {
            return false;
        }
        true
    }
}

/// Return the records matching `criteria`, in input order.
///
/// Empty input yields an empty result without looking at the criteria;
/// use [`FilterCriteria::compile`] to validate them up front.
pub fn filter(records: &[FieldRecord], criteria: &FilterCriteria) -> Result<Vec<FieldRecord>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let compiled = criteria.compile()?;
    Ok(records
        .iter()
        .filter(|r| compiled.matches(r))
        .cloned()
        .collect())
}

fn normalized(criterion: &Option<String>) -> Option<&str> {
    criterion.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Lowercased text criterion, kept verbatim; blank means unset.
fn text_term(criterion: &Option<String>) -> Option<String> {
    normalized(criterion)?;
    criterion.as_deref().map(str::to_lowercase)
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| Error::InvalidFilter(format!("{name} '{raw}' is not YYYY-MM-DD: {e}")))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// `needle` is already lowercased.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordId, UserId};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn record(field: &str, value: &str, location: &str, at: DateTime<Utc>) -> FieldRecord {
        FieldRecord {
            id: RecordId::new(),
            field: field.to_string(),
            value: value.to_string(),
            location: location.to_string(),
            timestamp: at,
            owner: UserId::new(),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn sample() -> Vec<FieldRecord> {
        vec![
            record("Soil Temperature", "18.5", "North Plot", at(2024, 3, 6, 9, 0, 0)),
            record("Humidity", "55", "Greenhouse 2", at(2024, 3, 5, 14, 30, 0)),
            record("Soil pH", "6.8", "north plot", at(2024, 3, 4, 8, 15, 0)),
            record("Rainfall", "12mm", "Weather station", at(2024, 3, 1, 0, 0, 0)),
        ]
    }

    #[test]
    fn empty_criteria_returns_input_unchanged() {
        let records = sample();
        let out = filter(&records, &FilterCriteria::default()).unwrap();
        assert_eq!(out, records);
    }

    #[test]
    fn whitespace_criteria_count_as_empty() {
        let criteria = FilterCriteria::default().search("   ").date_to("");
        assert!(criteria.is_empty());
        let records = sample();
        assert_eq!(filter(&records, &criteria).unwrap(), records);
    }

    #[test]
    fn surrounding_whitespace_is_part_of_the_term() {
        let records = vec![
            record("Soil pH", "6.8", "Plot A", at(2024, 3, 4, 8, 0, 0)),
            record("pH", "7.0", "Plot B", at(2024, 3, 3, 8, 0, 0)),
        ];
        let out = filter(&records, &FilterCriteria::default().search(" pH")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].field, "Soil pH");

        let out = filter(&records, &FilterCriteria::default().field("pH")).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn search_matches_any_text_attribute_case_insensitively() {
        let records = sample();
        let out = filter(&records, &FilterCriteria::default().search("NORTH")).unwrap();
        let fields: Vec<_> = out.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(fields, vec!["Soil Temperature", "Soil pH"]);

        let out = filter(&records, &FilterCriteria::default().search("12mm")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].field, "Rainfall");
    }

    #[test]
    fn criteria_are_conjunctive() {
        let records = sample();
        let criteria = FilterCriteria::default().field("soil").location("North");
        let out = filter(&records, &criteria).unwrap();
        assert_eq!(out.len(), 2);

        let criteria = criteria.search("ph");
        let out = filter(&records, &criteria).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].field, "Soil pH");
    }

    #[test]
    fn result_is_an_order_preserving_subsequence() {
        let records = sample();
        let out = filter(&records, &FilterCriteria::default().search("o")).unwrap();
        let mut cursor = records.iter();
        for kept in &out {
            assert!(
                cursor.any(|r| r.id == kept.id),
                "record {} out of order or duplicated",
                kept.id
            );
        }
    }

    #[test]
    fn date_to_includes_the_whole_end_day() {
        let records = vec![
            record("Temp", "20", "A", at(2024, 3, 5, 23, 59, 0)),
            record("Temp", "21", "A", at(2024, 3, 6, 0, 0, 1)),
        ];
        let out = filter(&records, &FilterCriteria::default().date_to("2024-03-05")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, "20");
    }

    #[test]
    fn date_from_is_inclusive_from_midnight() {
        let records = sample();
        let criteria = FilterCriteria::default()
            .date_from("2024-03-04")
            .date_to("2024-03-05");
        let out = filter(&records, &criteria).unwrap();
        let fields: Vec<_> = out.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(fields, vec!["Humidity", "Soil pH"]);
    }

    #[test]
    fn malformed_date_is_rejected() {
        let records = sample();
        let err = filter(&records, &FilterCriteria::default().date_from("03/05/2024")).unwrap_err();
        assert!(matches!(err, Error::InvalidFilter(_)));
    }

    #[test]
    fn empty_records_never_error() {
        let criteria = FilterCriteria::default().date_to("not-a-date");
        assert!(filter(&[], &criteria).unwrap().is_empty());
        assert!(criteria.compile().is_err());
    }
}
