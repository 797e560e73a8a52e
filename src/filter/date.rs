use chrono::NaiveDate;
use serde_json::{json, Value};

use super::FilterVariant;

const DATE_FORMAT: &str = "%Y-%m-%d";
const BACKEND_DATE_FORMAT: &str = "yyyy-MM-dd";

/// An inclusive date range. Missing bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(min: NaiveDate, max: NaiveDate) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, date)
    }
}

/// Date filter. Default data spans the field's configured extent.
///
/// Encoded as `"{min}:{max}"` with ISO dates; a single date is accepted as
/// `min = max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFilter {
    lower: NaiveDate,
    upper: NaiveDate,
}

impl DateFilter {
    pub fn new(lower: NaiveDate, upper: NaiveDate) -> Self {
        Self { lower, upper }
    }

    pub fn lower(&self) -> NaiveDate {
        self.lower
    }

    pub fn upper(&self) -> NaiveDate {
        self.upper
    }
}

fn format_bound(bound: Option<NaiveDate>) -> String {
    bound
        .map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// `Ok(None)` for an empty bound, `Err` for an unparseable one.
fn parse_bound(raw: &str) -> Result<Option<NaiveDate>, chrono::ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    // Timestamps select their calendar day.
    let day = raw.split_once('T').map(|(day, _)| day).unwrap_or(raw);
    NaiveDate::parse_from_str(day, DATE_FORMAT).map(Some)
}

impl FilterVariant for DateFilter {
    type Data = DateRange;

    fn default_data(&self) -> DateRange {
        DateRange::new(self.lower, self.upper)
    }

    fn normalize(&self, data: DateRange) -> DateRange {
        if data.min.is_none() && data.max.is_none() {
            return self.default_data();
        }
        data
    }

    fn data_to_string(&self, data: &DateRange) -> String {
        format!("{}:{}", format_bound(data.min), format_bound(data.max))
    }

    fn data_from_string(&self, value: &str) -> DateRange {
        let (min, max) = value.split_once(':').unwrap_or((value, value));
        match (parse_bound(min), parse_bound(max)) {
            (Ok(None), Ok(None)) => self.default_data(),
            (Ok(min), Ok(max)) => DateRange { min, max },
            _ => {
                tracing::warn!(value = %value, "malformed date filter parameter");
                self.default_data()
            }
        }
    }

    fn data_from_value(&self, value: &Value) -> Option<DateRange> {
        let raw = value.as_str()?;
        match parse_bound(raw) {
            Ok(Some(date)) => Some(DateRange::single(date)),
            _ => None,
        }
    }

    fn to_backend_clause(&self, field: &str, data: &DateRange) -> Value {
        let mut bounds = serde_json::Map::new();
        if let Some(min) = data.min {
            bounds.insert("gte".into(), json!(min.format(DATE_FORMAT).to_string()));
        }
        if let Some(max) = data.max {
            bounds.insert("lte".into(), json!(max.format(DATE_FORMAT).to_string()));
        }
        bounds.insert("format".into(), json!(BACKEND_DATE_FORMAT));
        json!({ "range": { field: bounds } })
    }

    fn data_from_backend_clause(&self, field: &str, clause: &Value) -> Option<DateRange> {
        let bounds = clause.get("range")?.get(field)?;
        let bound = |name: &str| -> Option<Option<NaiveDate>> {
            match bounds.get(name) {
                None => Some(None),
                Some(value) => parse_bound(value.as_str()?).ok(),
            }
        };
        let range = DateRange {
            min: bound("gte")?,
            max: bound("lte")?,
        };
        (range.min.is_some() || range.max.is_some()).then_some(range)
    }
}
