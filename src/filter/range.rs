use serde_json::{json, Value};

use super::FilterVariant;

/// An inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl NumericRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn single(value: f64) -> Self {
        Self::new(value, value)
    }
}

/// Numeric range filter, encoded as `"{min},{max}"`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    lower: f64,
    upper: f64,
}

impl RangeFilter {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|number| number.is_finite())
}

impl FilterVariant for RangeFilter {
    type Data = NumericRange;

    fn default_data(&self) -> NumericRange {
        NumericRange::new(self.lower, self.upper)
    }

    fn normalize(&self, data: NumericRange) -> NumericRange {
        if data.min.is_finite() && data.max.is_finite() {
            return data;
        }
        self.default_data()
    }

    fn data_to_string(&self, data: &NumericRange) -> String {
        format!("{},{}", data.min, data.max)
    }

    fn data_from_string(&self, value: &str) -> NumericRange {
        let (min, max) = value
            .split_once(',')
            .or_else(|| value.split_once(':'))
            .unwrap_or((value, value));
        match (parse_number(min), parse_number(max)) {
            (Some(min), Some(max)) => NumericRange::new(min, max),
            _ => {
                tracing::warn!(value = %value, "malformed range filter parameter");
                self.default_data()
            }
        }
    }

    fn data_from_value(&self, value: &Value) -> Option<NumericRange> {
        let number = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(raw) => parse_number(raw),
            _ => None,
        }?;
        Some(NumericRange::single(number))
    }

    fn to_backend_clause(&self, field: &str, data: &NumericRange) -> Value {
        json!({ "range": { field: { "gte": data.min, "lte": data.max } } })
    }

    fn data_from_backend_clause(&self, field: &str, clause: &Value) -> Option<NumericRange> {
        let bounds = clause.get("range")?.get(field)?;
        if bounds.get("gte").is_none() && bounds.get("lte").is_none() {
            return None;
        }
        let bound = |name: &str, fallback: f64| match bounds.get(name) {
            None => Some(fallback),
            Some(value) => value.as_f64(),
        };
        Some(NumericRange::new(
            bound("gte", self.lower)?,
            bound("lte", self.upper)?,
        ))
    }
}
