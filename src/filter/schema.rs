use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::error::FilterError;
use super::types::SqlParam;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Uuid,
    TextArray,
    TimestampArray,
}

impl FieldKind {
    pub fn is_array(&self) -> bool {
        matches!(self, FieldKind::TextArray | FieldKind::TimestampArray)
    }

    /// Scalar kind of a single element (identity for scalar kinds)
    pub fn element(&self) -> FieldKind {
        match self {
            FieldKind::TextArray => FieldKind::Text,
            FieldKind::TimestampArray => FieldKind::Timestamp,
            other => *other,
        }
    }
}

/// One field as exposed over the API and stored in Postgres
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Name on the wire (camelCase)
    pub name: &'static str,
    /// Column name in the table
    pub column: &'static str,
    pub kind: FieldKind,
    /// Omitted from responses unless explicitly selected
    pub hidden: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind, hidden: false }
    }

    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Field registry for a resource. Filter, sort and projection keys are
/// resolved through it; anything it does not know is dropped.
#[derive(Debug)]
pub struct Schema {
    pub table: &'static str,
    pub primary_key: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Look up by API name, falling back to the column name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.column == name))
    }

    pub fn hidden_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.hidden)
    }
}

/// Coerce a JSON value (usually a query-string literal) into a typed parameter
pub fn coerce(field: &FieldSpec, value: &Value) -> Result<SqlParam, FilterError> {
    let invalid = || FilterError::InvalidValue {
        field: field.name.to_string(),
        value: match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };

    if value.is_null() {
        return Ok(SqlParam::Null);
    }

    match field.kind.element() {
        FieldKind::Text => match value {
            Value::String(s) => Ok(SqlParam::Text(s.clone())),
            Value::Number(n) => Ok(SqlParam::Text(n.to_string())),
            Value::Bool(b) => Ok(SqlParam::Text(b.to_string())),
            _ => Err(invalid()),
        },
        FieldKind::Integer | FieldKind::Float => {
            let parsed = match value {
                Value::Number(n) => n.as_i64().map(SqlParam::Int).or_else(|| n.as_f64().map(SqlParam::Float)),
                Value::String(s) => parse_number(s.trim()),
                _ => None,
            };
            match (field.kind.element(), parsed) {
                (FieldKind::Float, Some(SqlParam::Int(i))) => Ok(SqlParam::Float(i as f64)),
                (_, Some(p)) => Ok(p),
                (_, None) => Err(invalid()),
            }
        }
        FieldKind::Boolean => match value {
            Value::Bool(b) => Ok(SqlParam::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(SqlParam::Bool(true)),
                "false" | "0" => Ok(SqlParam::Bool(false)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        },
        FieldKind::Timestamp => match value {
            Value::String(s) => parse_timestamp(s.trim()).map(SqlParam::Timestamp).ok_or_else(invalid),
            Value::Number(n) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .map(SqlParam::Timestamp)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        },
        FieldKind::Uuid => match value {
            Value::String(s) => Uuid::parse_str(s.trim()).map(SqlParam::Uuid).map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        FieldKind::TextArray | FieldKind::TimestampArray => Err(invalid()),
    }
}

fn parse_number(s: &str) -> Option<SqlParam> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(SqlParam::Int(i));
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite()).map(SqlParam::Float)
}

/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM[:SS]` or
/// `YYYY-MM-DD,HH:MM` date-times, and plain `YYYY-MM-DD` dates (midnight).
/// Naive values are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d,%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PRICE: FieldSpec = FieldSpec::new("price", "price", FieldKind::Float);
    const DURATION: FieldSpec = FieldSpec::new("duration", "duration", FieldKind::Integer);
    const SECRET: FieldSpec = FieldSpec::new("secretTour", "secret_tour", FieldKind::Boolean);
    const STARTS: FieldSpec = FieldSpec::new("startDates", "start_dates", FieldKind::TimestampArray);

    #[test]
    fn coerces_numeric_strings() {
        assert_eq!(coerce(&DURATION, &json!("5")).unwrap(), SqlParam::Int(5));
        assert_eq!(coerce(&DURATION, &json!("5.5")).unwrap(), SqlParam::Float(5.5));
        assert_eq!(coerce(&PRICE, &json!("500")).unwrap(), SqlParam::Float(500.0));
        assert_eq!(coerce(&PRICE, &json!(397)).unwrap(), SqlParam::Float(397.0));
    }

    #[test]
    fn rejects_non_numeric_values_as_cast_errors() {
        let err = coerce(&DURATION, &json!("five")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid duration: five");
    }

    #[test]
    fn coerces_booleans_and_dates() {
        assert_eq!(coerce(&SECRET, &json!("true")).unwrap(), SqlParam::Bool(true));
        assert!(coerce(&SECRET, &json!("yes")).is_err());

        match coerce(&STARTS, &json!("2021-06-19")).unwrap() {
            SqlParam::Timestamp(ts) => assert_eq!(ts.to_rfc3339(), "2021-06-19T00:00:00+00:00"),
            other => panic!("unexpected param: {:?}", other),
        }
        assert!(coerce(&STARTS, &json!("June")).is_err());

        let ts = parse_timestamp("2021-04-25,10:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2021-04-25T10:00:00+00:00");
    }

    #[test]
    fn null_passes_through() {
        assert_eq!(coerce(&PRICE, &Value::Null).unwrap(), SqlParam::Null);
    }
}
