use serde_json::Value;

use super::error::FilterError;
use super::schema::Schema;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"-price,ratingsAverage"`, `"price desc, name"`,
    /// `["-price", "name asc"]` or `{ "price": "desc" }`.
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        match order {
            Value::String(s) => Ok(Self::parse_order_string(s)),
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)),
                        other => return Err(FilterError::InvalidWhereClause(format!("invalid sort entry: {}", other))),
                    }
                }
                Ok(out)
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (k, v) in obj {
                    let desc = match v {
                        Value::String(s) => s.eq_ignore_ascii_case("desc") || s == "-1",
                        Value::Number(n) => n.as_i64() == Some(-1),
                        _ => false,
                    };
                    let sort = if desc { SortDirection::Desc } else { SortDirection::Asc };
                    out.push(FilterOrderInfo { column: k.clone(), sort });
                }
                Ok(out)
            }
            Value::Null => Ok(vec![]),
            _ => Err(FilterError::InvalidWhereClause("sort must be a string, array or object".to_string())),
        }
    }

    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let mut it = part.split_whitespace();
            let Some(token) = it.next() else { continue };
            let (column, mut sort) = match token.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (token, SortDirection::Asc),
            };
            if let Some(dir) = it.next() {
                sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
            }
            if !column.is_empty() {
                out.push(FilterOrderInfo { column: column.to_string(), sort });
            }
        }
        out
    }

    /// Render `ORDER BY`, resolving API names to columns. Unknown fields are
    /// skipped. The primary key is appended as a final tiebreaker so paging
    /// over equal sort values stays deterministic.
    pub fn generate(schema: &Schema, infos: &[FilterOrderInfo]) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut has_primary_key = false;
        for info in infos {
            let Some(field) = schema.field(&info.column) else {
                tracing::debug!("Ignoring sort on unknown field '{}' of {}", info.column, schema.table);
                continue;
            };
            has_primary_key |= field.column == schema.primary_key;
            parts.push(format!("\"{}\" {}", field.column, info.sort.to_sql()));
        }
        if !has_primary_key {
            parts.push(format!("\"{}\" ASC", schema.primary_key));
        }
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::schema::{FieldKind, FieldSpec};
    use serde_json::json;

    static FIELDS: [FieldSpec; 3] = [
        FieldSpec::new("id", "id", FieldKind::Uuid),
        FieldSpec::new("price", "price", FieldKind::Float),
        FieldSpec::new("ratingsAverage", "ratings_average", FieldKind::Float),
    ];

    static SCHEMA: Schema = Schema { table: "tours", primary_key: "id", fields: &FIELDS };

    #[test]
    fn parses_dash_prefixed_sort_strings() {
        let infos = FilterOrder::validate_and_parse(&json!("-ratingsAverage,price")).unwrap();
        assert_eq!(
            infos,
            vec![
                FilterOrderInfo { column: "ratingsAverage".into(), sort: SortDirection::Desc },
                FilterOrderInfo { column: "price".into(), sort: SortDirection::Asc },
            ]
        );
    }

    #[test]
    fn parses_explicit_direction_words() {
        let infos = FilterOrder::validate_and_parse(&json!(["price desc", " ratingsAverage "])).unwrap();
        assert_eq!(infos[0].sort, SortDirection::Desc);
        assert_eq!(infos[1].sort, SortDirection::Asc);
    }

    #[test]
    fn generates_order_by_with_tiebreaker() {
        let infos = FilterOrder::validate_and_parse(&json!("-ratingsAverage,price,bogus")).unwrap();
        assert_eq!(
            FilterOrder::generate(&SCHEMA, &infos),
            "ORDER BY \"ratings_average\" DESC, \"price\" ASC, \"id\" ASC"
        );
    }

    #[test]
    fn explicit_primary_key_sort_is_not_duplicated() {
        let infos = FilterOrder::validate_and_parse(&json!("-id")).unwrap();
        assert_eq!(FilterOrder::generate(&SCHEMA, &infos), "ORDER BY \"id\" DESC");
    }
}
