use serde_json::{Map, Value};

use super::error::FilterError;
use super::schema::{coerce, FieldSpec, Schema};
use super::types::{FilterOp, SqlParam};

/// Translates Mongo-style condition objects into a parameterised SQL
/// predicate. Parameters are numbered `$1..$n` in the order they are bound.
pub struct FilterWhere<'s> {
    schema: &'s Schema,
    param_values: Vec<SqlParam>,
}

impl<'s> FilterWhere<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            param_values: vec![],
        }
    }

    /// Build the predicate for `scope AND where_data`. Returns an empty
    /// string when there is nothing to filter on.
    pub fn generate(
        schema: &'s Schema,
        scope: Option<&Value>,
        where_data: Option<&Value>,
    ) -> Result<(String, Vec<SqlParam>), FilterError> {
        let mut filter_where = Self::new(schema);
        let mut conditions = vec![];
        for data in [scope, where_data].into_iter().flatten() {
            conditions.extend(filter_where.parse_where_data(data)?);
        }
        Ok((conditions.join(" AND "), filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("filter must be an object".to_string())),
        }
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<Vec<String>, FilterError> {
        match where_data {
            Value::Null => Ok(vec![]),
            Value::Object(obj) => self.parse_object(obj),
            _ => Err(FilterError::InvalidWhereClause("Unsupported filter format".to_string())),
        }
    }

    fn parse_object(&mut self, obj: &Map<String, Value>) -> Result<Vec<String>, FilterError> {
        let mut conditions = vec![];
        for (key, value) in obj {
            if key.starts_with('$') {
                conditions.push(self.parse_logical_operator(key, value)?);
            } else {
                conditions.extend(self.parse_field_condition(key, value)?);
            }
        }
        Ok(conditions)
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires a non-empty array", op)))?;
                let mut sql_parts = Vec::new();
                for v in arr {
                    let sub = self.parse_where_data(v)?;
                    sql_parts.push(if sub.is_empty() { "TRUE".to_string() } else { format!("({})", sub.join(" AND ")) });
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            "$not" => {
                let sub = self.parse_where_data(value)?;
                if sub.is_empty() {
                    return Err(FilterError::InvalidOperatorData("$not requires a condition".to_string()));
                }
                Ok(format!("NOT ({})", sub.join(" AND ")))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(&mut self, name: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        let field = match self.schema.field(name) {
            Some(field) => *field,
            None => {
                tracing::debug!("Ignoring filter on unknown field '{}' of {}", name, self.schema.table);
                return Ok(vec![]);
            }
        };

        match value {
            Value::Object(obj) => {
                let mut out = vec![];
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    out.push(self.build_sql_condition(&field, operator, op_val)?);
                }
                Ok(out)
            }
            // Implicit equality: { field: value }
            _ => Ok(vec![self.build_sql_condition(&field, FilterOp::Eq, value)?]),
        }
    }

    fn build_sql_condition(&mut self, field: &FieldSpec, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        let column = format!("\"{}\"", field.column);
        if field.kind.is_array() {
            return self.build_array_condition(field, &column, operator, data);
        }

        match operator {
            FilterOp::Eq => {
                if data.is_null() { return Ok(format!("{} IS NULL", column)); }
                Ok(format!("{} = {}", column, self.param(field, data)?))
            }
            FilterOp::Ne => {
                if data.is_null() { return Ok(format!("{} IS NOT NULL", column)); }
                Ok(format!("{} IS DISTINCT FROM {}", column, self.param(field, data)?))
            }
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                Ok(format!("{} {} {}", column, operator.to_sql(), self.non_null_param(field, operator, data)?))
            }
            FilterOp::In | FilterOp::NIn => {
                let values = Self::list(operator, data)?;
                if values.is_empty() {
                    return Ok(if operator == FilterOp::In { "FALSE" } else { "TRUE" }.to_string());
                }
                let params = values.iter().map(|v| self.param(field, v)).collect::<Result<Vec<_>, _>>()?;
                if operator == FilterOp::In {
                    Ok(format!("{} IN ({})", column, params.join(", ")))
                } else {
                    Ok(format!("({} IS NULL OR {} NOT IN ({}))", column, column, params.join(", ")))
                }
            }
            FilterOp::Between => {
                let (low, high) = Self::bounds(data)?;
                let low = self.non_null_param(field, operator, low)?;
                let high = self.non_null_param(field, operator, high)?;
                Ok(format!("{} BETWEEN {} AND {}", column, low, high))
            }
        }
    }

    /// Array columns match when any element satisfies the comparison
    fn build_array_condition(&mut self, field: &FieldSpec, column: &str, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        match operator {
            FilterOp::Eq if data.is_null() => Ok(format!("{} IS NULL", column)),
            FilterOp::Ne if data.is_null() => Ok(format!("{} IS NOT NULL", column)),
            FilterOp::Eq => Ok(format!("{} = ANY({})", self.param(field, data)?, column)),
            FilterOp::Ne => Ok(format!("NOT ({} = ANY({}))", self.param(field, data)?, column)),
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => Ok(format!(
                "{} {} ANY({})",
                self.non_null_param(field, operator, data)?,
                operator.flipped().to_sql(),
                column
            )),
            FilterOp::In | FilterOp::NIn => {
                let values = Self::list(operator, data)?;
                if values.is_empty() {
                    return Ok(if operator == FilterOp::In { "FALSE" } else { "TRUE" }.to_string());
                }
                let params = values.iter().map(|v| self.param(field, v)).collect::<Result<Vec<_>, _>>()?;
                let overlap = format!("{} && ARRAY[{}]", column, params.join(", "));
                Ok(if operator == FilterOp::In { overlap } else { format!("NOT ({})", overlap) })
            }
            FilterOp::Between => {
                let (low, high) = Self::bounds(data)?;
                let low = self.non_null_param(field, operator, low)?;
                let high = self.non_null_param(field, operator, high)?;
                Ok(format!(
                    "EXISTS (SELECT 1 FROM unnest({}) AS elem WHERE elem BETWEEN {} AND {})",
                    column, low, high
                ))
            }
        }
    }

    fn list(operator: FilterOp, data: &Value) -> Result<Vec<Value>, FilterError> {
        match data {
            Value::Array(values) => Ok(values.clone()),
            // Query strings carry lists as "a,b,c"
            Value::String(s) => Ok(s.split(',').map(|p| Value::String(p.trim().to_string())).collect()),
            _ => Err(FilterError::InvalidOperatorData(format!("{:?} requires an array", operator))),
        }
    }

    fn bounds(data: &Value) -> Result<(&Value, &Value), FilterError> {
        match data {
            Value::Array(values) if values.len() == 2 => Ok((&values[0], &values[1])),
            _ => Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())),
        }
    }

    fn non_null_param(&mut self, field: &FieldSpec, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        if data.is_null() {
            return Err(FilterError::InvalidOperatorData(format!(
                "{:?} on '{}' requires a value",
                operator, field.name
            )));
        }
        self.param(field, data)
    }

    fn param(&mut self, field: &FieldSpec, value: &Value) -> Result<String, FilterError> {
        self.param_values.push(coerce(field, value)?);
        Ok(format!("${}", self.param_values.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::schema::{FieldKind, FieldSpec};
    use serde_json::json;

    static FIELDS: [FieldSpec; 5] = [
        FieldSpec::new("name", "name", FieldKind::Text),
        FieldSpec::new("price", "price", FieldKind::Float),
        FieldSpec::new("duration", "duration", FieldKind::Integer),
        FieldSpec::new("secretTour", "secret_tour", FieldKind::Boolean),
        FieldSpec::new("startDates", "start_dates", FieldKind::TimestampArray),
    ];

    static SCHEMA: Schema = Schema {
        table: "tours",
        primary_key: "id",
        fields: &FIELDS,
    };

    fn gen(where_data: Value) -> (String, Vec<SqlParam>) {
        FilterWhere::generate(&SCHEMA, None, Some(&where_data)).unwrap()
    }

    #[test]
    fn empty_filter_produces_no_predicate() {
        let (sql, params) = gen(json!({}));
        assert_eq!(sql, "");
        assert!(params.is_empty());
    }

    #[test]
    fn comparison_operators_map_to_sql_with_typed_params() {
        let (sql, params) = gen(json!({ "duration": { "$gte": "5" }, "price": { "$lt": "1500" } }));
        assert_eq!(sql, "\"duration\" >= $1 AND \"price\" < $2");
        assert_eq!(params, vec![SqlParam::Int(5), SqlParam::Float(1500.0)]);
    }

    #[test]
    fn camel_case_names_resolve_to_columns() {
        let (sql, params) = gen(json!({ "secretTour": { "$ne": true } }));
        assert_eq!(sql, "\"secret_tour\" IS DISTINCT FROM $1");
        assert_eq!(params, vec![SqlParam::Bool(true)]);
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let (sql, params) = gen(json!({ "nope": "x", "name": "The Forest Hiker" }));
        assert_eq!(sql, "\"name\" = $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn unknown_operator_keyword_is_rejected() {
        let err = FilterWhere::generate(&SCHEMA, None, Some(&json!({ "duration": { "foo": "5" } }))).unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedOperator(ref op) if op == "foo"));
    }

    #[test]
    fn scope_is_anded_before_user_conditions() {
        let scope = json!({ "secretTour": { "$ne": true } });
        let (sql, params) =
            FilterWhere::generate(&SCHEMA, Some(&scope), Some(&json!({ "price": { "$lte": 500 } }))).unwrap();
        assert_eq!(sql, "\"secret_tour\" IS DISTINCT FROM $1 AND \"price\" <= $2");
        assert_eq!(params, vec![SqlParam::Bool(true), SqlParam::Float(500.0)]);
    }

    #[test]
    fn logical_operators_nest_with_continuous_numbering() {
        let (sql, params) = gen(json!({
            "$or": [ { "price": { "$lt": 300 } }, { "duration": 5, "name": "x" } ]
        }));
        assert_eq!(sql, "((\"price\" < $1) OR (\"duration\" = $2 AND \"name\" = $3))");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn array_columns_compare_any_element() {
        let (sql, _) = gen(json!({ "startDates": { "$gte": "2021-01-01" } }));
        assert_eq!(sql, "$1 <= ANY(\"start_dates\")");
    }

    #[test]
    fn in_accepts_comma_separated_strings() {
        let (sql, params) = gen(json!({ "name": { "$in": "a,b" } }));
        assert_eq!(sql, "\"name\" IN ($1, $2)");
        assert_eq!(params, vec![SqlParam::Text("a".into()), SqlParam::Text("b".into())]);

        let (sql, _) = gen(json!({ "name": { "$in": [] } }));
        assert_eq!(sql, "FALSE");
    }

    #[test]
    fn cast_errors_surface_field_and_value() {
        let err = FilterWhere::generate(&SCHEMA, None, Some(&json!({ "price": { "$gt": "cheap" } }))).unwrap_err();
        assert_eq!(err.to_string(), "Invalid price: cheap");
    }
}
