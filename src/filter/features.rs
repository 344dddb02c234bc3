//! Translation of HTTP query strings into filter, sort, projection and
//! pagination clauses.
//!
//! ```text
//! ?duration[gte]=5&difficulty=easy&sort=-price&fields=name,price&page=2&limit=10
//! ```
//!
//! becomes `{ "duration": { "$gte": "5" }, "difficulty": "easy" }`, a
//! descending sort on price, an include-projection of `name` and `price`, and
//! `LIMIT 10 OFFSET 10`.

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::schema::Schema;
use super::types::{FilterData, FilterOrderInfo, SortDirection};

pub const DEFAULT_EXCLUDED_KEYS: &[&str] = &["page", "sort", "limit", "fields"];

/// Internal document version, hidden unless explicitly selected
pub const VERSION_FIELD: &str = "__v";

/// Bare operator keywords rewritten to their `$`-prefixed form
const COMPARISON_KEYWORDS: &[&str] = &["gt", "gte", "lt", "lte"];

#[derive(Debug, Clone)]
pub struct ApiFeatures {
    excluded_keys: Vec<String>,
    default_sort: String,
    default_limit: i64,
    max_limit: Option<i64>,
}

impl Default for ApiFeatures {
    fn default() -> Self {
        let query = &crate::config::config().query;
        Self {
            excluded_keys: DEFAULT_EXCLUDED_KEYS.iter().map(|k| k.to_string()).collect(),
            default_sort: query.default_sort.clone(),
            default_limit: query.default_limit,
            max_limit: query.max_limit,
        }
    }
}

impl ApiFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_excluded_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default_sort(mut self, field: impl Into<String>) -> Self {
        self.default_sort = field.into();
        self
    }

    pub fn with_limits(mut self, default_limit: i64, max_limit: Option<i64>) -> Self {
        self.default_limit = default_limit;
        self.max_limit = max_limit;
        self
    }

    /// Run all four stages over the raw `(key, value)` query pairs
    pub fn apply(&self, query: &[(String, String)]) -> Result<QueryFeatures, FilterError> {
        let (page, limit) = self.pagination(query);
        Ok(QueryFeatures {
            filter: self.filter(query),
            sort: self.sort(query)?,
            projection: self.projection(query)?,
            page,
            limit,
            skip: (page - 1).saturating_mul(limit),
        })
    }

    pub fn filter(&self, query: &[(String, String)]) -> Map<String, Value> {
        let mut filter = Map::new();
        for (key, value) in query {
            let (field, op) = split_bracket_key(key);
            if self.excluded_keys.iter().any(|k| k == field) {
                continue;
            }
            let value = Value::String(value.clone());
            match op {
                Some(op) => {
                    let op = if COMPARISON_KEYWORDS.contains(&op) { format!("${}", op) } else { op.to_string() };
                    let entry = filter.entry(field.to_string()).or_insert_with(|| Value::Object(Map::new()));
                    if !entry.is_object() {
                        let literal = entry.take();
                        *entry = Value::Object(Map::from_iter([("$eq".to_string(), literal)]));
                    }
                    if let Value::Object(ops) = entry {
                        ops.insert(op, value);
                    }
                }
                None => match filter.get_mut(field) {
                    Some(slot) => merge_literal(slot, value),
                    None => {
                        filter.insert(field.to_string(), value);
                    }
                },
            }
        }
        filter
    }

    pub fn sort(&self, query: &[(String, String)]) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let requested: Vec<&str> = values_of(query, "sort").filter(|s| !s.trim().is_empty()).collect();
        if requested.is_empty() {
            return FilterOrder::validate_and_parse(&Value::String(self.default_sort.clone()));
        }
        FilterOrder::validate_and_parse(&Value::String(requested.join(",")))
    }

    pub fn projection(&self, query: &[(String, String)]) -> Result<Projection, FilterError> {
        let fields: Vec<&str> = values_of(query, "fields")
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();

        if fields.is_empty() {
            return Ok(Projection::Exclude(vec![VERSION_FIELD.to_string()]));
        }

        let excluded = fields.iter().filter(|f| f.starts_with('-')).count();
        if excluded == fields.len() {
            Ok(Projection::Exclude(fields.iter().map(|f| f[1..].to_string()).collect()))
        } else if excluded == 0 {
            Ok(Projection::Include(fields.iter().map(|f| f.to_string()).collect()))
        } else {
            Err(FilterError::InvalidProjection(
                "cannot mix included and excluded fields".to_string(),
            ))
        }
    }

    /// `(page, limit)`; invalid or non-positive values fall back to defaults
    pub fn pagination(&self, query: &[(String, String)]) -> (i64, i64) {
        let page = positive_int(values_of(query, "page").last()).unwrap_or(1);
        let limit = positive_int(values_of(query, "limit").last()).unwrap_or(self.default_limit);
        let limit = match self.max_limit {
            Some(max) if limit > max => max,
            _ => limit,
        };
        (page, limit)
    }
}

/// Output of [`ApiFeatures::apply`]
#[derive(Debug, Clone)]
pub struct QueryFeatures {
    pub filter: Map<String, Value>,
    pub sort: Vec<FilterOrderInfo>,
    pub projection: Projection,
    pub page: i64,
    pub limit: i64,
    pub skip: i64,
}

impl QueryFeatures {
    pub fn to_filter_data(&self) -> FilterData {
        let order = self
            .sort
            .iter()
            .map(|info| match info.sort {
                SortDirection::Asc => Value::String(info.column.clone()),
                SortDirection::Desc => Value::String(format!("-{}", info.column)),
            })
            .collect();

        FilterData {
            where_clause: if self.filter.is_empty() { None } else { Some(Value::Object(self.filter.clone())) },
            order: Some(Value::Array(order)),
            limit: Some(self.limit),
            offset: Some(self.skip),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Apply to one serialized document. `id` always survives an include
    /// projection; fields hidden by the schema only appear when included
    /// by name.
    pub fn apply(&self, schema: &Schema, doc: &mut Map<String, Value>) {
        match self {
            Projection::Include(fields) => {
                doc.retain(|key, _| key == "id" || fields.iter().any(|f| f == key));
            }
            Projection::Exclude(fields) => {
                doc.retain(|key, _| !fields.iter().any(|f| f == key));
                for hidden in schema.hidden_fields() {
                    doc.remove(hidden.name);
                }
            }
        }
    }

    pub fn apply_all(&self, schema: &Schema, docs: Vec<Value>) -> Vec<Value> {
        docs.into_iter()
            .map(|mut doc| {
                if let Value::Object(map) = &mut doc {
                    self.apply(schema, map);
                }
                doc
            })
            .collect()
    }
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Exclude(vec![VERSION_FIELD.to_string()])
    }
}

/// `"duration[gte]"` → `("duration", Some("gte"))`
fn split_bracket_key(key: &str) -> (&str, Option<&str>) {
    if let Some(open) = key.find('[') {
        if let Some(inner) = key[open + 1..].strip_suffix(']') {
            if open > 0 && !inner.contains(['[', ']']) {
                return (&key[..open], Some(inner));
            }
        }
    }
    (key, None)
}

/// Repeated plain keys mean "any of these"
fn merge_literal(slot: &mut Value, value: Value) {
    match slot {
        Value::String(_) => {
            let first = slot.take();
            *slot = Value::Object(Map::from_iter([("$in".to_string(), Value::Array(vec![first, value]))]));
        }
        Value::Object(ops) => {
            if let Some(Value::Array(values)) = ops.get_mut("$in") {
                values.push(value);
            } else if let Some(first) = ops.remove("$eq") {
                ops.insert("$in".to_string(), Value::Array(vec![first, value]));
            } else {
                ops.insert("$eq".to_string(), value);
            }
        }
        other => *other = value,
    }
}

fn values_of<'a>(query: &'a [(String, String)], key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    query.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn positive_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).filter(|n| *n > 0)
}
