use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use super::ValidationError;
use crate::filter::schema::parse_timestamp;
use crate::filter::{FieldKind, FieldSpec, Schema};

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

pub const NAME_MIN_LEN: usize = 10;
pub const NAME_MAX_LEN: usize = 40;
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

static TOUR_FIELDS: [FieldSpec; 18] = [
    FieldSpec::new("id", "id", FieldKind::Uuid),
    FieldSpec::new("name", "name", FieldKind::Text),
    FieldSpec::new("slug", "slug", FieldKind::Text),
    FieldSpec::new("duration", "duration", FieldKind::Integer),
    FieldSpec::new("maxGroupSize", "max_group_size", FieldKind::Integer),
    FieldSpec::new("difficulty", "difficulty", FieldKind::Text),
    FieldSpec::new("ratingsAverage", "ratings_average", FieldKind::Float),
    FieldSpec::new("ratingsQuantity", "ratings_quantity", FieldKind::Integer),
    FieldSpec::new("price", "price", FieldKind::Float),
    FieldSpec::new("priceDiscount", "price_discount", FieldKind::Float),
    FieldSpec::new("summary", "summary", FieldKind::Text),
    FieldSpec::new("description", "description", FieldKind::Text),
    FieldSpec::new("imageCover", "image_cover", FieldKind::Text),
    FieldSpec::new("images", "images", FieldKind::TextArray),
    FieldSpec::new("createdAt", "created_at", FieldKind::Timestamp).hidden(),
    FieldSpec::new("startDates", "start_dates", FieldKind::TimestampArray),
    FieldSpec::new("secretTour", "secret_tour", FieldKind::Boolean),
    FieldSpec::new("__v", "version", FieldKind::Integer),
];

pub static TOUR_SCHEMA: Schema = Schema {
    table: "tours",
    primary_key: "id",
    fields: &TOUR_FIELDS,
};

/// Secret tours never leave the database
pub fn tour_scope() -> Value {
    json!({ "secretTour": { "$ne": true } })
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    #[serde(rename = "__v")]
    pub version: i32,
}

impl Tour {
    pub fn duration_weeks(&self) -> f64 {
        self.duration as f64 / 7.0
    }

    /// Serialized form including the `durationInWeeks` virtual
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        let mut doc = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut doc {
            map.insert("durationInWeeks".to_string(), json!(self.duration_weeks()));
        }
        Ok(doc)
    }

    /// Overlay a partial update on this tour. The result still has to pass
    /// [`TourInput::validate`] as a whole document.
    pub fn merge(&self, patch: TourInput) -> TourInput {
        let current = TourInput::from(self);
        TourInput {
            name: patch.name.or(current.name),
            duration: patch.duration.or(current.duration),
            max_group_size: patch.max_group_size.or(current.max_group_size),
            difficulty: patch.difficulty.or(current.difficulty),
            ratings_average: patch.ratings_average.or(current.ratings_average),
            ratings_quantity: patch.ratings_quantity.or(current.ratings_quantity),
            price: patch.price.or(current.price),
            price_discount: patch.price_discount.or(current.price_discount),
            summary: patch.summary.or(current.summary),
            description: patch.description.or(current.description),
            image_cover: patch.image_cover.or(current.image_cover),
            images: patch.images.or(current.images),
            start_dates: patch.start_dates.or(current.start_dates),
            secret_tour: patch.secret_tour.or(current.secret_tour),
        }
    }
}

/// Tour as accepted from a request body or an import file. Every field is
/// optional here; required fields are enforced by `validate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourInput {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i32>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<String>>,
    pub secret_tour: Option<bool>,
}

impl From<&Tour> for TourInput {
    fn from(tour: &Tour) -> Self {
        Self {
            name: Some(tour.name.clone()),
            duration: Some(tour.duration),
            max_group_size: Some(tour.max_group_size),
            difficulty: Some(tour.difficulty.clone()),
            ratings_average: Some(tour.ratings_average),
            ratings_quantity: Some(tour.ratings_quantity),
            price: Some(tour.price),
            price_discount: tour.price_discount,
            summary: Some(tour.summary.clone()),
            description: tour.description.clone(),
            image_cover: Some(tour.image_cover.clone()),
            images: Some(tour.images.clone()),
            start_dates: Some(tour.start_dates.iter().map(|d| d.to_rfc3339()).collect()),
            secret_tour: Some(tour.secret_tour),
        }
    }
}

/// A validated tour, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct TourRecord {
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
}

impl TourInput {
    pub fn validate(self) -> Result<TourRecord, ValidationError> {
        let mut errors = Vec::new();

        let name = non_empty(self.name);
        match &name {
            None => errors.push("A tour must have a name".to_string()),
            Some(n) if n.chars().count() > NAME_MAX_LEN => {
                errors.push(format!("A tour must have less or equal than {} characters", NAME_MAX_LEN))
            }
            Some(n) if n.chars().count() < NAME_MIN_LEN => {
                errors.push(format!("A tour must have more or equal than {} characters", NAME_MIN_LEN))
            }
            Some(_) => {}
        }

        if self.duration.is_none() {
            errors.push("A tour must have a duration".to_string());
        }
        if self.max_group_size.is_none() {
            errors.push("A tour must have a group size".to_string());
        }

        match self.difficulty.as_deref() {
            None => errors.push("A tour must have a difficulty level".to_string()),
            Some(d) if !DIFFICULTIES.contains(&d) => {
                errors.push("Difficulty should be one of easy, medium, or difficult".to_string())
            }
            Some(_) => {}
        }

        match (self.price, self.price_discount) {
            (None, _) => errors.push("A tour must have a price".to_string()),
            (Some(price), Some(discount)) if discount >= price => {
                errors.push(format!("{} is not a valid discount!", discount))
            }
            _ => {}
        }

        let ratings_average = self.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE);
        if !(1.0..=5.0).contains(&ratings_average) {
            errors.push("Rating should be in between 1.0 and 5.0".to_string());
        }

        let summary = non_empty(self.summary);
        if summary.is_none() {
            errors.push("A tour must have a summary".to_string());
        }

        let image_cover = non_empty(self.image_cover);
        if image_cover.is_none() {
            errors.push("A tour must have an image".to_string());
        }

        let mut start_dates = Vec::new();
        for raw in self.start_dates.unwrap_or_default() {
            match parse_timestamp(raw.trim()) {
                Some(date) => start_dates.push(date),
                None => errors.push(format!("Invalid startDates: {}", raw)),
            }
        }

        ValidationError::check(errors)?;

        let (Some(name), Some(duration), Some(max_group_size), Some(difficulty), Some(price), Some(summary), Some(image_cover)) =
            (name, self.duration, self.max_group_size, self.difficulty, self.price, summary, image_cover)
        else {
            return Err(ValidationError::single("A tour is missing required fields"));
        };

        Ok(TourRecord {
            slug: slugify(&name),
            name,
            duration,
            max_group_size,
            difficulty,
            ratings_average,
            ratings_quantity: self.ratings_quantity.unwrap_or(0),
            price,
            price_discount: self.price_discount,
            summary,
            description: non_empty(self.description),
            image_cover,
            images: self.images.unwrap_or_default(),
            start_dates,
            secret_tour: self.secret_tour.unwrap_or(false),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Lower-case, dash-separated form of a name: `"The Sea Explorer"` → `"the-sea-explorer"`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> TourInput {
        TourInput {
            name: Some("  The Forest Hiker ".into()),
            duration: Some(5),
            max_group_size: Some(25),
            difficulty: Some("easy".into()),
            price: Some(397.0),
            summary: Some("Breathtaking hike through the Canadian Banff National Park".into()),
            image_cover: Some("tour-1-cover.jpg".into()),
            start_dates: Some(vec!["2021-04-25,10:00".into(), "2021-07-20".into()]),
            ..Default::default()
        }
    }

    fn sample_tour() -> Tour {
        let record = valid_input().validate().unwrap();
        Tour {
            id: Uuid::new_v4(),
            name: record.name,
            slug: Some(record.slug),
            duration: record.duration,
            max_group_size: record.max_group_size,
            difficulty: record.difficulty,
            ratings_average: record.ratings_average,
            ratings_quantity: record.ratings_quantity,
            price: record.price,
            price_discount: record.price_discount,
            summary: record.summary,
            description: record.description,
            image_cover: record.image_cover,
            images: record.images,
            created_at: Utc::now(),
            start_dates: record.start_dates,
            secret_tour: record.secret_tour,
            version: 0,
        }
    }

    #[test]
    fn valid_input_gets_defaults_and_slug() {
        let record = valid_input().validate().unwrap();
        assert_eq!(record.name, "The Forest Hiker");
        assert_eq!(record.slug, "the-forest-hiker");
        assert_eq!(record.ratings_average, 4.5);
        assert_eq!(record.ratings_quantity, 0);
        assert!(!record.secret_tour);
        assert_eq!(record.start_dates.len(), 2);
    }

    #[test]
    fn reports_every_missing_required_field() {
        let err = TourInput::default().validate().unwrap_err();
        assert_eq!(
            err.messages,
            vec![
                "A tour must have a name",
                "A tour must have a duration",
                "A tour must have a group size",
                "A tour must have a difficulty level",
                "A tour must have a price",
                "A tour must have a summary",
                "A tour must have an image",
            ]
        );
    }

    #[test]
    fn name_length_counts_trimmed_characters() {
        let short = TourInput { name: Some("  Short  ".into()), ..valid_input() };
        assert_eq!(
            short.validate().unwrap_err().messages,
            vec!["A tour must have more or equal than 10 characters"]
        );

        let long = TourInput { name: Some("x".repeat(41)), ..valid_input() };
        assert_eq!(
            long.validate().unwrap_err().messages,
            vec!["A tour must have less or equal than 40 characters"]
        );
    }

    #[test]
    fn rejects_bad_difficulty_discount_and_rating() {
        let input = TourInput {
            difficulty: Some("extreme".into()),
            price_discount: Some(400.0),
            ratings_average: Some(6.0),
            ..valid_input()
        };
        let err = input.validate().unwrap_err();
        assert_eq!(
            err.messages,
            vec![
                "Difficulty should be one of easy, medium, or difficult",
                "400 is not a valid discount!",
                "Rating should be in between 1.0 and 5.0",
            ]
        );
    }

    #[test]
    fn merged_patch_is_validated_as_a_whole() {
        let tour = sample_tour();

        let cheaper = tour.merge(TourInput { price: Some(100.0), ..Default::default() });
        assert_eq!(cheaper.validate().unwrap().price, 100.0);

        // A discount that only fails against the stored price
        let discounted = tour.merge(TourInput { price_discount: Some(500.0), ..Default::default() });
        assert!(discounted.validate().is_err());

        let renamed = tour.merge(TourInput { name: Some("The Snow Adventurer".into()), ..Default::default() });
        assert_eq!(renamed.validate().unwrap().slug, "the-snow-adventurer");
    }

    #[test]
    fn document_carries_virtual_and_version_fields() {
        let mut tour = sample_tour();
        tour.duration = 14;
        let doc = tour.to_document().unwrap();
        assert_eq!(doc["durationInWeeks"], json!(2.0));
        assert_eq!(doc["__v"], json!(0));
        assert_eq!(doc["maxGroupSize"], json!(25));
        assert!(doc.get("version").is_none());
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("The Sea Explorer"), "the-sea-explorer");
        assert_eq!(slugify("  Wine & Dine -- Tour!! "), "wine-dine-tour");
    }

    #[test]
    fn schema_hides_created_at() {
        let hidden: Vec<_> = TOUR_SCHEMA.hidden_fields().map(|f| f.name).collect();
        assert_eq!(hidden, vec!["createdAt"]);
        assert_eq!(TOUR_SCHEMA.field("__v").map(|f| f.column), Some("version"));
    }
}
