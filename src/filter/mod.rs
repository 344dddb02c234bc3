pub mod types;
pub mod schema;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod features;
pub mod error;

pub use types::*;
pub use filter::Filter;
pub use features::{ApiFeatures, Projection, QueryFeatures};
pub use schema::{FieldKind, FieldSpec, Schema};
pub use error::FilterError;
