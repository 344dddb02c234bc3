pub mod auth;
pub mod response;

pub use auth::{protect, restrict_to, CurrentUser};
pub use response::{ApiResponse, ApiResult};
