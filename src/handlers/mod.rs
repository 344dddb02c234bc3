// Route handlers, one module per resource
pub mod auth;
pub mod system;
pub mod tours;
pub mod users;
pub mod utils;
