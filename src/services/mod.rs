pub mod mail;
pub mod tour_service;
pub mod user_service;

pub use mail::{Email, HttpMailer, LogMailer, MailError, Mailer};
pub use tour_service::{MonthlyPlan, TourError, TourService, TourStats};
pub use user_service::{UserError, UserService};
