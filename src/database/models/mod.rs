pub mod tour;
pub mod user;

pub use tour::{Tour, TourInput, TourRecord, TOUR_SCHEMA};
pub use user::{Role, SignupInput, User, USER_SCHEMA};

/// Field-level validation failures collected for one document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid input data. {}", .messages.join(". "))]
pub struct ValidationError {
    pub messages: Vec<String>,
}

impl ValidationError {
    pub fn single(message: impl Into<String>) -> Self {
        Self { messages: vec![message.into()] }
    }

    /// `Ok(())` when nothing was collected
    pub fn check(messages: Vec<String>) -> Result<(), Self> {
        if messages.is_empty() {
            Ok(())
        } else {
            Err(Self { messages })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_messages_into_one_sentence_list() {
        let err = ValidationError {
            messages: vec!["A tour must have a name".into(), "A tour must have a price".into()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid input data. A tour must have a name. A tour must have a price"
        );
    }

    #[test]
    fn check_passes_on_empty() {
        assert!(ValidationError::check(vec![]).is_ok());
        assert_eq!(ValidationError::check(vec!["x".into()]), Err(ValidationError::single("x")));
    }
}
