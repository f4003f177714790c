//! API utility functions
//!
//! Request validation shared by the session handlers.

use crate::error::AppError;

/// Maximum question length in characters
pub const MAX_QUESTION_LENGTH: usize = 10_000;

/// Default size of rendered chart images
pub const DEFAULT_CHART_WIDTH: u32 = 800;
/// Default chart image height
pub const DEFAULT_CHART_HEIGHT: u32 = 500;

/// Largest chart image edge accepted from a request
pub const MAX_CHART_EDGE: u32 = 4_000;

/// Validate a question
///
/// # Returns
/// * `Ok(())` - Question is valid
/// * `Err(AppError)` - Question is empty or too long
pub fn validate_question(question: &str) -> Result<(), AppError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest(
            "Question cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_QUESTION_LENGTH {
        return Err(AppError::InvalidRequest(format!(
            "Question exceeds maximum length of {} characters",
            MAX_QUESTION_LENGTH
        )));
    }
    Ok(())
}

/// Clamp a requested chart edge to a drawable size
pub fn chart_edge(requested: Option<u32>, default: u32) -> u32 {
    requested.unwrap_or(default).clamp(100, MAX_CHART_EDGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_question() {
        assert!(validate_question("What is the total number of customers?").is_ok());
        assert!(matches!(
            validate_question("  \n "),
            Err(AppError::InvalidRequest(_))
        ));
        let long = "a".repeat(MAX_QUESTION_LENGTH + 1);
        assert!(matches!(
            validate_question(&long),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_chart_edge() {
        assert_eq!(chart_edge(None, DEFAULT_CHART_WIDTH), 800);
        assert_eq!(chart_edge(Some(10), DEFAULT_CHART_WIDTH), 100);
        assert_eq!(chart_edge(Some(100_000), DEFAULT_CHART_HEIGHT), MAX_CHART_EDGE);
    }
}
