// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub text: String,
    /// Seconds budgeted for this question.
    pub time_allowance: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'question_options' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
}

/// DTO for serving a question to a taker: the correct-option flag stays
/// server-side until the answer is submitted.
#[derive(Debug, Serialize)]
pub struct ServedQuestion {
    pub id: i64,
    pub text: String,
    pub time_allowance: i32,
    pub options: Vec<ServedOption>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ServedOption {
    pub id: i64,
    pub text: String,
}

/// One authored option inside a create/update question payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct NewOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for creating a question with its options in one shot.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub quiz_id: i64,
    #[validate(length(min = 1, max = 250))]
    pub text: String,
    /// Seconds; defaults to 60 when omitted.
    pub time_allowance: Option<i32>,
    #[validate(custom(function = validate_options))]
    pub options: Vec<NewOption>,
}

/// DTO for updating a question. Replacing the option set is all-or-nothing.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 250))]
    pub text: Option<String>,
    pub time_allowance: Option<i32>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<NewOption>>,
}

/// Authoring rule: 3 to 6 options, exactly one flagged correct.
pub fn validate_options(options: &[NewOption]) -> Result<(), ValidationError> {
    if options.len() < 3 || options.len() > 6 {
        return Err(ValidationError::new("question_needs_3_to_6_options"));
    }
    if options.iter().filter(|o| o.is_correct).count() != 1 {
        return Err(ValidationError::new("exactly_one_option_must_be_correct"));
    }
    for opt in options {
        if opt.text.is_empty() || opt.text.len() > 250 {
            return Err(ValidationError::new("option_text_length"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(flags: &[bool]) -> Vec<NewOption> {
        flags
            .iter()
            .map(|&is_correct| NewOption {
                text: "option".to_string(),
                is_correct,
            })
            .collect()
    }

    #[test]
    fn accepts_three_to_six_options_with_one_correct() {
        assert!(validate_options(&opts(&[true, false, false])).is_ok());
        assert!(validate_options(&opts(&[false, false, true, false, false, false])).is_ok());
    }

    #[test]
    fn rejects_wrong_option_counts() {
        assert!(validate_options(&opts(&[true, false])).is_err());
        assert!(validate_options(&opts(&[true, false, false, false, false, false, false])).is_err());
    }

    #[test]
    fn rejects_zero_or_multiple_correct() {
        assert!(validate_options(&opts(&[false, false, false])).is_err());
        assert!(validate_options(&opts(&[true, true, false])).is_err());
    }
}
