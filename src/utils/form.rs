// src/utils/form.rs

//! Parsing of the string-keyed answer maps posted by the client.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

static QUESTION_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^question_(\d+)$").expect("valid question key pattern"));

/// Extracts `question_<id> -> <selected id>` pairs.
///
/// Keys that are not question keys are ignored and blank values count as
/// unanswered. A value that is not an integer id is a validation error.
pub fn parse_selections(form: &HashMap<String, String>) -> Result<HashMap<i64, i64>, AppError> {
    let mut selections = HashMap::new();

    for (key, value) in form {
        let Some(captures) = QUESTION_KEY.captures(key) else {
            continue;
        };
        let question_id = captures[1]
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest(format!("Malformed question key '{}'", key)))?;

        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let selected = value.parse::<i64>().map_err(|_| {
            AppError::BadRequest(format!(
                "Malformed selection '{}' for question {}",
                value, question_id
            ))
        })?;

        selections.insert(question_id, selected);
    }

    Ok(selections)
}
