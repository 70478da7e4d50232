//! Pulling the activity payload out of model output and checking it.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::errors::ExtractionError;
use crate::models::{hours_in_range, round_cents, ExtractedActivity};

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?\s*```").expect("valid fenced block regex");
}

#[derive(Debug, Deserialize)]
struct ActivityPayload {
    #[serde(rename = "actividades")]
    activities: Vec<ExtractedActivity>,
}

/// Locate the JSON document inside raw model output.
///
/// Tries a fenced code block first, then the span between the first `{`
/// and the last `}`, and finally falls back to the whole text.
pub fn extract_json(text: &str) -> &str {
    if let Some(inner) = FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        return inner.as_str().trim();
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            return &text[start..=end];
        }
    }

    text
}

/// Parse and validate the activity list contained in `raw`.
pub fn parse_activities(raw: &str) -> Result<Vec<ExtractedActivity>, ExtractionError> {
    let json = extract_json(raw);

    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;

    let payload: ActivityPayload =
        serde_json::from_value(value).map_err(|e| ExtractionError::Validation(e.to_string()))?;

    validate_activities(payload.activities)
}

/// Semantic checks that the typed schema cannot express.
pub fn validate_activities(
    activities: Vec<ExtractedActivity>,
) -> Result<Vec<ExtractedActivity>, ExtractionError> {
    if activities.is_empty() {
        return Err(ExtractionError::Validation(
            "the activity list is empty".to_string(),
        ));
    }

    activities
        .into_iter()
        .enumerate()
        .map(|(i, mut activity)| {
            let position = i + 1;
            activity.description = activity.description.trim().to_string();
            activity.project = activity.project.trim().to_string();
            // Stored as NUMERIC(5,2); a value that rounds to zero would fail the table check
            activity.hours = round_cents(activity.hours);

            if activity.description.is_empty() {
                return Err(ExtractionError::Validation(format!(
                    "activity {position} has an empty description"
                )));
            }
            if activity.project.is_empty() {
                return Err(ExtractionError::Validation(format!(
                    "activity {position} has an empty project"
                )));
            }
            if !hours_in_range(activity.hours) {
                return Err(ExtractionError::Validation(format!(
                    "activity {position} has {} hours, expected a value in (0, 24]",
                    activity.hours
                )));
            }
            Ok(activity)
        })
        .collect()
}
