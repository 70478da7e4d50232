//! # Data Model Module
//!
//! Core records shared by the extraction client, the persistence gateway,
//! the conversation controller and the report renderer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Upper bound (inclusive) for the hours of a single activity
pub const MAX_HOURS: f64 = 24.0;

/// Activity category, stored with its camelCase key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "proyectoFacturable")]
    BillableProject,
    #[serde(rename = "proyectoNoFacturable")]
    NonBillableProject,
    #[serde(rename = "otrosNoFacturable")]
    OtherNonBillable,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::BillableProject,
        Category::NonBillableProject,
        Category::OtherNonBillable,
    ];

    /// Key used in storage, in model output and in chat listings
    pub fn as_key(&self) -> &'static str {
        match self {
            Category::BillableProject => "proyectoFacturable",
            Category::NonBillableProject => "proyectoNoFacturable",
            Category::OtherNonBillable => "otrosNoFacturable",
        }
    }

    /// Human label used in the spreadsheet report
    pub fn label(&self) -> &'static str {
        match self {
            Category::BillableProject => "Proyecto Facturable",
            Category::NonBillableProject => "Proyecto No Facturable",
            Category::OtherNonBillable => "Otros No Facturable",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Category::BillableProject => "💰",
            Category::NonBillableProject => "📌",
            Category::OtherNonBillable => "📎",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_key() == s)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// One activity as returned by the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedActivity {
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "proyecto")]
    pub project: String,
    #[serde(rename = "categoria")]
    pub category: Category,
    #[serde(rename = "horas_estimadas")]
    pub hours: f64,
}

/// A persisted time record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRecord {
    pub id: Uuid,
    pub owner: i64,
    pub date: NaiveDate,
    pub description: String,
    pub project: String,
    pub category: Category,
    pub hours: f64,
    pub raw_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeRecord {
    /// Build a fresh record for `owner` from one extracted activity
    pub fn from_activity(
        owner: i64,
        date: NaiveDate,
        activity: &ExtractedActivity,
        raw_text: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            date,
            description: activity.description.clone(),
            project: activity.project.clone(),
            category: activity.category,
            hours: activity.hours,
            raw_text: raw_text.map(|s| s.to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    /// First eight characters of the identifier, as shown in listings
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }
}

/// Mirrored conversation state, one row per owner
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub owner: i64,
    pub step: String,
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Whether `hours` lies in the accepted (0, 24] range
pub fn hours_in_range(hours: f64) -> bool {
    hours.is_finite() && hours > 0.0 && hours <= MAX_HOURS
}

/// Round to two decimals, the precision hours are stored with
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render an hour amount without trailing zeros ("2", "1.5", "0.25")
pub fn format_hours(hours: f64) -> String {
    let text = format!("{:.2}", round_cents(hours));
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
