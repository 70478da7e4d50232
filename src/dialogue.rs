//! Conversation state for the multi-step command flows.
//!
//! Each flow is a fixed sequence of waiting steps. The controller in
//! `bot::dialogue_manager` walks these tables; this module only holds the
//! data and the pure input validators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::dates::{parse_date, parse_month_year};
use crate::models::TimeRecord;

/// One of the five multi-step commands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    RegisterToday,
    RegisterOtherDay,
    DeleteRecord,
    QueryByDate,
    MonthlyReport,
}

/// A waiting state: the bot has asked something and expects one reply
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepId {
    AwaitingDate,
    AwaitingActivities,
    AwaitingSelection,
    AwaitingMonth,
}

impl StepId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::AwaitingDate => "awaiting_date",
            StepId::AwaitingActivities => "awaiting_activities",
            StepId::AwaitingSelection => "awaiting_selection",
            StepId::AwaitingMonth => "awaiting_month",
        }
    }
}

impl FlowKind {
    /// Waiting steps in order
    pub fn steps(&self) -> &'static [StepId] {
        match self {
            FlowKind::RegisterToday => &[StepId::AwaitingActivities],
            FlowKind::RegisterOtherDay => &[StepId::AwaitingDate, StepId::AwaitingActivities],
            FlowKind::DeleteRecord => &[StepId::AwaitingDate, StepId::AwaitingSelection],
            FlowKind::QueryByDate => &[StepId::AwaitingDate],
            FlowKind::MonthlyReport => &[StepId::AwaitingMonth],
        }
    }

    pub fn first_step(&self) -> StepId {
        self.steps()[0]
    }

    /// Step after `current`, or `None` when `current` is the last one
    pub fn next_step(&self, current: StepId) -> Option<StepId> {
        let steps = self.steps();
        steps
            .iter()
            .position(|s| *s == current)
            .and_then(|i| steps.get(i + 1))
            .copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlowKind::RegisterToday => "registrar_dia_actual",
            FlowKind::RegisterOtherDay => "registrar_otro_dia",
            FlowKind::DeleteRecord => "eliminar_registro",
            FlowKind::QueryByDate => "recuperar_registro_por_fecha",
            FlowKind::MonthlyReport => "generar_reporte",
        }
    }
}

/// Data carried between steps
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub target_date: Option<NaiveDate>,
    /// Records listed for deletion, in displayed order
    pub candidates: Vec<TimeRecord>,
}

/// An in-progress flow for one owner
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub flow: FlowKind,
    pub step: StepId,
    pub data: SessionData,
    pub language_code: Option<String>,
    #[serde(skip, default = "Instant::now")]
    pub touched_at: Instant,
}

impl Session {
    pub fn start(flow: FlowKind, language_code: Option<&str>) -> Self {
        Self {
            flow,
            step: flow.first_step(),
            data: SessionData::default(),
            language_code: language_code.map(|s| s.to_string()),
            touched_at: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.touched_at = Instant::now();
    }

    pub fn idle_for(&self) -> std::time::Duration {
        self.touched_at.elapsed()
    }
}

/// A reply that passed the current step's validator
#[derive(Clone, Debug, PartialEq)]
pub enum StepInput {
    Date(NaiveDate),
    Activities(String),
    /// Zero-based index into the listed candidates
    Selection(usize),
    Month { month: u32, year: i32 },
}

/// Why a reply was rejected. The step stays the same.
#[derive(Clone, Debug, PartialEq)]
pub enum InputError {
    InvalidDate,
    NotANumber,
    OutOfRange { max: usize },
    InvalidMonth,
    EmptyText,
}

/// Validates a selection index against the number of listed records
pub fn validate_selection(input: &str, count: usize) -> Result<usize, InputError> {
    let value: i64 = input.trim().parse().map_err(|_| InputError::NotANumber)?;
    if value < 1 || value as usize > count {
        return Err(InputError::OutOfRange { max: count });
    }
    Ok(value as usize - 1)
}

/// Validates free-text activities input
pub fn validate_activities_text(input: &str) -> Result<String, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::EmptyText);
    }
    Ok(trimmed.to_string())
}

/// Validator table: which check applies to which step
pub fn validate_step_input(step: StepId, input: &str, data: &SessionData) -> Result<StepInput, InputError> {
    match step {
        StepId::AwaitingDate => parse_date(input)
            .map(StepInput::Date)
            .ok_or(InputError::InvalidDate),
        StepId::AwaitingActivities => validate_activities_text(input).map(StepInput::Activities),
        StepId::AwaitingSelection => {
            validate_selection(input, data.candidates.len()).map(StepInput::Selection)
        }
        StepId::AwaitingMonth => parse_month_year(input)
            .map(|(month, year)| StepInput::Month { month, year })
            .map_err(|_| InputError::InvalidMonth),
    }
}
