//! UI Builder module for formatting chat messages

use chrono::NaiveDate;
use std::collections::BTreeMap;

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::dialogue::{FlowKind, InputError, StepId};
use crate::models::{format_hours, TimeRecord};
use crate::report::month_name;

use super::commands::WELCOME_COMMANDS;

fn total_hours(records: &[TimeRecord]) -> f64 {
    records.iter().map(|r| r.hours).sum()
}

/// One numbered block: project, description, hours and category
fn push_record_block(lines: &mut Vec<String>, position: usize, record: &TimeRecord) {
    lines.push(format!("{}. 📁 {}", position, record.project));
    lines.push(format!("   {}", record.description));
    lines.push(format!(
        "   ⏱️ {}h — {} {}",
        format_hours(record.hours),
        record.category.emoji(),
        record.category
    ));
}

/// Welcome message for /start
pub fn format_welcome(first_name: Option<&str>, language_code: Option<&str>) -> String {
    let name = first_name
        .filter(|n| !n.trim().is_empty())
        .map(|n| n.to_string())
        .unwrap_or_else(|| t_lang("default-user-name", language_code));

    let commands: Vec<String> = WELCOME_COMMANDS
        .iter()
        .map(|(command, key)| format!("▸ /{} — {}", command, t_lang(key, language_code)))
        .collect();

    format!(
        "{}\n\n{}\n\n{}\n\n{}\n\n{}",
        t_args_lang("welcome-greeting", &[("name", &name)], language_code),
        t_lang("welcome-description", language_code),
        t_lang("welcome-commands-title", language_code),
        commands.join("\n"),
        t_lang("welcome-tip", language_code)
    )
}

/// Confirmation after a successful registration
pub fn format_registration_summary(records: &[TimeRecord], date: NaiveDate, language_code: Option<&str>) -> String {
    let date = date.to_string();
    let mut lines = vec![
        t_args_lang("summary-saved", &[("date", &date)], language_code),
        String::new(),
        t_args_lang("summary-count", &[("count", &records.len().to_string())], language_code),
        String::new(),
    ];

    for (i, record) in records.iter().enumerate() {
        push_record_block(&mut lines, i + 1, record);
        lines.push(String::new());
    }

    lines.push(t_args_lang(
        "total-hours",
        &[("hours", &format_hours(total_hours(records)))],
        language_code,
    ));
    lines.join("\n")
}

/// Numbered listing of one day's records, as used by query and delete
pub fn format_records(records: &[TimeRecord], date: NaiveDate, language_code: Option<&str>) -> String {
    let date = date.to_string();
    if records.is_empty() {
        return t_args_lang("records-empty", &[("date", &date)], language_code);
    }

    let mut lines = vec![
        t_args_lang("records-title", &[("date", &date)], language_code),
        t_args_lang("records-count", &[("count", &records.len().to_string())], language_code),
        String::new(),
    ];

    for (i, record) in records.iter().enumerate() {
        push_record_block(&mut lines, i + 1, record);
        lines.push(format!("   🆔 {}...", record.short_id()));
        lines.push(String::new());
    }

    lines.push(t_args_lang(
        "total-hours",
        &[("hours", &format_hours(total_hours(records)))],
        language_code,
    ));
    lines.join("\n")
}

/// Weekly digest grouped by date
pub fn format_week_summary(
    records: &[TimeRecord],
    start: NaiveDate,
    end: NaiveDate,
    language_code: Option<&str>,
) -> String {
    let (start, end) = (start.to_string(), end.to_string());
    if records.is_empty() {
        return t_args_lang("week-empty", &[("start", &start), ("end", &end)], language_code);
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<&TimeRecord>> = BTreeMap::new();
    for record in records {
        by_date.entry(record.date).or_default().push(record);
    }

    let mut lines = vec![
        t_args_lang("week-title", &[("start", &start), ("end", &end)], language_code),
        String::new(),
    ];

    for (date, day) in &by_date {
        let hours: f64 = day.iter().map(|r| r.hours).sum();
        lines.push(t_args_lang(
            "week-day",
            &[
                ("date", &date.to_string()),
                ("hours", &format_hours(hours)),
                ("count", &day.len().to_string()),
            ],
            language_code,
        ));
        for record in day {
            lines.push(format!(
                "   • {}: {} ({}h)",
                record.project,
                record.description,
                format_hours(record.hours)
            ));
        }
        lines.push(String::new());
    }

    lines.push(t_args_lang(
        "week-total",
        &[("hours", &format_hours(total_hours(records)))],
        language_code,
    ));
    lines.join("\n")
}

/// `MM/YYYY` example built from today's date
pub fn month_example(today: NaiveDate) -> String {
    today.format("%m/%Y").to_string()
}

/// Prompt sent when a flow enters `step`
pub fn step_prompt(
    flow: FlowKind,
    step: StepId,
    target_date: Option<NaiveDate>,
    today: NaiveDate,
    language_code: Option<&str>,
) -> String {
    match (flow, step) {
        (_, StepId::AwaitingActivities) => match target_date {
            Some(date) if flow == FlowKind::RegisterOtherDay => format!(
                "{}\n\n{}",
                t_args_lang("prompt-activities-for-date", &[("date", &date.to_string())], language_code),
                t_lang("prompt-activities-that-day", language_code)
            ),
            _ => format!(
                "{}\n\n{}",
                t_lang("prompt-activities-today", language_code),
                t_lang("prompt-activities-example", language_code)
            ),
        },
        (_, StepId::AwaitingDate) => {
            let question = match flow {
                FlowKind::DeleteRecord => "prompt-date-delete",
                FlowKind::QueryByDate => "prompt-date-query",
                _ => "prompt-date-register",
            };
            format!(
                "{}\n\n{}",
                t_lang(question, language_code),
                t_lang("prompt-date-formats", language_code)
            )
        }
        (_, StepId::AwaitingSelection) => t_lang("prompt-delete-selection", language_code),
        (_, StepId::AwaitingMonth) => format!(
            "{}\n\n{}",
            t_lang("prompt-month", language_code),
            t_args_lang("prompt-month-format", &[("example", &month_example(today))], language_code)
        ),
    }
}

/// Re-prompt text for a rejected reply
pub fn input_error_message(error: &InputError, today: NaiveDate, language_code: Option<&str>) -> String {
    match error {
        InputError::InvalidDate => t_lang("error-invalid-date", language_code),
        InputError::NotANumber => t_lang("error-not-a-number", language_code),
        InputError::OutOfRange { max } => {
            t_args_lang("error-selection-range", &[("max", &max.to_string())], language_code)
        }
        InputError::InvalidMonth => t_args_lang(
            "error-invalid-month",
            &[("example", &month_example(today))],
            language_code,
        ),
        InputError::EmptyText => t_lang("error-empty-text", language_code),
    }
}

/// Failure notice for the extraction step, carrying the cause
pub fn extraction_error_message(detail: &str, language_code: Option<&str>) -> String {
    format!(
        "{}\n\n{}",
        t_lang("error-extraction", language_code),
        t_args_lang("error-detail", &[("detail", detail)], language_code)
    )
}

/// Confirmation naming the removed record
pub fn format_delete_success(record: &TimeRecord, language_code: Option<&str>) -> String {
    format!(
        "{}\n📁 {} — {}",
        t_lang("delete-success", language_code),
        record.project,
        record.description
    )
}

pub fn report_caption(month: u32, year: i32, count: usize, language_code: Option<&str>) -> String {
    format!(
        "{}\n{}",
        t_args_lang(
            "report-caption",
            &[("month", &month_name(month)), ("year", &year.to_string())],
            language_code
        ),
        t_args_lang("report-caption-count", &[("count", &count.to_string())], language_code)
    )
}

pub fn report_empty_message(month: u32, year: i32, language_code: Option<&str>) -> String {
    t_args_lang(
        "report-empty",
        &[("period", &format!("{month:02}/{year}"))],
        language_code,
    )
}
