//! Dialogue Manager module: the conversation flow controller.
//!
//! One generic runner drives every multi-step command. For each inbound
//! event it takes the owner's session slot, validates the reply against the
//! current step, runs the step's effect and either advances to the next
//! step from the flow table or ends the flow.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// Import localization
use crate::localization::t_lang;

use crate::dates::{end_of_week, start_of_week, today_in};
use crate::dialogue::{validate_step_input, FlowKind, Session, StepInput};
use crate::extraction::ActivityExtractor;
use crate::models::StoredSession;
use crate::report::{generate_report, report_file_name};
use crate::sessions::{SessionGuard, SessionRegistry};
use crate::store::RecordStore;

use super::commands::Command;
use super::ui_builder::{
    extraction_error_message, format_delete_success, format_records, format_registration_summary,
    format_week_summary, format_welcome, input_error_message, report_caption, report_empty_message,
    step_prompt,
};

/// What the user sent
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Command(Command),
    Text(String),
    /// A `/command` this bot does not know
    UnknownCommand(String),
}

/// One inbound message, stripped of transport details
#[derive(Clone, Debug)]
pub struct Event {
    pub owner: i64,
    pub first_name: Option<String>,
    pub display_name: Option<String>,
    pub language_code: Option<String>,
    pub input: Inbound,
}

impl Event {
    pub fn new(owner: i64, input: Inbound) -> Self {
        Self {
            owner,
            first_name: None,
            display_name: None,
            language_code: None,
            input,
        }
    }

    pub fn text(owner: i64, text: impl Into<String>) -> Self {
        Self::new(owner, Inbound::Text(text.into()))
    }

    pub fn command(owner: i64, command: Command) -> Self {
        Self::new(owner, Inbound::Command(command))
    }
}

/// Outbound message produced by the controller
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Text(String),
    Document {
        file_name: String,
        bytes: Vec<u8>,
        caption: String,
    },
}

/// Delivers replies to the user who sent the event
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn deliver(&self, reply: Reply) -> Result<()>;
}

/// Result of a step's side effect
enum Outcome {
    /// The flow reached its terminal state
    Finished,
    /// Move to the next step, optionally sending text before its prompt
    Advance { preface: Option<String> },
}

pub struct FlowController {
    store: Arc<dyn RecordStore>,
    extractor: Arc<dyn ActivityExtractor>,
    sessions: SessionRegistry,
    timezone: Tz,
    mirror: bool,
}

impl FlowController {
    pub fn new(
        store: Arc<dyn RecordStore>,
        extractor: Arc<dyn ActivityExtractor>,
        timezone: Tz,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            extractor,
            sessions: SessionRegistry::new(timeout),
            timezone,
            mirror: false,
        }
    }

    /// Mirror every session change into the store for crash recovery
    pub fn with_session_mirror(mut self, enabled: bool) -> Self {
        self.mirror = enabled;
        self
    }

    pub fn today(&self) -> NaiveDate {
        today_in(self.timezone)
    }

    pub fn has_active_session(&self, owner: i64) -> bool {
        self.sessions.has_active_session(owner)
    }

    /// Discard sessions idle past the timeout. No message is sent.
    pub async fn expire_idle(&self) -> Vec<i64> {
        let expired = self.sessions.expire_idle();
        for owner in &expired {
            self.persist(*owner, None).await;
        }
        expired
    }

    /// Handle one event. Never fails: unexpected errors are logged, the
    /// owner's session is dropped and the user gets a generic notice.
    pub async fn handle(&self, event: Event, outbox: &dyn Outbox) {
        let owner = event.owner;
        let language_code = event.language_code.clone();
        let mut guard = self.sessions.acquire(owner).await;

        if let Err(e) = self.dispatch(&mut guard, event, outbox).await {
            error!(user_id = owner, error = ?e, "Unhandled error while handling event");
            *guard = None;
            self.persist(owner, None).await;

            let notice = t_lang("error-unexpected", language_code.as_deref());
            if let Err(send_err) = outbox.deliver(Reply::Text(notice)).await {
                error!(user_id = owner, error = %send_err, "Failed to send error message to user");
            }
        }
    }

    async fn dispatch(&self, guard: &mut SessionGuard, event: Event, outbox: &dyn Outbox) -> Result<()> {
        let owner = event.owner;
        let lang = event.language_code.as_deref();

        if guard.fresh && guard.is_none() && self.mirror {
            self.restore(guard).await;
        }

        if let Some(session) = guard.as_ref() {
            if self.sessions.is_expired(session) {
                info!(
                    user_id = owner,
                    flow = session.flow.name(),
                    step = session.step.as_str(),
                    "Conversation timed out"
                );
                **guard = None;
                self.persist(owner, None).await;
            }
        }

        match &event.input {
            Inbound::Command(Command::Start) => {
                let text = format_welcome(event.first_name.as_deref(), lang);
                outbox.deliver(Reply::Text(text)).await
            }
            Inbound::Command(Command::VerSemana) => self.week_summary(owner, lang, outbox).await,
            Inbound::Command(Command::Cancelar) => match guard.take() {
                Some(session) => {
                    info!(user_id = owner, flow = session.flow.name(), "Flow cancelled");
                    self.persist(owner, None).await;
                    outbox.deliver(Reply::Text(t_lang("cancelled", lang))).await
                }
                None => outbox.deliver(Reply::Text(t_lang("nothing-to-cancel", lang))).await,
            },
            Inbound::Command(command) => match command.flow() {
                Some(flow) => self.enter(guard, flow, lang, outbox).await,
                None => bail!("command {command:?} has no handler"),
            },
            Inbound::UnknownCommand(text) => {
                debug!(user_id = owner, command = %text, "Unknown command");
                outbox.deliver(Reply::Text(t_lang("unknown-command", lang))).await
            }
            Inbound::Text(text) => match guard.take() {
                None => outbox.deliver(Reply::Text(t_lang("text-without-flow", lang))).await,
                Some(session) => {
                    let next = self.advance(session, text, &event, outbox).await?;
                    self.persist(owner, next.as_ref()).await;
                    **guard = next;
                    Ok(())
                }
            },
        }
    }

    /// Entry point of a flow: replaces any prior session and sends the first prompt
    async fn enter(
        &self,
        guard: &mut SessionGuard,
        flow: FlowKind,
        lang: Option<&str>,
        outbox: &dyn Outbox,
    ) -> Result<()> {
        if let Some(previous) = guard.take() {
            info!(
                user_id = guard.owner,
                previous = previous.flow.name(),
                next = flow.name(),
                "Discarding unfinished flow"
            );
        }

        let session = Session::start(flow, lang);
        let prompt = step_prompt(flow, session.step, None, self.today(), lang);
        outbox.deliver(Reply::Text(prompt)).await?;

        info!(user_id = guard.owner, flow = flow.name(), "Flow started");
        self.persist(guard.owner, Some(&session)).await;
        **guard = Some(session);
        Ok(())
    }

    /// Feed one reply to the current step. Returns the session to keep, if any.
    async fn advance(
        &self,
        mut session: Session,
        text: &str,
        event: &Event,
        outbox: &dyn Outbox,
    ) -> Result<Option<Session>> {
        let lang_owned = session.language_code.clone().or_else(|| event.language_code.clone());
        let lang = lang_owned.as_deref();

        let input = match validate_step_input(session.step, text, &session.data) {
            Ok(input) => input,
            Err(input_error) => {
                debug!(user_id = event.owner, step = session.step.as_str(), error = ?input_error, "Rejected step input");
                let message = input_error_message(&input_error, self.today(), lang);
                outbox.deliver(Reply::Text(message)).await?;
                session.touch();
                return Ok(Some(session));
            }
        };

        match self.run_effect(&mut session, input, event, lang, outbox).await? {
            Outcome::Finished => {
                info!(user_id = event.owner, flow = session.flow.name(), "Flow finished");
                Ok(None)
            }
            Outcome::Advance { preface } => {
                let Some(next) = session.flow.next_step(session.step) else {
                    bail!("{} has no step after {}", session.flow.name(), session.step.as_str());
                };
                session.step = next;
                session.touch();

                let prompt = step_prompt(session.flow, next, session.data.target_date, self.today(), lang);
                let message = match preface {
                    Some(preface) => format!("{preface}\n\n{prompt}"),
                    None => prompt,
                };
                outbox.deliver(Reply::Text(message)).await?;
                Ok(Some(session))
            }
        }
    }

    /// Effect table: what each (flow, validated input) pair does
    async fn run_effect(
        &self,
        session: &mut Session,
        input: StepInput,
        event: &Event,
        lang: Option<&str>,
        outbox: &dyn Outbox,
    ) -> Result<Outcome> {
        let owner = event.owner;

        match (session.flow, input) {
            (FlowKind::RegisterOtherDay, StepInput::Date(date)) => {
                session.data.target_date = Some(date);
                Ok(Outcome::Advance { preface: None })
            }
            (FlowKind::RegisterToday | FlowKind::RegisterOtherDay, StepInput::Activities(text)) => {
                let date = session.data.target_date.unwrap_or_else(|| self.today());
                self.register(owner, date, &text, lang, outbox).await?;
                Ok(Outcome::Finished)
            }
            (FlowKind::QueryByDate, StepInput::Date(date)) => {
                let message = match self.store.records_on(owner, date).await {
                    Ok(records) => format_records(&records, date, lang),
                    Err(e) => {
                        error!(user_id = owner, error = %e, "Failed to fetch records");
                        t_lang("error-query", lang)
                    }
                };
                outbox.deliver(Reply::Text(message)).await?;
                Ok(Outcome::Finished)
            }
            (FlowKind::DeleteRecord, StepInput::Date(date)) => {
                let records = match self.store.records_on(owner, date).await {
                    Ok(records) => records,
                    Err(e) => {
                        error!(user_id = owner, error = %e, "Failed to fetch records");
                        outbox.deliver(Reply::Text(t_lang("error-query", lang))).await?;
                        return Ok(Outcome::Finished);
                    }
                };
                if records.is_empty() {
                    outbox.deliver(Reply::Text(format_records(&records, date, lang))).await?;
                    return Ok(Outcome::Finished);
                }

                let listing = format_records(&records, date, lang);
                session.data.target_date = Some(date);
                session.data.candidates = records;
                Ok(Outcome::Advance { preface: Some(listing) })
            }
            (FlowKind::DeleteRecord, StepInput::Selection(index)) => {
                let Some(record) = session.data.candidates.get(index) else {
                    bail!("selection {index} outside the listed records");
                };

                let message = match self.store.delete_record(record.id, owner).await {
                    Ok(true) => format_delete_success(record, lang),
                    Ok(false) => {
                        warn!(user_id = owner, record_id = %record.id, "Record not found or not owned");
                        t_lang("error-delete-failed", lang)
                    }
                    Err(e) => {
                        error!(user_id = owner, record_id = %record.id, error = %e, "Failed to delete record");
                        t_lang("error-delete-failed", lang)
                    }
                };
                outbox.deliver(Reply::Text(message)).await?;
                Ok(Outcome::Finished)
            }
            (FlowKind::MonthlyReport, StepInput::Month { month, year }) => {
                self.send_report(owner, month, year, event.display_name.as_deref(), lang, outbox)
                    .await?;
                Ok(Outcome::Finished)
            }
            (flow, input) => bail!("input {input:?} does not apply to {}", flow.name()),
        }
    }

    /// Extract activities and store them as one batch
    async fn register(
        &self,
        owner: i64,
        date: NaiveDate,
        text: &str,
        lang: Option<&str>,
        outbox: &dyn Outbox,
    ) -> Result<()> {
        outbox.deliver(Reply::Text(t_lang("status-processing", lang))).await?;

        let activities = match self.extractor.extract(text).await {
            Ok(activities) => activities,
            Err(e) => {
                error!(user_id = owner, error = %e, "Activity extraction failed");
                let message = extraction_error_message(&e.to_string(), lang);
                return outbox.deliver(Reply::Text(message)).await;
            }
        };

        match self.store.insert_batch(owner, date, &activities, Some(text)).await {
            Ok(records) => {
                let summary = format_registration_summary(&records, date, lang);
                outbox.deliver(Reply::Text(summary)).await
            }
            Err(e) => {
                error!(user_id = owner, error = ?e, "Failed to save time records");
                outbox.deliver(Reply::Text(t_lang("error-save", lang))).await
            }
        }
    }

    async fn send_report(
        &self,
        owner: i64,
        month: u32,
        year: i32,
        display_name: Option<&str>,
        lang: Option<&str>,
        outbox: &dyn Outbox,
    ) -> Result<()> {
        outbox.deliver(Reply::Text(t_lang("status-generating-report", lang))).await?;

        let records = match self.store.records_in_month(owner, year, month).await {
            Ok(records) => records,
            Err(e) => {
                error!(user_id = owner, error = %e, "Failed to fetch month records");
                return outbox.deliver(Reply::Text(t_lang("error-report", lang))).await;
            }
        };

        if records.is_empty() {
            return outbox
                .deliver(Reply::Text(report_empty_message(month, year, lang)))
                .await;
        }

        match generate_report(&records, month, year, display_name) {
            Ok(bytes) => {
                outbox
                    .deliver(Reply::Document {
                        file_name: report_file_name(month, year),
                        bytes,
                        caption: report_caption(month, year, records.len(), lang),
                    })
                    .await
            }
            Err(e) => {
                error!(user_id = owner, error = ?e, "Failed to render report");
                outbox.deliver(Reply::Text(t_lang("error-report", lang))).await
            }
        }
    }

    async fn week_summary(&self, owner: i64, lang: Option<&str>, outbox: &dyn Outbox) -> Result<()> {
        let today = self.today();
        let (start, end) = (start_of_week(today), end_of_week(today));

        let message = match self.store.records_between(owner, start, end).await {
            Ok(records) => format_week_summary(&records, start, end, lang),
            Err(e) => {
                error!(user_id = owner, error = %e, "Failed to fetch week records");
                t_lang("error-query", lang)
            }
        };
        outbox.deliver(Reply::Text(message)).await
    }

    /// Write or clear the durable copy of a session. Failures are only logged.
    async fn persist(&self, owner: i64, session: Option<&Session>) {
        if !self.mirror {
            return;
        }

        let result = match session {
            Some(session) => match serde_json::to_value(session) {
                Ok(payload) => {
                    let stored = StoredSession {
                        owner,
                        step: session.step.as_str().to_string(),
                        payload,
                        updated_at: Utc::now(),
                    };
                    self.store.save_session(&stored).await
                }
                Err(e) => Err(e.into()),
            },
            None => self.store.clear_session(owner).await,
        };

        if let Err(e) = result {
            warn!(user_id = owner, error = %e, "Failed to mirror session state");
        }
    }

    /// Resume a mirrored session left by a previous process
    async fn restore(&self, guard: &mut SessionGuard) {
        let owner = guard.owner;
        let stored = match self.store.load_session(owner).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return,
            Err(e) => {
                warn!(user_id = owner, error = %e, "Failed to load mirrored session");
                return;
            }
        };

        let age = (Utc::now() - stored.updated_at).to_std().unwrap_or_default();
        if age >= self.sessions.timeout() {
            info!(user_id = owner, step = %stored.step, "Mirrored session expired");
            self.persist(owner, None).await;
            return;
        }

        match serde_json::from_value::<Session>(stored.payload) {
            Ok(mut session) => {
                if let Some(touched) = tokio::time::Instant::now().checked_sub(age) {
                    session.touched_at = touched;
                }
                info!(user_id = owner, flow = session.flow.name(), step = session.step.as_str(), "Restored mirrored session");
                **guard = Some(session);
            }
            Err(e) => {
                warn!(user_id = owner, error = %e, "Discarding unreadable mirrored session");
                self.persist(owner, None).await;
            }
        }
    }
}
