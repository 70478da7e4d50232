//! # Time Cop
//!
//! A Telegram bot that turns natural-language descriptions of a work day
//! into structured time records, stores them in PostgreSQL, and exports
//! monthly spreadsheet reports.

pub mod bot;
pub mod config;
pub mod dates;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod extraction;
pub mod health;
pub mod localization;
pub mod models;
pub mod rate_limit;
pub mod report;
pub mod retry;
pub mod sessions;
pub mod store;
