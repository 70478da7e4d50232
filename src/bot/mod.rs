//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `commands`: Command enum and the menu registered with Telegram
//! - `message_handler`: Converts Telegram messages into controller events and sends replies
//! - `ui_builder`: Formats summaries, listings and prompts
//! - `dialogue_manager`: Runs the multi-step command flows

pub mod commands;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use message_handler::{message_handler, register_commands, TelegramOutbox};

pub use commands::Command;
pub use dialogue_manager::{Event, FlowController, Inbound, Outbox, Reply};
