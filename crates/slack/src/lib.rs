//! Slack interface for the lagertool borrow bot.
//!
//! - **Ingress** (`payload`, `ingress`) - decoding of Events API, slash command and
//!   interactivity callbacks, then dispatch and reply delivery
//! - **Slash command** (`commands`) - `/borrow`, `/borrow search a, b`, `/borrow cancel`
//! - **Events** (`events`) - direct messages and the due-date picker callback
//! - **Block Kit** (`blocks`) - message builders, including the datepicker element
//! - **Web API** (`web`) - `chat.postMessage`, `conversations.open`, `users.info`
//!
//! # Architecture
//!
//! ```text
//! HTTP callback → payload → EventDispatcher → handler → service trait (server)
//!                                                        ↓
//!                       MessagePoster ← Vec<Reply> ← BorrowWorkflow
//! ```
//!
//! The service traits (`BorrowCommandService`, `DirectMessageService`,
//! `BlockActionService`) are implemented by the server, which owns the workflow.

pub mod blocks;
pub mod commands;
pub mod events;
pub mod ingress;
pub mod payload;
pub mod web;
