//! mailpush — SMTP-to-push-notification gateway.
//!
//! Accepts email over SMTP addressed to `<prefix><topic>@<domain>`,
//! extracts a title (Subject) and body (best readable text part) from
//! the message, and publishes them to a pub/sub HTTP endpoint.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod notification;
pub mod server;
pub mod session;
pub mod topic;
