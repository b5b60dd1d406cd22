//! Route handlers, one module per resource.

pub mod ai;
pub mod auth;
pub mod calendar_events;
pub mod call_logs;
pub mod cases;
pub mod documents;
pub mod health;
pub mod users;

mod multipart;
