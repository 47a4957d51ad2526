//! Household status monitor: tracks how long it has been since recurring
//! events (the dog going outside, the dog pooping) last happened, grades the
//! delay as normal, warning or overdue, and publishes the worst grade.
pub mod app;
pub mod clock;
pub mod config;
pub mod console;
pub mod coordinator;
pub mod display;
pub mod error;
pub mod event;
pub mod event_log;
pub mod paths;
pub mod publish;
pub mod severity;
pub mod ticker;
pub mod tracker;
