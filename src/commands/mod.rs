//! Command handlers for the CLI
//!
//! - `run`: start the topic consumers and block until a shutdown signal
//! - `health`: broker and database reachability
//! - `publish`: produce a hand-written event

pub mod health;
pub mod publish;
pub mod run;
