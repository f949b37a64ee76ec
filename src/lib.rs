//! Intake Assist — guided intake chat for a water cooperative.
//!
//! Walks a user through an emergency report or an account lookup one
//! validated answer at a time, then submits the collected record to the
//! cooperative's backend.

pub mod config;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod routes;
pub mod session;
pub mod transcript;
