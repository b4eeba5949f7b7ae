//! Core config, errors, and dialogue session model for the kiosk voice gateway.

pub mod config;
pub mod error;
pub mod session;
