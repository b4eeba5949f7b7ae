//! HTTP gateway for the ordering kiosk.
//!
//! Routes speech uploads, synthesis requests, and dialogue turns to their
//! upstream clients and serves the static kiosk screens.

pub mod dialogue;
pub mod error;
pub mod server;
pub mod state;
pub mod stt;
pub mod tts;

pub use server::{router, start_gateway};
pub use state::GatewayState;
