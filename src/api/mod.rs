//! HTTP control surface
//!
//! A thin operator console over the scheduler: read status, refresh the
//! configuration view, start a run, reset, dismiss the error banner.

mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;

pub use error::ApiError;
pub use server::{router, run};
