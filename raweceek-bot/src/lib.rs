pub mod announce;
pub mod calendar;
pub mod config;
pub mod discord;
pub mod engine;
mod error;
pub mod locale;
mod persist;
pub mod schedule;
pub mod store;

pub use error::{Error, Result};
