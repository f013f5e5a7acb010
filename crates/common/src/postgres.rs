mod client;
mod config;
mod event_repository;
mod migrations;

pub use client::*;
pub use config::*;
pub use event_repository::*;
pub use migrations::*;
