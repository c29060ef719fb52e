mod client;
mod position_log_repository;

pub use client::*;
pub use position_log_repository::*;
