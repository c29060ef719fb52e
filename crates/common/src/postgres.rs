mod client;
mod vehicle_position_repository;

pub use client::*;
pub use vehicle_position_repository::*;
