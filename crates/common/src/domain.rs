mod in_memory;
mod result;
mod telemetry_provider;
mod vehicle_position;

pub use in_memory::*;
pub use result::*;
pub use telemetry_provider::*;
pub use vehicle_position::*;
