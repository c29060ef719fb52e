pub mod domain;
pub mod http;
pub mod position_cache;
pub mod provider;

pub use domain::*;
pub use http::*;
pub use position_cache::*;
pub use provider::*;
