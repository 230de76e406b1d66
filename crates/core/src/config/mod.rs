pub mod sources;
pub mod store_config;
pub mod validation;

pub use sources::*;
pub use store_config::*;
pub use validation::*;
