pub mod config;
pub mod events;
pub mod executor;
pub mod model;
pub mod server;
pub mod survey;
pub mod traits;

// Re-export common types for convenience
pub use config::*;
pub use events::*;
pub use executor::*;
pub use model::*;
pub use traits::*;
