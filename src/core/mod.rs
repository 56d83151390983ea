pub mod config;
pub mod error;
pub mod types;

pub use config::ManagerConfig;
pub use error::{AiError, Result};
pub use types::SideNumber;
