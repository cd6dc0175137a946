pub mod config;
pub mod error;
pub mod types;

pub use error::{EdsignError, EdsignResult};
pub use types::KeyNumber;
