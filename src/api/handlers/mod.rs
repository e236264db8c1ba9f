pub mod health;
pub mod jobs;
pub mod types;
pub mod upload;

pub use types::*;
