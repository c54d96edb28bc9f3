pub mod applications;
pub mod catalog;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod storage;
pub mod utils;

pub use error::{Error, Result};
