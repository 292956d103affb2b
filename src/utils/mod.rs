//! The `utils` module collects pieces shared across the whole relay:
//! error types and logging setup.

pub mod error;
pub mod logging;
