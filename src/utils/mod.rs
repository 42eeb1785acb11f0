pub mod alerts;
pub mod error;
pub mod logging;
