pub mod page;
pub mod record;

// Re-exports for convenience
pub use page::MonitoredPage;
pub use record::Record;
