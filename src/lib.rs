pub mod app;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod highlight;
pub mod records;
pub mod schedule;
pub mod search;
pub mod store;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use records::Record;
pub use schedule::{compute_due, DueRecord, Interval};
