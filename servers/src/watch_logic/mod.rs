pub mod config;
pub mod logger;
pub mod notify;
pub mod report;
