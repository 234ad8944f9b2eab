pub mod api;
pub mod config;
pub mod error;
pub mod estimation;
pub mod report;
pub mod source;
pub mod state;
