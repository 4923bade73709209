pub mod browser;
pub mod carrier;
pub mod config;
pub mod error;
pub mod eta;
pub mod pipeline;
pub mod report;
pub mod sheet;
