pub mod app;
pub mod batch;
pub mod catalog;
pub mod client;
pub mod config;
pub mod progress;
pub mod shared;
pub mod sink;
