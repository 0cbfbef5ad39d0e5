pub mod api;
pub mod config;
pub mod processor;
pub mod storage;
