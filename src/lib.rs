// Search Bench - Library root for testing

pub mod bench;
pub mod cluster;
pub mod config;
pub mod error;
