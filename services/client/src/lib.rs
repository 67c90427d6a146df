pub mod adapters;
pub mod capture;
pub mod config;
pub mod error;
pub mod session;
