//! Library crate for portpulse exposing reusable modules.
pub mod enrich;
pub mod netmap;
pub mod ports;
pub mod report;
pub mod risk;
pub mod scanner;
pub mod server;
pub mod types;
