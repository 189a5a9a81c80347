//! Utility functions shared across layers.
//!
//! - [`key_generator`] - Random API key generation
//! - [`client_ip`] - Client address extraction from requests

pub mod client_ip;
pub mod key_generator;
