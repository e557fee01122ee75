//! catch-that-phish: replies to forwarded mail with a phishing verdict.

pub mod classifier;
pub mod config;
pub mod error;
pub mod mail;
pub mod poller;
pub mod routes;
pub mod scheduler;
