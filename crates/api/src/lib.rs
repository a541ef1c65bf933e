//! Marketplace API library.
//!
//! The HTTP server lives in `main.rs`; everything it wires together is
//! exposed here so it can be tested and reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
