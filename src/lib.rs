// ABOUTME: Library crate for rbox exposing the session engine for the binary and tests

pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod session;
pub mod sync;
