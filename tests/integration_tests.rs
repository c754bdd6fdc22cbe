//! Integration tests for gamesearch.
//!
//! Each test builds its own SQLite database in a temporary directory.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
