//! Integration tests for gamesearch.

pub mod catalog_test;
pub mod fixture;
pub mod store_test;
