//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod fake_site;
#[path = "../../src/test_support/socket_guard.rs"]
pub mod socket_guard;
