//! Shared helpers for unit tests; `tests/support` includes the socket guard too.

pub mod socket_guard;
