//! Integration tests for docsync-remote
//!
//! Uses wiremock to simulate the automation endpoints and verifies the
//! HTTP remote client and connector end to end.

mod common;

mod test_auth;
mod test_errors;
mod test_operations;
