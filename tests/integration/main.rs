//! Integration tests for Profile-Harvest
//!
//! These tests drive whole runs through `RunController` with scripted
//! renderers, plus one end-to-end run against a wiremock server.

mod common;
mod http_tests;
mod resume_tests;
mod retry_tests;
