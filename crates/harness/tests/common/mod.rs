//! Common test utilities for harness integration tests.
//!
//! - [`stub_server`] - in-process stand-in for the resource server
//! - [`harness`] - suite construction against a running stub

#![allow(dead_code)]

pub mod harness;
pub mod stub_server;
