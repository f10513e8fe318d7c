//! Test utilities for scanload.
//!
//! This crate provides an in-process fake of the explorer API and helpers for capturing logs.
//! See the modules for all available utilities.

pub mod server;
pub mod tracing;
