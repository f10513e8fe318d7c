//! Load test scenario for a block explorer API.
//!
//! Each iteration of the [`Scenario`] picks an account address and an API endpoint at random,
//! `POST`s a paged list request for that account, and checks that the response succeeded and
//! listed at least one entry. Addresses come from a *standard* pool of accounts with a moderate
//! transfer history, or in *hard mode* from a pool of accounts with tens of thousands of
//! transfers, which stresses heavier query paths.
//!
//! Scheduling virtual users, aggregating request metrics and judging thresholds is the job of an
//! external load-test harness. The ramp [`profile`] and thresholds are carried in the
//! configuration so they can be handed to that harness. For local checks, [`run()`] drives the
//! scenario with a fixed number of virtual users.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod config;
pub mod http;
pub mod metrics;
pub mod observability;
pub mod profile;
pub mod run;
pub mod scenario;
pub mod target;

pub use crate::config::Config;
pub use crate::run::run;
pub use crate::scenario::{Scenario, VirtualUser};
pub use crate::target::TargetSelector;
