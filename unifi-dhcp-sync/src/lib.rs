//! Keep UniFi DHCP reservations in line with version-controlled desired state.
//!
//! - [`config`]: TOML configuration and the per-run [`config::Workspace`]
//! - [`controller`]: UniFi controller client: observed-state fetcher and apply driver
//! - [`report`]: colored terminal rendering of plans, run reports and listings
//!
//! Planning and convergence live in `reservation_diff_core`.

pub mod config;
pub mod controller;
pub mod report;
