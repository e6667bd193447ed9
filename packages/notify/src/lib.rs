#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Snapshot comparison and notification logic.
//!
//! Takes two consecutive, already-annotated snapshots of one utility and
//! decides which outages are worth telling someone about. Everything here
//! is a pure function of its inputs; delivering the resulting text is left
//! to the caller.

pub mod comparator;
pub mod history;
pub mod message;

pub use comparator::{SnapshotComparison, compare_snapshots, meets_primary, meets_thresholds};
pub use message::{Notification, NotificationKind, notifications, render_notification};
