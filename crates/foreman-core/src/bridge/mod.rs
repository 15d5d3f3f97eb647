//! Issue-tracker bridge: bidirectional sync between task files and an
//! external ticket system.
//!
//! Ports-and-adapters: [`ports::IssueTracker`] is the seam, [`gh::GhTracker`]
//! the production adapter, and tests drive [`sync::Bridge`] with in-memory
//! fakes.

pub mod gh;
pub mod labels;
pub mod ports;
pub mod sync;

pub use ports::{IssueState, IssueTracker, RemoteIssue, TrackerError};
pub use sync::{Bridge, SyncError, SyncReport};
