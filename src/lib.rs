//! silverd: a single-instance scheduler over an Obsidian-style vault.
//!
//! The daemon watches a vault laid out as Inbox, Needs_Action, Plans, and
//! Done directories. Each iteration sweeps the Inbox into report notes, then
//! turns actionable notes into plans, either through built-in steps or
//! configured external scripts. A file lock guarantees a single running
//! instance; approvals for sensitive actions go through Markdown documents a
//! human edits in place.

pub mod approval;
pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod logger;
pub mod runner;
pub mod scheduler;
pub mod vault;

pub use error::{Result, SilverdError};
