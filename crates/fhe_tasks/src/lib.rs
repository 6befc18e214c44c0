//! Named commands for the FHE contract suite.
//!
//! Build a [`TaskContext`], turn user input into a [`Command`] with the
//! validated argument types in [`args`], and hand it to [`run`].

pub mod args;
pub mod commands;
pub mod context;
pub mod error;

pub use args::{Amount, DeployTarget};
pub use commands::{Command, CommandReport, Outcome, Stopwatch, run};
pub use context::TaskContext;
pub use error::TaskError;
