//! Cooperative main-loop scheduler
//!
//! Drives the application's iteration loop: a fixed-cadence blocking mode,
//! or a multiplexed async mode where several cooperatively-suspending tasks
//! share the single thread of control. Either way, cancellation is checked
//! only at iteration boundaries and the cleanup hook is guaranteed to run.

pub mod main_loop;
pub mod tasks;

pub use main_loop::{Hooks, LoopError, MainLoop, RunOptions, RunState};
pub use tasks::TaskHandle;
