//! Task dispatch.
//!
//! Manual and periodic triggers put [`Task`]s on a [`TaskQueue`]; the
//! [`TaskRunner`] executes them and acknowledges each delivery only after
//! the work is done. Stage preconditions make redelivery safe.

mod queue;
mod runner;
mod scheduler;

pub use queue::{Delivery, InMemoryTaskQueue, Task, TaskQueue};
pub use runner::{TaskOutcome, TaskRunner};
pub use scheduler::{Scheduler, Triggers};
