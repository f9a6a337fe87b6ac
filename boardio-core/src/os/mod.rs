//! Operating-system facade
//!
//! Tasks, message queues, recursive mutexes and counting semaphores for
//! application code and for the controllers that need them internally.
//!
//! Every blocking call takes a [`Timeout`](boardio_hal::Timeout):
//! `NoWait` polls once, `Forever` blocks, `Millis(n)` blocks for at most
//! `n` milliseconds. In interrupt context only `NoWait` is accepted, and
//! mutexes refuse every operation. The primitives release their resources
//! when the last clone is dropped.

mod mq;
mod mutex;
mod semaphore;
mod task;

pub use mq::MessageQueue;
pub use mutex::Mutex;
pub use semaphore::Semaphore;
pub use task::{yield_now, Priority, Task, TaskBuilder, MAX_TASK_NAME_LEN};
