#![doc = " Thread pool internals for Workhorse."]

pub mod factory;
pub mod interrupt;
pub mod pool;
mod worker;

pub use factory::{NamedThreadFactory, ThreadFactory};
pub use interrupt::is_interrupted;
pub use pool::WorkerPool;
