//! Admission state machine and the conveyor handle built on top of it.

mod conveyor;
mod machine;

pub use conveyor::{Conveyor, DEFAULT_BUS_CAPACITY};
