mod executor;

pub use executor::{ignore_interrupts, Executor};
