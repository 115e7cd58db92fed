//! Tracing subscriber setup

mod logger;

pub use logger::init_tracing;
