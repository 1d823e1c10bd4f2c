//! Built-in environments for demos and smoke runs.

pub mod corridor;

pub use corridor::Corridor;
