// vaglx/src/platform/unix/mod.rs
//
//! Backends for Unix windowing systems.

pub mod x11;
