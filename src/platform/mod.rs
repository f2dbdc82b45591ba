// vaglx/src/platform/mod.rs
//
//! Implementations of the windowing and GL interfaces.

#[cfg(x11)]
pub mod unix;

#[cfg(any(test, feature = "sm-test"))]
pub mod mock;
