// vaglx/src/platform/unix/x11/mod.rs
//
//! The Xlib/GLX backend.

pub mod connection;
mod error;
