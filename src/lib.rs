// vaglx/src/lib.rs
//
//! GLX interop for hardware video decoding.
//!
//! This crate lets a client render decoded video frames into an OpenGL texture on X11. Frames are
//! presented into an X11 pixmap, which `GLX_EXT_texture_from_pixmap` turns into the image of a
//! texture without a CPU-side copy. When a frame must end up in the caller's own texture rather
//! than merely be viewed, it is drawn into that texture through a framebuffer object.
//!
//! The video decoder is abstracted by the `DecodeBackend` trait, and Xlib/GLX/GL by the
//! `Backend` trait. The `sm-x11` feature provides the real backend, `Connection`.

pub mod platform;

pub mod error;
pub use crate::error::{Error, Status, WindowingApiError};

pub mod context;
pub use crate::context::ContextState;

pub mod decode;
pub use crate::decode::{DecodeBackend, DecodeSurface, DecodeSurfaceID, OutputSurface};
pub use crate::decode::PresentFlags;

mod device;
pub use crate::device::Device;

pub mod extensions;
pub use crate::extensions::{ExtensionFunctions, ExtensionStatus, Extensions};

pub mod native;
pub use crate::native::{Backend, GlApi, WindowingApi};

mod surface;
pub use crate::surface::{GlSurface, SurfaceID};

mod framebuffer;
mod gl_utils;
mod handle;

#[cfg(x11)]
pub use crate::platform::unix::x11::connection::Connection;

#[allow(clippy::all, dead_code, non_upper_case_globals, unused_imports)]
pub mod gl {
    include!(concat!(env!("OUT_DIR"), "/gl_bindings.rs"));
}

// Only the enumerants are used. GLX calls go through `x11_dl::glx`, so the generated `Glx`
// loader is never instantiated.
#[allow(clippy::all, dead_code, non_camel_case_types, non_upper_case_globals, unused_imports)]
mod glx {
    include!(concat!(env!("OUT_DIR"), "/glx_bindings.rs"));
}

#[cfg(test)]
mod tests;
