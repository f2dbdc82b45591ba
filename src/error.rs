// vaglx/src/error.rs
//
//! Various errors that methods can produce, and the status codes they map to.

use crate::gl::types::GLenum;
use crate::native::WindowingApi;

use log::warn;
use std::fmt::{self, Display, Formatter};

/// Various errors that methods can produce.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The connection to the X server couldn't be opened, or Xlib or libGL couldn't be loaded.
    ConnectionFailed,
    /// A GL or GLX extension necessary for texture-from-pixmap rendering isn't supported.
    ///
    /// Once this has been reported, it is reported again for the lifetime of the device.
    RequiredExtensionUnavailable,
    /// Looking up an extension entry point failed.
    GLFunctionNotFound(&'static str),
    /// Only `GL_TEXTURE_2D` textures can back a surface.
    UnsupportedTextureTarget(GLenum),
    /// The texture name doesn't refer to a live GL texture object.
    InvalidTexture,
    /// The texture's internal format isn't an RGBA format.
    UnsupportedTextureFormat(GLenum),
    /// The texture has no storage once the border is accounted for.
    EmptyTexture,
    /// The surface handle doesn't refer to a live surface.
    InvalidSurface,
    /// The decode surface doesn't exist, or the surface has no decode surface associated.
    InvalidDecodeSurface,
    /// The system couldn't create a GLX context.
    ContextCreationFailed(WindowingApiError),
    /// The system couldn't make a GLX context current.
    MakeCurrentFailed(WindowingApiError),
    /// No framebuffer configuration matched the requested attributes.
    NoPixelFormatFound,
    /// The X server refused to create or describe a pixmap.
    PixmapCreationFailed(WindowingApiError),
    /// The pixmap was created with a depth that can't be bound to a texture.
    UnsupportedPixmapDepth(u32),
    /// The GLX pixmap backing a surface couldn't be created.
    GlxPixmapCreationFailed(WindowingApiError),
    /// Binding the GLX pixmap to the surface texture failed.
    BindPixmapFailed(WindowingApiError),
    /// Releasing the GLX pixmap from the surface texture failed.
    ReleasePixmapFailed(WindowingApiError),
    /// The framebuffer object isn't complete.
    IncompleteFramebuffer(GLenum),
    /// A GL call raised an error.
    GLError(GLenum),
    /// Surface creation failed after its arguments were validated.
    SurfaceCreationFailed(Box<Error>),
    /// The video decoder reported a failure.
    DecoderFailed(Status),
}

/// Abstraction of the errors that Xlib and GLX report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowingApiError {
    /// Miscellaneous error.
    Failed,
    /// X11: A parameter has the wrong type or range for the request.
    BadMatch,
    /// X11: A drawable argument doesn't name a window or pixmap.
    BadDrawable,
    /// X11: A pixmap argument doesn't name a pixmap.
    BadPixmap,
    /// X11: The server ran out of resources.
    BadAlloc,
    /// X11: A numeric argument is out of range.
    BadValue,
    /// GLX: The context is invalid.
    BadContext,
    /// GLX: Attribute to get is bad.
    BadAttribute,
    /// GLX: Invalid framebuffer configuration.
    BadPixelFormat,
}

/// The status code each public operation reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    InvalidParameter,
    InvalidSurface,
    AllocationFailed,
    OperationFailed,
}

impl Error {
    /// Returns the status code this error is reported as.
    pub fn status(&self) -> Status {
        match *self {
            Error::UnsupportedTextureTarget(_) | Error::InvalidTexture => Status::InvalidParameter,
            Error::InvalidSurface | Error::InvalidDecodeSurface => Status::InvalidSurface,
            Error::ContextCreationFailed(_) |
            Error::SurfaceCreationFailed(_) |
            Error::IncompleteFramebuffer(_) |
            Error::NoPixelFormatFound |
            Error::PixmapCreationFailed(_) |
            Error::UnsupportedPixmapDepth(_) |
            Error::GlxPixmapCreationFailed(_) |
            Error::UnsupportedTextureFormat(_) |
            Error::EmptyTexture => Status::AllocationFailed,
            Error::ConnectionFailed |
            Error::RequiredExtensionUnavailable |
            Error::GLFunctionNotFound(_) |
            Error::MakeCurrentFailed(_) |
            Error::BindPixmapFailed(_) |
            Error::ReleasePixmapFailed(_) |
            Error::GLError(_) => Status::OperationFailed,
            Error::DecoderFailed(status) => status,
        }
    }
}

impl Display for Error {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        match *self {
            Error::ConnectionFailed => write!(formatter, "couldn't connect to the X server"),
            Error::RequiredExtensionUnavailable => {
                write!(formatter, "texture-from-pixmap or framebuffer object support is missing")
            }
            Error::GLFunctionNotFound(name) => write!(formatter, "`{}` couldn't be resolved", name),
            Error::UnsupportedTextureTarget(target) => {
                write!(formatter, "unsupported texture target 0x{:x}", target)
            }
            Error::InvalidTexture => write!(formatter, "not a texture object"),
            Error::UnsupportedTextureFormat(format) => {
                write!(formatter, "unsupported internal texture format 0x{:x}", format)
            }
            Error::EmptyTexture => write!(formatter, "texture has no storage"),
            Error::InvalidSurface => write!(formatter, "invalid surface"),
            Error::InvalidDecodeSurface => write!(formatter, "invalid decode surface"),
            Error::ContextCreationFailed(err) => write!(formatter, "context creation failed: {:?}", err),
            Error::MakeCurrentFailed(err) => write!(formatter, "make current failed: {:?}", err),
            Error::NoPixelFormatFound => write!(formatter, "no matching framebuffer configuration"),
            Error::PixmapCreationFailed(err) => write!(formatter, "pixmap creation failed: {:?}", err),
            Error::UnsupportedPixmapDepth(depth) => {
                write!(formatter, "pixmap depth {} can't be bound to a texture", depth)
            }
            Error::GlxPixmapCreationFailed(err) => {
                write!(formatter, "GLX pixmap creation failed: {:?}", err)
            }
            Error::BindPixmapFailed(err) => write!(formatter, "failed to bind pixmap: {:?}", err),
            Error::ReleasePixmapFailed(err) => write!(formatter, "failed to release pixmap: {:?}", err),
            Error::IncompleteFramebuffer(status) => {
                write!(formatter, "framebuffer incomplete (status 0x{:x})", status)
            }
            Error::GLError(error) => write!(formatter, "GL error: {}", gl_error_string(error)),
            Error::SurfaceCreationFailed(ref cause) => {
                write!(formatter, "surface creation failed: {}", cause)
            }
            Error::DecoderFailed(status) => write!(formatter, "decoder failed with {:?}", status),
        }
    }
}

impl std::error::Error for Error {}

impl Status {
    /// Folds the result of an operation into the status code it reports.
    pub fn from_result<T>(result: &Result<T, Error>) -> Status {
        match *result {
            Ok(_) => Status::Success,
            Err(ref error) => error.status(),
        }
    }
}

pub(crate) fn x_error_to_windowing_api_error(x_error: u8) -> WindowingApiError {
    // Core protocol error codes from `X.h`.
    match x_error {
        2 => WindowingApiError::BadValue,
        4 => WindowingApiError::BadPixmap,
        8 => WindowingApiError::BadMatch,
        9 => WindowingApiError::BadDrawable,
        11 => WindowingApiError::BadAlloc,
        _ => WindowingApiError::Failed,
    }
}

/// Runs `f` with X protocol errors trapped.
///
/// A protocol error raised while `f` runs turns into an `Err`; the value `f` returned is dropped
/// in that case.
pub(crate) fn trap_x_errors<W, F, R>(api: &W, f: F) -> Result<R, WindowingApiError>
                                     where W: WindowingApi + ?Sized, F: FnOnce() -> R {
    api.trap_errors();
    let result = f();
    match api.untrap_errors() {
        None => Ok(result),
        Some(x_error) => {
            warn!("X protocol error {} trapped", x_error);
            Err(x_error_to_windowing_api_error(x_error))
        }
    }
}

/// Returns a string representation of an OpenGL error.
pub fn gl_error_string(error: GLenum) -> &'static str {
    use crate::gl;
    match error {
        gl::NO_ERROR => "no error",
        gl::INVALID_ENUM => "invalid enumerant",
        gl::INVALID_VALUE => "invalid value",
        gl::INVALID_OPERATION => "invalid operation",
        gl::STACK_OVERFLOW => "stack overflow",
        gl::STACK_UNDERFLOW => "stack underflow",
        gl::OUT_OF_MEMORY => "out of memory",
        gl::INVALID_FRAMEBUFFER_OPERATION_EXT => "invalid framebuffer operation",
        _ => "unknown",
    }
}
