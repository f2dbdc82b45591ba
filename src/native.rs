// vaglx/src/native.rs
//
//! The abstract interface to the windowing system and OpenGL that the surface machinery drives.
//!
//! Everything in this crate reaches Xlib, GLX and GL through these traits. The real
//! implementation lives in `platform::unix::x11`; the unit tests drive an in-process model of the
//! same API.

use crate::extensions::ExtensionFunctions;
use crate::gl::types::{GLenum, GLfloat, GLint, GLsizei, GLuint};
use crate::WindowingApiError;

use std::fmt::{self, Debug, Formatter};
use std::os::raw::{c_int, c_ulong, c_void};
use std::ptr;

/// An X11 resource ID.
pub type XID = c_ulong;
/// An X11 drawable: a window or a pixmap.
pub type Drawable = XID;
/// An X11 pixmap.
pub type Pixmap = XID;
/// A GLX pixmap created on top of an X11 pixmap.
pub type GlxPixmap = XID;

/// A borrowed Xlib `Display` pointer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NativeDisplay(pub *mut c_void);

/// A GLX rendering context pointer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NativeContext(pub *mut c_void);

/// A GLX framebuffer configuration.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FbConfig(pub *mut c_void);

/// Geometry of an X11 drawable, as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub root: XID,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub border_width: u32,
    pub depth: u32,
}

impl NativeDisplay {
    #[inline]
    pub fn null() -> NativeDisplay {
        NativeDisplay(ptr::null_mut())
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl NativeContext {
    #[inline]
    pub fn null() -> NativeContext {
        NativeContext(ptr::null_mut())
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Debug for NativeDisplay {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "NativeDisplay({:p})", self.0)
    }
}

impl Debug for NativeContext {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "NativeContext({:p})", self.0)
    }
}

impl Debug for FbConfig {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "FbConfig({:p})", self.0)
    }
}

/// Xlib and GLX entry points.
///
/// Methods that may raise an asynchronous X protocol error do not report it themselves; callers
/// bracket them with `trap_errors()`/`untrap_errors()` (see `error::trap_x_errors`).
pub trait WindowingApi {
    /// The display every resource of this backend lives on.
    fn display(&self) -> NativeDisplay;
    /// The screen number surfaces are created on.
    fn screen(&self) -> c_int;
    fn root_window(&self) -> Drawable;
    /// Returns the depth of a window, or `None` if its attributes couldn't be fetched.
    fn window_depth(&self, window: Drawable) -> Option<u32>;

    /// Returns 0 on failure.
    fn create_pixmap(&self, drawable: Drawable, width: u32, height: u32, depth: u32) -> Pixmap;
    fn free_pixmap(&self, pixmap: Pixmap);
    fn get_geometry(&self, drawable: Drawable) -> Option<Geometry>;
    /// Round-trips to the server so that pending protocol errors are delivered.
    fn sync(&self);

    /// Starts collecting X protocol errors instead of letting them abort the process.
    fn trap_errors(&self);
    /// Stops collecting X protocol errors, returning the code of the last one caught since the
    /// matching `trap_errors()` call.
    fn untrap_errors(&self) -> Option<u8>;

    fn glx_extensions(&self) -> String;
    /// Looks up a GL or GLX entry point. Returns null if the symbol is unknown.
    fn get_proc_address(&self, symbol_name: &str) -> *const c_void;

    /// Returns the configurations matching a zero-terminated attribute list, best match first.
    fn choose_fb_config(&self, attributes: &[c_int]) -> Vec<FbConfig>;
    /// Returns every configuration of the screen.
    fn fb_configs(&self) -> Vec<FbConfig>;
    fn fb_config_attrib(&self, config: FbConfig, attribute: c_int)
                        -> Result<c_int, WindowingApiError>;

    fn query_context(&self, display: NativeDisplay, context: NativeContext, attribute: c_int)
                     -> Result<c_int, WindowingApiError>;
    /// Creates a direct RGBA context. Returns a null context on failure.
    fn create_new_context(&self, config: FbConfig, share_with: NativeContext) -> NativeContext;
    fn destroy_context(&self, display: NativeDisplay, context: NativeContext);
    fn current_display(&self) -> NativeDisplay;
    fn current_drawable(&self) -> Drawable;
    fn current_context(&self) -> NativeContext;
    fn make_current(&self, display: NativeDisplay, drawable: Drawable, context: NativeContext)
                    -> bool;

    /// Returns 0 on failure.
    fn create_glx_pixmap(&self, config: FbConfig, pixmap: Pixmap, attributes: &[c_int])
                         -> GlxPixmap;
    fn destroy_glx_pixmap(&self, glx_pixmap: GlxPixmap);

    /// `glXBindTexImageEXT`, through the resolved extension table.
    fn bind_tex_image(&self, functions: &ExtensionFunctions, glx_pixmap: GlxPixmap, buffer: c_int);
    /// `glXReleaseTexImageEXT`, through the resolved extension table.
    fn release_tex_image(&self,
                         functions: &ExtensionFunctions,
                         glx_pixmap: GlxPixmap,
                         buffer: c_int);
}

/// The OpenGL entry points used by the surface machinery.
///
/// All of them act on the context current on the calling thread. The framebuffer object calls go
/// through the extension table resolved by `extensions::ensure_extensions`.
pub trait GlApi {
    fn gl_extensions(&self) -> String;
    fn get_error(&self) -> GLenum;

    fn is_texture(&self, texture: GLuint) -> bool;
    fn is_enabled(&self, capability: GLenum) -> bool;
    fn enable(&self, capability: GLenum);
    fn disable(&self, capability: GLenum);
    fn get_integer(&self, parameter: GLenum) -> GLint;
    fn get_current_color(&self) -> [GLfloat; 4];
    fn get_tex_level_parameter(&self, target: GLenum, level: GLint, parameter: GLenum) -> GLint;

    fn gen_texture(&self) -> GLuint;
    fn delete_texture(&self, texture: GLuint);
    fn bind_texture(&self, target: GLenum, texture: GLuint);
    fn tex_parameter(&self, target: GLenum, parameter: GLenum, value: GLint);

    fn gen_framebuffer(&self, functions: &ExtensionFunctions) -> GLuint;
    fn delete_framebuffer(&self, functions: &ExtensionFunctions, framebuffer: GLuint);
    fn bind_framebuffer(&self, functions: &ExtensionFunctions, target: GLenum, framebuffer: GLuint);
    fn framebuffer_texture_2d(&self,
                              functions: &ExtensionFunctions,
                              target: GLenum,
                              attachment: GLenum,
                              texture_target: GLenum,
                              texture: GLuint,
                              level: GLint);
    fn check_framebuffer_status(&self, functions: &ExtensionFunctions, target: GLenum) -> GLenum;

    fn matrix_mode(&self, mode: GLenum);
    fn push_matrix(&self);
    fn pop_matrix(&self);
    fn load_identity(&self);
    fn viewport(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei);
    fn translate(&self, x: GLfloat, y: GLfloat, z: GLfloat);
    fn scale(&self, x: GLfloat, y: GLfloat, z: GLfloat);

    fn color(&self, color: [GLfloat; 4]);
    fn begin(&self, mode: GLenum);
    fn end(&self);
    fn tex_coord(&self, s: GLfloat, t: GLfloat);
    fn vertex(&self, x: GLint, y: GLint);
}

/// A complete backend: the windowing system plus the GL it renders with.
pub trait Backend: WindowingApi + GlApi {}

impl<T> Backend for T where T: WindowingApi + GlApi {}
