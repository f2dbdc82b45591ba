// vaglx/src/platform/unix/x11/connection.rs
//
//! A connection to an X server, with Xlib, GLX and OpenGL loaded at runtime.

use crate::extensions::ExtensionFunctions;
use crate::gl::types::{GLenum, GLfloat, GLint, GLsizei, GLuint};
use crate::gl::{self, Gl};
use crate::native::{Drawable, FbConfig, Geometry, GlApi, GlxPixmap, NativeContext};
use crate::native::{NativeDisplay, Pixmap, WindowingApi};
use crate::{glx, Error, WindowingApiError};
use super::error;

use log::{debug, warn};
use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::mem;
use std::os::raw::{c_char, c_int, c_uchar, c_void};
use std::ptr;
use std::slice;
use x11_dl::glx::{GLXContext, GLXDrawable, GLXFBConfig, Glx, GLX_BAD_ATTRIBUTE, GLX_BAD_CONTEXT};
use x11_dl::xlib::{self, Display, XErrorEvent, XWindowAttributes, Xlib};

type XErrorHandler = Option<unsafe extern "C" fn(*mut Display, *mut XErrorEvent) -> c_int>;
type BindTexImageFn = unsafe extern "C" fn(*mut Display, GLXDrawable, c_int, *const c_int);
type ReleaseTexImageFn = unsafe extern "C" fn(*mut Display, GLXDrawable, c_int);
type GenFramebuffersFn = unsafe extern "system" fn(GLsizei, *mut GLuint);
type DeleteFramebuffersFn = unsafe extern "system" fn(GLsizei, *const GLuint);
type BindFramebufferFn = unsafe extern "system" fn(GLenum, GLuint);
type FramebufferTexture2DFn = unsafe extern "system" fn(GLenum, GLenum, GLenum, GLuint, GLint);
type CheckFramebufferStatusFn = unsafe extern "system" fn(GLenum) -> GLenum;

/// A display connection plus the entry points needed to drive it.
pub struct Connection {
    xlib: Xlib,
    glx: Glx,
    gl: Gl,
    display: *mut Display,
    screen: c_int,
    owns_display: bool,
    previous_error_handler: Cell<Option<XErrorHandler>>,
}

impl Connection {
    /// Connects to the display named by the `DISPLAY` environment variable.
    pub fn new() -> Result<Connection, Error> {
        let xlib = Xlib::open().map_err(|_| Error::ConnectionFailed)?;
        let display = unsafe { (xlib.XOpenDisplay)(ptr::null()) };
        if display.is_null() {
            return Err(Error::ConnectionFailed);
        }

        let screen = unsafe { (xlib.XDefaultScreen)(display) };
        Connection::with_xlib(xlib, display, screen, true).map_err(|(err, xlib)| {
            unsafe {
                (xlib.XCloseDisplay)(display);
            }
            err
        })
    }

    /// Wraps a display owned by someone else, such as the embedding video driver.
    ///
    /// If `screen` is `None`, the default screen of the display is used.
    ///
    /// # Safety
    ///
    /// `display` must be a live Xlib `Display` that outlives the returned connection.
    pub unsafe fn from_display(display: NativeDisplay, screen: Option<c_int>)
                               -> Result<Connection, Error> {
        if display.is_null() {
            return Err(Error::ConnectionFailed);
        }

        let xlib = Xlib::open().map_err(|_| Error::ConnectionFailed)?;
        let display = display.0 as *mut Display;
        let screen = match screen {
            Some(screen) => screen,
            None => (xlib.XDefaultScreen)(display),
        };
        Connection::with_xlib(xlib, display, screen, false).map_err(|(err, _)| err)
    }

    fn with_xlib(xlib: Xlib, display: *mut Display, screen: c_int, owns_display: bool)
                 -> Result<Connection, (Error, Xlib)> {
        let glx = match Glx::open() {
            Ok(glx) => glx,
            Err(_) => return Err((Error::ConnectionFailed, xlib)),
        };
        let gl = Gl::load_with(|symbol_name| get_proc_address(&glx, symbol_name));

        debug!("connected to X display {:p}, screen {}", display, screen);
        Ok(Connection {
            xlib,
            glx,
            gl,
            display,
            screen,
            owns_display,
            previous_error_handler: Cell::new(None),
        })
    }

    #[inline]
    pub fn native_display(&self) -> NativeDisplay {
        NativeDisplay(self.display as *mut c_void)
    }

    fn collect_fb_configs(&self, configs: *mut GLXFBConfig, count: c_int) -> Vec<FbConfig> {
        if configs.is_null() {
            return vec![];
        }
        unsafe {
            let fb_configs = slice::from_raw_parts(configs, count.max(0) as usize)
                .iter()
                .map(|&config| FbConfig(config as *mut c_void))
                .collect();
            (self.xlib.XFree)(configs as *mut c_void);
            fb_configs
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.owns_display && !self.display.is_null() {
            unsafe {
                (self.xlib.XCloseDisplay)(self.display);
            }
            self.display = ptr::null_mut();
        }
    }
}

fn get_proc_address(glx: &Glx, symbol_name: &str) -> *const c_void {
    let symbol_name = match CString::new(symbol_name) {
        Ok(symbol_name) => symbol_name,
        Err(_) => return ptr::null(),
    };
    unsafe {
        match (glx.glXGetProcAddress)(symbol_name.as_ptr() as *const c_uchar) {
            Some(function) => function as *const c_void,
            None => ptr::null(),
        }
    }
}

fn glx_error_to_windowing_api_error(glx_error: c_int) -> WindowingApiError {
    match glx_error {
        GLX_BAD_ATTRIBUTE => WindowingApiError::BadAttribute,
        GLX_BAD_CONTEXT => WindowingApiError::BadContext,
        _ => WindowingApiError::Failed,
    }
}

impl WindowingApi for Connection {
    #[inline]
    fn display(&self) -> NativeDisplay {
        self.native_display()
    }

    #[inline]
    fn screen(&self) -> c_int {
        self.screen
    }

    fn root_window(&self) -> Drawable {
        unsafe { (self.xlib.XRootWindow)(self.display, self.screen) }
    }

    fn window_depth(&self, window: Drawable) -> Option<u32> {
        unsafe {
            let mut attributes: XWindowAttributes = mem::zeroed();
            if (self.xlib.XGetWindowAttributes)(self.display, window, &mut attributes) == 0 {
                return None;
            }
            Some(attributes.depth as u32)
        }
    }

    fn create_pixmap(&self, drawable: Drawable, width: u32, height: u32, depth: u32) -> Pixmap {
        unsafe { (self.xlib.XCreatePixmap)(self.display, drawable, width, height, depth) }
    }

    fn free_pixmap(&self, pixmap: Pixmap) {
        unsafe {
            (self.xlib.XFreePixmap)(self.display, pixmap);
        }
    }

    fn get_geometry(&self, drawable: Drawable) -> Option<Geometry> {
        let mut geometry = Geometry {
            root: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            border_width: 0,
            depth: 0,
        };
        let status = unsafe {
            (self.xlib.XGetGeometry)(self.display,
                                     drawable,
                                     &mut geometry.root,
                                     &mut geometry.x,
                                     &mut geometry.y,
                                     &mut geometry.width,
                                     &mut geometry.height,
                                     &mut geometry.border_width,
                                     &mut geometry.depth)
        };
        if status == 0 {
            None
        } else {
            Some(geometry)
        }
    }

    fn sync(&self) {
        unsafe {
            (self.xlib.XSync)(self.display, xlib::False);
        }
    }

    fn trap_errors(&self) {
        // Errors from earlier requests belong to whoever made them.
        self.sync();
        error::reset_last_error();
        unsafe {
            let previous = (self.xlib.XSetErrorHandler)(Some(error::xlib_error_handler));
            self.previous_error_handler.set(Some(previous));
        }
    }

    fn untrap_errors(&self) -> Option<u8> {
        self.sync();
        if let Some(previous) = self.previous_error_handler.take() {
            unsafe {
                (self.xlib.XSetErrorHandler)(previous);
            }
        }

        let error_code = error::take_last_error();
        if let Some(error_code) = error_code {
            debug!("caught X error {} ({})",
                   error_code,
                   error::error_text(&self.xlib, self.display, error_code));
        }
        error_code
    }

    fn glx_extensions(&self) -> String {
        unsafe {
            let extensions = (self.glx.glXQueryExtensionsString)(self.display, self.screen);
            if extensions.is_null() {
                return String::new();
            }
            CStr::from_ptr(extensions).to_string_lossy().into_owned()
        }
    }

    #[inline]
    fn get_proc_address(&self, symbol_name: &str) -> *const c_void {
        get_proc_address(&self.glx, symbol_name)
    }

    fn choose_fb_config(&self, attributes: &[c_int]) -> Vec<FbConfig> {
        unsafe {
            let mut count = 0;
            let configs = (self.glx.glXChooseFBConfig)(self.display,
                                                       self.screen,
                                                       attributes.as_ptr(),
                                                       &mut count);
            self.collect_fb_configs(configs, count)
        }
    }

    fn fb_configs(&self) -> Vec<FbConfig> {
        unsafe {
            let mut count = 0;
            let configs = (self.glx.glXGetFBConfigs)(self.display, self.screen, &mut count);
            self.collect_fb_configs(configs, count)
        }
    }

    fn fb_config_attrib(&self, config: FbConfig, attribute: c_int)
                        -> Result<c_int, WindowingApiError> {
        unsafe {
            let mut value = 0;
            match (self.glx.glXGetFBConfigAttrib)(self.display,
                                                  config.0 as GLXFBConfig,
                                                  attribute,
                                                  &mut value) {
                0 => Ok(value),
                glx_error => Err(glx_error_to_windowing_api_error(glx_error)),
            }
        }
    }

    fn query_context(&self, display: NativeDisplay, context: NativeContext, attribute: c_int)
                     -> Result<c_int, WindowingApiError> {
        unsafe {
            let mut value = 0;
            match (self.glx.glXQueryContext)(display.0 as *mut Display,
                                             context.0 as GLXContext,
                                             attribute,
                                             &mut value) {
                0 => Ok(value),
                glx_error => Err(glx_error_to_windowing_api_error(glx_error)),
            }
        }
    }

    fn create_new_context(&self, config: FbConfig, share_with: NativeContext) -> NativeContext {
        self.trap_errors();
        let context = unsafe {
            (self.glx.glXCreateNewContext)(self.display,
                                           config.0 as GLXFBConfig,
                                           glx::RGBA_TYPE as c_int,
                                           share_with.0 as GLXContext,
                                           xlib::True)
        };
        if let Some(error_code) = self.untrap_errors() {
            warn!("glXCreateNewContext() raised X error {}", error_code);
            if !context.is_null() {
                unsafe {
                    (self.glx.glXDestroyContext)(self.display, context);
                }
            }
            return NativeContext::null();
        }
        NativeContext(context as *mut c_void)
    }

    fn destroy_context(&self, display: NativeDisplay, context: NativeContext) {
        unsafe {
            (self.glx.glXDestroyContext)(display.0 as *mut Display, context.0 as GLXContext);
        }
    }

    fn current_display(&self) -> NativeDisplay {
        unsafe { NativeDisplay((self.glx.glXGetCurrentDisplay)() as *mut c_void) }
    }

    fn current_drawable(&self) -> Drawable {
        unsafe { (self.glx.glXGetCurrentDrawable)() }
    }

    fn current_context(&self) -> NativeContext {
        unsafe { NativeContext((self.glx.glXGetCurrentContext)() as *mut c_void) }
    }

    fn make_current(&self, display: NativeDisplay, drawable: Drawable, context: NativeContext)
                    -> bool {
        unsafe {
            (self.glx.glXMakeCurrent)(display.0 as *mut Display,
                                      drawable,
                                      context.0 as GLXContext) != xlib::False
        }
    }

    fn create_glx_pixmap(&self, config: FbConfig, pixmap: Pixmap, attributes: &[c_int])
                         -> GlxPixmap {
        unsafe {
            (self.glx.glXCreatePixmap)(self.display,
                                       config.0 as GLXFBConfig,
                                       pixmap,
                                       attributes.as_ptr())
        }
    }

    fn destroy_glx_pixmap(&self, glx_pixmap: GlxPixmap) {
        unsafe {
            (self.glx.glXDestroyPixmap)(self.display, glx_pixmap);
        }
    }

    fn bind_tex_image(&self,
                      functions: &ExtensionFunctions,
                      glx_pixmap: GlxPixmap,
                      buffer: c_int) {
        unsafe {
            let bind_tex_image: BindTexImageFn =
                mem::transmute(functions.glx_bind_tex_image.as_ptr());
            bind_tex_image(self.display, glx_pixmap, buffer, ptr::null());
        }
    }

    fn release_tex_image(&self,
                         functions: &ExtensionFunctions,
                         glx_pixmap: GlxPixmap,
                         buffer: c_int) {
        unsafe {
            let release_tex_image: ReleaseTexImageFn =
                mem::transmute(functions.glx_release_tex_image.as_ptr());
            release_tex_image(self.display, glx_pixmap, buffer);
        }
    }
}

impl GlApi for Connection {
    fn gl_extensions(&self) -> String {
        unsafe {
            let extensions = self.gl.GetString(gl::EXTENSIONS);
            if extensions.is_null() {
                return String::new();
            }
            CStr::from_ptr(extensions as *const c_char).to_string_lossy().into_owned()
        }
    }

    #[inline]
    fn get_error(&self) -> GLenum {
        unsafe { self.gl.GetError() }
    }

    fn is_texture(&self, texture: GLuint) -> bool {
        unsafe { self.gl.IsTexture(texture) != gl::FALSE }
    }

    fn is_enabled(&self, capability: GLenum) -> bool {
        unsafe { self.gl.IsEnabled(capability) != gl::FALSE }
    }

    fn enable(&self, capability: GLenum) {
        unsafe { self.gl.Enable(capability) }
    }

    fn disable(&self, capability: GLenum) {
        unsafe { self.gl.Disable(capability) }
    }

    fn get_integer(&self, parameter: GLenum) -> GLint {
        unsafe {
            let mut value = 0;
            self.gl.GetIntegerv(parameter, &mut value);
            value
        }
    }

    fn get_current_color(&self) -> [GLfloat; 4] {
        unsafe {
            let mut color = [0.0; 4];
            self.gl.GetFloatv(gl::CURRENT_COLOR, color.as_mut_ptr());
            color
        }
    }

    fn get_tex_level_parameter(&self, target: GLenum, level: GLint, parameter: GLenum) -> GLint {
        unsafe {
            let mut value = 0;
            self.gl.GetTexLevelParameteriv(target, level, parameter, &mut value);
            value
        }
    }

    fn gen_texture(&self) -> GLuint {
        unsafe {
            let mut texture = 0;
            self.gl.GenTextures(1, &mut texture);
            texture
        }
    }

    fn delete_texture(&self, texture: GLuint) {
        unsafe { self.gl.DeleteTextures(1, &texture) }
    }

    fn bind_texture(&self, target: GLenum, texture: GLuint) {
        unsafe { self.gl.BindTexture(target, texture) }
    }

    fn tex_parameter(&self, target: GLenum, parameter: GLenum, value: GLint) {
        unsafe { self.gl.TexParameteri(target, parameter, value) }
    }

    fn gen_framebuffer(&self, functions: &ExtensionFunctions) -> GLuint {
        unsafe {
            let gen_framebuffers: GenFramebuffersFn =
                mem::transmute(functions.gen_framebuffers.as_ptr());
            let mut framebuffer = 0;
            gen_framebuffers(1, &mut framebuffer);
            framebuffer
        }
    }

    fn delete_framebuffer(&self, functions: &ExtensionFunctions, framebuffer: GLuint) {
        unsafe {
            let delete_framebuffers: DeleteFramebuffersFn =
                mem::transmute(functions.delete_framebuffers.as_ptr());
            delete_framebuffers(1, &framebuffer);
        }
    }

    fn bind_framebuffer(&self, functions: &ExtensionFunctions, target: GLenum, framebuffer: GLuint) {
        unsafe {
            let bind_framebuffer: BindFramebufferFn =
                mem::transmute(functions.bind_framebuffer.as_ptr());
            bind_framebuffer(target, framebuffer);
        }
    }

    fn framebuffer_texture_2d(&self,
                              functions: &ExtensionFunctions,
                              target: GLenum,
                              attachment: GLenum,
                              texture_target: GLenum,
                              texture: GLuint,
                              level: GLint) {
        unsafe {
            let framebuffer_texture_2d: FramebufferTexture2DFn =
                mem::transmute(functions.framebuffer_texture_2d.as_ptr());
            framebuffer_texture_2d(target, attachment, texture_target, texture, level);
        }
    }

    fn check_framebuffer_status(&self, functions: &ExtensionFunctions, target: GLenum) -> GLenum {
        unsafe {
            let check_framebuffer_status: CheckFramebufferStatusFn =
                mem::transmute(functions.check_framebuffer_status.as_ptr());
            check_framebuffer_status(target)
        }
    }

    fn matrix_mode(&self, mode: GLenum) {
        unsafe { self.gl.MatrixMode(mode) }
    }

    fn push_matrix(&self) {
        unsafe { self.gl.PushMatrix() }
    }

    fn pop_matrix(&self) {
        unsafe { self.gl.PopMatrix() }
    }

    fn load_identity(&self) {
        unsafe { self.gl.LoadIdentity() }
    }

    fn viewport(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei) {
        unsafe { self.gl.Viewport(x, y, width, height) }
    }

    fn translate(&self, x: GLfloat, y: GLfloat, z: GLfloat) {
        unsafe { self.gl.Translatef(x, y, z) }
    }

    fn scale(&self, x: GLfloat, y: GLfloat, z: GLfloat) {
        unsafe { self.gl.Scalef(x, y, z) }
    }

    fn color(&self, color: [GLfloat; 4]) {
        unsafe { self.gl.Color4f(color[0], color[1], color[2], color[3]) }
    }

    fn begin(&self, mode: GLenum) {
        unsafe { self.gl.Begin(mode) }
    }

    fn end(&self) {
        unsafe { self.gl.End() }
    }

    fn tex_coord(&self, s: GLfloat, t: GLfloat) {
        unsafe { self.gl.TexCoord2f(s, t) }
    }

    fn vertex(&self, x: GLint, y: GLint) {
        unsafe { self.gl.Vertex2i(x, y) }
    }
}
