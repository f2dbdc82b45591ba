// vaglx/src/platform/mock.rs
//
//! An in-process model of Xlib, GLX and the OpenGL state machine, plus a scripted video decoder.
//!
//! The model keeps per-context GL state (capabilities, texture bindings, framebuffer binding,
//! matrix stacks, current color and the error queue), a shared namespace of textures, and every
//! X and GLX resource, so tests can check that operations leave no state or resource behind.
//! Protocol errors behave as with a real server: outside a trap they are counted as fatal.

use crate::context::ContextState;
use crate::decode::{DecodeBackend, DecodeSurface, DecodeSurfaceID, OutputSurface, PresentFlags};
use crate::extensions::ExtensionFunctions;
use crate::gl::types::{GLenum, GLfloat, GLint, GLsizei, GLuint};
use crate::native::{Drawable, FbConfig, Geometry, GlApi, GlxPixmap, NativeContext};
use crate::native::{NativeDisplay, Pixmap, WindowingApi};
use crate::{gl, glx, Status, WindowingApiError};

use euclid::default::{Rect, Size2D};
use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::os::raw::{c_int, c_void};
use std::ptr;

const MOCK_DISPLAY: usize = 0xd150;
const ROOT_WINDOW: Drawable = 0x100;
const CALLER_WINDOW: Drawable = 0x101;

// X11 core protocol error codes.
const BAD_VALUE: u8 = 2;
const BAD_PIXMAP: u8 = 4;
const BAD_MATCH: u8 = 8;
const BAD_DRAWABLE: u8 = 9;
const BAD_ACCESS: u8 = 10;

static MOCK_ENTRY_POINT: u8 = 0;

/// Knobs that make the next calls into the mock fail.
#[derive(Clone, Debug, Default)]
pub struct MockFailures {
    pub create_context: bool,
    pub make_current: bool,
    pub create_pixmap: bool,
    pub get_geometry: bool,
    /// Overrides the depth pixmaps are created with.
    pub pixmap_depth: Option<u32>,
    pub no_fb_config: bool,
    pub create_glx_pixmap: bool,
    pub bind_tex_image: bool,
    pub release_tex_image: bool,
    pub incomplete_framebuffer: bool,
    /// An extension marker to leave out of the extension strings.
    pub missing_extension: Option<&'static str>,
    /// An entry point `get_proc_address()` won't find.
    pub missing_entry_point: Option<&'static str>,
}

/// Live resources, for leak checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub contexts: usize,
    pub pixmaps: usize,
    pub glx_pixmaps: usize,
    pub textures: usize,
    pub framebuffers: usize,
}

/// A quad drawn between `glBegin(GL_QUADS)` and `glEnd()`.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub context: NativeContext,
    pub framebuffer: GLuint,
    /// The texture bound to `GL_TEXTURE_2D` while drawing.
    pub texture: GLuint,
    pub color: [GLfloat; 4],
    pub vertices: Vec<(GLint, GLint)>,
    pub tex_coords: Vec<(GLfloat, GLfloat)>,
}

#[derive(Clone, Debug)]
struct FbConfigRecord {
    id: c_int,
}

#[derive(Clone, Debug)]
struct ContextRecord {
    fb_config_id: c_int,
    gl: GlState,
}

#[derive(Clone, Debug)]
struct GlState {
    enabled: HashSet<GLenum>,
    bindings: HashMap<GLenum, GLuint>,
    framebuffer: GLuint,
    matrix_mode: GLenum,
    projection_depth: usize,
    modelview_depth: usize,
    viewport: [GLint; 4],
    color: [GLfloat; 4],
    errors: Vec<GLenum>,
    primitive: Option<DrawRecord>,
}

#[derive(Clone, Copy, Debug, Default)]
struct TextureRecord {
    internal_format: GLint,
    width: GLint,
    height: GLint,
    border: GLint,
}

#[derive(Clone, Copy, Debug, Default)]
struct FramebufferRecord {
    color_attachment: GLuint,
}

#[derive(Clone, Copy, Debug)]
struct PixmapRecord {
    width: u32,
    height: u32,
    depth: u32,
}

#[derive(Clone, Debug)]
struct GlxPixmapRecord {
    pixmap: Pixmap,
    attributes: Vec<c_int>,
    bound_to: Option<GLuint>,
}

struct MockState {
    failures: MockFailures,
    root_depth: u32,
    next_xid: u64,
    next_context: usize,
    next_gl_name: GLuint,
    fb_configs: Vec<FbConfigRecord>,
    contexts: HashMap<usize, ContextRecord>,
    textures: HashMap<GLuint, TextureRecord>,
    framebuffers: HashMap<GLuint, FramebufferRecord>,
    pixmaps: HashMap<Pixmap, PixmapRecord>,
    glx_pixmaps: HashMap<GlxPixmap, GlxPixmapRecord>,
    current: ContextState,
    trapped_error: Option<Option<u8>>,
    fatal_errors: Vec<u8>,
    make_current_calls: usize,
    extension_queries: usize,
    gl_calls_without_context: usize,
    fb_config_requests: Vec<Vec<c_int>>,
    draws: Vec<DrawRecord>,
}

/// The mock windowing system and GL.
pub struct MockBackend {
    state: RefCell<MockState>,
}

impl Default for GlState {
    fn default() -> GlState {
        GlState {
            enabled: HashSet::new(),
            bindings: HashMap::new(),
            framebuffer: 0,
            matrix_mode: gl::MODELVIEW,
            projection_depth: 1,
            modelview_depth: 1,
            viewport: [0; 4],
            color: [1.0; 4],
            errors: vec![],
            primitive: None,
        }
    }
}

impl MockState {
    fn new_xid(&mut self) -> u64 {
        self.next_xid += 1;
        self.next_xid
    }

    fn new_gl_name(&mut self) -> GLuint {
        self.next_gl_name += 1;
        self.next_gl_name
    }

    /// Reports a protocol error the way Xlib would: to the trap if one is installed.
    fn raise_x_error(&mut self, error_code: u8) {
        match self.trapped_error {
            Some(ref mut trapped_error) => *trapped_error = Some(error_code),
            None => self.fatal_errors.push(error_code),
        }
    }

    fn gl(&mut self) -> Option<&mut GlState> {
        let context = self.current.context.0 as usize;
        match self.contexts.get_mut(&context) {
            Some(record) => Some(&mut record.gl),
            None => {
                self.gl_calls_without_context += 1;
                None
            }
        }
    }

    fn gl_error(&mut self, error: GLenum) {
        if let Some(gl) = self.gl() {
            if !gl.errors.contains(&error) {
                gl.errors.push(error);
            }
        }
    }

    fn bound_texture(&mut self, target: GLenum) -> GLuint {
        self.gl().and_then(|gl| gl.bindings.get(&target).cloned()).unwrap_or(0)
    }

    fn fb_config_id(&self, config: FbConfig) -> Option<c_int> {
        let index = (config.0 as usize).checked_div(0x10)?.checked_sub(1)?;
        self.fb_configs.get(index).map(|record| record.id)
    }

    fn extension_string(&self, extensions: &[&str]) -> String {
        extensions.iter()
                  .filter(|&&extension| Some(extension) != self.failures.missing_extension)
                  .cloned()
                  .collect::<Vec<_>>()
                  .join(" ")
    }
}

impl Default for MockBackend {
    fn default() -> MockBackend {
        MockBackend::new()
    }
}

impl MockBackend {
    /// A screen whose root window is 24 bits deep.
    pub fn new() -> MockBackend {
        MockBackend::with_root_depth(24)
    }

    pub fn with_root_depth(root_depth: u32) -> MockBackend {
        MockBackend {
            state: RefCell::new(MockState {
                failures: MockFailures::default(),
                root_depth,
                next_xid: 0x400,
                next_context: 0,
                next_gl_name: 0,
                fb_configs: vec![
                    FbConfigRecord { id: 0x21 },
                    FbConfigRecord { id: 0x22 },
                    FbConfigRecord { id: 0x23 },
                ],
                contexts: HashMap::new(),
                textures: HashMap::new(),
                framebuffers: HashMap::new(),
                pixmaps: HashMap::new(),
                glx_pixmaps: HashMap::new(),
                current: ContextState::empty(),
                trapped_error: None,
                fatal_errors: vec![],
                make_current_calls: 0,
                extension_queries: 0,
                gl_calls_without_context: 0,
                fb_config_requests: vec![],
                draws: vec![],
            }),
        }
    }

    /// Changes which calls fail from now on.
    pub fn inject_failures<F>(&self, f: F) where F: FnOnce(&mut MockFailures) {
        f(&mut self.state.borrow_mut().failures)
    }

    pub fn clear_failures(&self) {
        self.state.borrow_mut().failures = MockFailures::default();
    }

    /// Creates the application's own context, rendering to a window, and makes it current.
    pub fn create_caller_context(&self) -> ContextState {
        let mut state = self.state.borrow_mut();
        state.next_context += 1;
        let address = 0x1000 * state.next_context;
        let fb_config_id = state.fb_configs[2].id;
        state.contexts.insert(address, ContextRecord { fb_config_id, gl: GlState::default() });

        let context = ContextState {
            display: NativeDisplay(MOCK_DISPLAY as *mut c_void),
            drawable: CALLER_WINDOW,
            context: NativeContext(address as *mut c_void),
        };
        state.current = context;
        context
    }

    /// Creates a texture with storage, as the application would with `glTexImage2D()`.
    pub fn create_texture(&self, internal_format: GLenum, width: u32, height: u32, border: u32)
                          -> GLuint {
        let mut state = self.state.borrow_mut();
        let texture = state.new_gl_name();
        state.textures.insert(texture, TextureRecord {
            internal_format: internal_format as GLint,
            width: (width + 2 * border) as GLint,
            height: (height + 2 * border) as GLint,
            border: border as GLint,
        });
        texture
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        let state = self.state.borrow();
        ResourceCounts {
            contexts: state.contexts.len(),
            pixmaps: state.pixmaps.len(),
            glx_pixmaps: state.glx_pixmaps.len(),
            textures: state.textures.len(),
            framebuffers: state.framebuffers.len(),
        }
    }

    pub fn current(&self) -> ContextState {
        self.state.borrow().current
    }

    /// The texture bound to `target` in the current context.
    pub fn bound_texture(&self, target: GLenum) -> GLuint {
        self.state.borrow_mut().bound_texture(target)
    }

    pub fn is_target_enabled(&self, target: GLenum) -> bool {
        self.state.borrow_mut().gl().map_or(false, |gl| gl.enabled.contains(&target))
    }

    pub fn bound_framebuffer(&self) -> GLuint {
        self.state.borrow_mut().gl().map_or(0, |gl| gl.framebuffer)
    }

    /// The depths of the projection and modelview stacks of the current context.
    pub fn matrix_depths(&self) -> (usize, usize) {
        self.state
            .borrow_mut()
            .gl()
            .map_or((0, 0), |gl| (gl.projection_depth, gl.modelview_depth))
    }

    pub fn current_color(&self) -> [GLfloat; 4] {
        self.state.borrow_mut().gl().map_or([0.0; 4], |gl| gl.color)
    }

    pub fn current_viewport(&self) -> [GLint; 4] {
        self.state.borrow_mut().gl().map_or([0; 4], |gl| gl.viewport)
    }

    pub fn pending_gl_errors(&self) -> Vec<GLenum> {
        self.state.borrow_mut().gl().map_or(vec![], |gl| gl.errors.clone())
    }

    /// True if the GLX pixmap is currently bound to a texture.
    pub fn is_glx_pixmap_bound(&self, glx_pixmap: GlxPixmap) -> bool {
        let state = self.state.borrow();
        state.glx_pixmaps.get(&glx_pixmap).map_or(false, |record| record.bound_to.is_some())
    }

    pub fn glx_pixmap_attributes(&self, glx_pixmap: GlxPixmap) -> Option<Vec<c_int>> {
        let state = self.state.borrow();
        state.glx_pixmaps.get(&glx_pixmap).map(|record| record.attributes.clone())
    }

    pub fn pixmap_exists(&self, pixmap: Pixmap) -> bool {
        self.state.borrow().pixmaps.contains_key(&pixmap)
    }

    pub fn texture_exists(&self, texture: GLuint) -> bool {
        self.state.borrow().textures.contains_key(&texture)
    }

    pub fn make_current_calls(&self) -> usize {
        self.state.borrow().make_current_calls
    }

    /// How many times the GL or GLX extension strings were read.
    pub fn extension_queries(&self) -> usize {
        self.state.borrow().extension_queries
    }

    /// GL calls made while no context was current.
    pub fn gl_calls_without_context(&self) -> usize {
        self.state.borrow().gl_calls_without_context
    }

    /// Protocol errors raised outside a trap, which would have killed a real client.
    pub fn fatal_x_errors(&self) -> Vec<u8> {
        self.state.borrow().fatal_errors.clone()
    }

    /// Every attribute list passed to `choose_fb_config()`, oldest first.
    pub fn fb_config_requests(&self) -> Ref<'_, Vec<Vec<c_int>>> {
        Ref::map(self.state.borrow(), |state| &state.fb_config_requests)
    }

    pub fn draws(&self) -> Ref<'_, Vec<DrawRecord>> {
        Ref::map(self.state.borrow(), |state| &state.draws)
    }
}

impl WindowingApi for MockBackend {
    #[inline]
    fn display(&self) -> NativeDisplay {
        NativeDisplay(MOCK_DISPLAY as *mut c_void)
    }

    #[inline]
    fn screen(&self) -> c_int {
        0
    }

    #[inline]
    fn root_window(&self) -> Drawable {
        ROOT_WINDOW
    }

    fn window_depth(&self, window: Drawable) -> Option<u32> {
        let state = self.state.borrow();
        match window {
            ROOT_WINDOW | CALLER_WINDOW => Some(state.root_depth),
            _ => None,
        }
    }

    fn create_pixmap(&self, drawable: Drawable, width: u32, height: u32, depth: u32) -> Pixmap {
        let mut state = self.state.borrow_mut();
        if state.failures.create_pixmap {
            return 0;
        }
        if drawable != ROOT_WINDOW && drawable != CALLER_WINDOW {
            state.raise_x_error(BAD_DRAWABLE);
            return 0;
        }
        if width == 0 || height == 0 {
            state.raise_x_error(BAD_VALUE);
            return 0;
        }

        let depth = state.failures.pixmap_depth.unwrap_or(depth);
        let pixmap = state.new_xid();
        state.pixmaps.insert(pixmap, PixmapRecord { width, height, depth });
        pixmap
    }

    fn free_pixmap(&self, pixmap: Pixmap) {
        let mut state = self.state.borrow_mut();
        if state.pixmaps.remove(&pixmap).is_none() {
            state.raise_x_error(BAD_PIXMAP);
        }
    }

    fn get_geometry(&self, drawable: Drawable) -> Option<Geometry> {
        let mut state = self.state.borrow_mut();
        let record = state.pixmaps.get(&drawable).cloned();
        let record = match record {
            Some(record) if !state.failures.get_geometry => record,
            _ => {
                state.raise_x_error(BAD_DRAWABLE);
                return None;
            }
        };
        Some(Geometry {
            root: ROOT_WINDOW,
            x: 0,
            y: 0,
            width: record.width,
            height: record.height,
            border_width: 0,
            depth: record.depth,
        })
    }

    fn sync(&self) {}

    fn trap_errors(&self) {
        let mut state = self.state.borrow_mut();
        assert!(state.trapped_error.is_none(), "error traps don't nest");
        state.trapped_error = Some(None);
    }

    fn untrap_errors(&self) -> Option<u8> {
        let mut state = self.state.borrow_mut();
        state.trapped_error.take().expect("untrap without trap")
    }

    fn glx_extensions(&self) -> String {
        let mut state = self.state.borrow_mut();
        state.extension_queries += 1;
        state.extension_string(&["GLX_ARB_create_context", "GLX_EXT_texture_from_pixmap"])
    }

    fn get_proc_address(&self, symbol_name: &str) -> *const c_void {
        let state = self.state.borrow();
        if state.failures.missing_entry_point == Some(symbol_name) {
            return ptr::null();
        }
        &MOCK_ENTRY_POINT as *const u8 as *const c_void
    }

    fn choose_fb_config(&self, attributes: &[c_int]) -> Vec<FbConfig> {
        let mut state = self.state.borrow_mut();
        assert_eq!(attributes.last(), Some(&0), "attribute lists are zero-terminated");
        state.fb_config_requests.push(attributes.to_vec());
        if state.failures.no_fb_config {
            return vec![];
        }
        (0..state.fb_configs.len()).map(|index| FbConfig(((index + 1) * 0x10) as *mut c_void))
                                   .collect()
    }

    fn fb_configs(&self) -> Vec<FbConfig> {
        let state = self.state.borrow();
        (0..state.fb_configs.len()).map(|index| FbConfig(((index + 1) * 0x10) as *mut c_void))
                                   .collect()
    }

    fn fb_config_attrib(&self, config: FbConfig, attribute: c_int)
                        -> Result<c_int, WindowingApiError> {
        let state = self.state.borrow();
        match state.fb_config_id(config) {
            None => Err(WindowingApiError::BadPixelFormat),
            Some(id) if attribute == glx::FBCONFIG_ID as c_int => Ok(id),
            Some(_) => Err(WindowingApiError::BadAttribute),
        }
    }

    fn query_context(&self, display: NativeDisplay, context: NativeContext, attribute: c_int)
                     -> Result<c_int, WindowingApiError> {
        let state = self.state.borrow();
        if display != self.display() {
            return Err(WindowingApiError::BadContext);
        }
        match state.contexts.get(&(context.0 as usize)) {
            None => Err(WindowingApiError::BadContext),
            Some(record) if attribute == glx::FBCONFIG_ID as c_int => Ok(record.fb_config_id),
            Some(_) => Err(WindowingApiError::BadAttribute),
        }
    }

    fn create_new_context(&self, config: FbConfig, share_with: NativeContext) -> NativeContext {
        let mut state = self.state.borrow_mut();
        if state.failures.create_context {
            return NativeContext::null();
        }
        let fb_config_id = match state.fb_config_id(config) {
            Some(id) => id,
            None => return NativeContext::null(),
        };
        if !share_with.is_null() && !state.contexts.contains_key(&(share_with.0 as usize)) {
            return NativeContext::null();
        }

        state.next_context += 1;
        let address = 0x1000 * state.next_context;
        state.contexts.insert(address, ContextRecord { fb_config_id, gl: GlState::default() });
        NativeContext(address as *mut c_void)
    }

    fn destroy_context(&self, display: NativeDisplay, context: NativeContext) {
        let mut state = self.state.borrow_mut();
        assert_eq!(display, self.display());
        assert!(state.contexts.remove(&(context.0 as usize)).is_some(),
                "destroyed an unknown context");
        if state.current.context == context {
            state.current = ContextState::empty();
        }
    }

    fn current_display(&self) -> NativeDisplay {
        self.state.borrow().current.display
    }

    fn current_drawable(&self) -> Drawable {
        self.state.borrow().current.drawable
    }

    fn current_context(&self) -> NativeContext {
        self.state.borrow().current.context
    }

    fn make_current(&self, display: NativeDisplay, drawable: Drawable, context: NativeContext)
                    -> bool {
        let mut state = self.state.borrow_mut();
        state.make_current_calls += 1;
        if state.failures.make_current || display != self.display() {
            return false;
        }

        if context.is_null() {
            if drawable != 0 {
                return false;
            }
            state.current = ContextState::empty();
            return true;
        }

        if drawable == 0 || !state.contexts.contains_key(&(context.0 as usize)) {
            return false;
        }
        state.current = ContextState { display, drawable, context };
        true
    }

    fn create_glx_pixmap(&self, config: FbConfig, pixmap: Pixmap, attributes: &[c_int])
                         -> GlxPixmap {
        let mut state = self.state.borrow_mut();
        assert_eq!(attributes.last(), Some(&0), "attribute lists are zero-terminated");
        if state.failures.create_glx_pixmap || state.fb_config_id(config).is_none() {
            state.raise_x_error(BAD_MATCH);
            return 0;
        }
        if !state.pixmaps.contains_key(&pixmap) {
            state.raise_x_error(BAD_PIXMAP);
            return 0;
        }

        let glx_pixmap = state.new_xid();
        state.glx_pixmaps.insert(glx_pixmap, GlxPixmapRecord {
            pixmap,
            attributes: attributes.to_vec(),
            bound_to: None,
        });
        glx_pixmap
    }

    fn destroy_glx_pixmap(&self, glx_pixmap: GlxPixmap) {
        let mut state = self.state.borrow_mut();
        if state.glx_pixmaps.remove(&glx_pixmap).is_none() {
            state.raise_x_error(BAD_PIXMAP);
        }
    }

    fn bind_tex_image(&self, _: &ExtensionFunctions, glx_pixmap: GlxPixmap, buffer: c_int) {
        let mut state = self.state.borrow_mut();
        if state.failures.bind_tex_image || buffer != glx::FRONT_LEFT_EXT as c_int {
            state.raise_x_error(BAD_MATCH);
            return;
        }
        let texture = state.bound_texture(gl::TEXTURE_2D);
        let error_code = match state.glx_pixmaps.get_mut(&glx_pixmap) {
            None => Some(BAD_PIXMAP),
            Some(record) if record.bound_to.is_some() => Some(BAD_ACCESS),
            Some(record) => {
                debug_assert!(record.pixmap != 0);
                record.bound_to = Some(texture);
                None
            }
        };
        if let Some(error_code) = error_code {
            state.raise_x_error(error_code);
        }
    }

    fn release_tex_image(&self, _: &ExtensionFunctions, glx_pixmap: GlxPixmap, buffer: c_int) {
        let mut state = self.state.borrow_mut();
        if state.failures.release_tex_image || buffer != glx::FRONT_LEFT_EXT as c_int {
            state.raise_x_error(BAD_MATCH);
            return;
        }
        let error_code = match state.glx_pixmaps.get_mut(&glx_pixmap) {
            None => Some(BAD_PIXMAP),
            Some(record) if record.bound_to.is_none() => Some(BAD_MATCH),
            Some(record) => {
                record.bound_to = None;
                None
            }
        };
        if let Some(error_code) = error_code {
            state.raise_x_error(error_code);
        }
    }
}

impl GlApi for MockBackend {
    fn gl_extensions(&self) -> String {
        let mut state = self.state.borrow_mut();
        state.extension_queries += 1;
        if state.gl().is_none() {
            return String::new();
        }
        state.extension_string(&[
            "GL_ARB_texture_non_power_of_two",
            "GL_ARB_texture_rectangle",
            "GL_EXT_framebuffer_object",
        ])
    }

    fn get_error(&self) -> GLenum {
        let mut state = self.state.borrow_mut();
        match state.gl() {
            Some(gl) if !gl.errors.is_empty() => gl.errors.remove(0),
            _ => gl::NO_ERROR,
        }
    }

    fn is_texture(&self, texture: GLuint) -> bool {
        let mut state = self.state.borrow_mut();
        state.gl().is_some() && state.textures.contains_key(&texture)
    }

    fn is_enabled(&self, capability: GLenum) -> bool {
        self.state.borrow_mut().gl().map_or(false, |gl| gl.enabled.contains(&capability))
    }

    fn enable(&self, capability: GLenum) {
        if let Some(gl) = self.state.borrow_mut().gl() {
            gl.enabled.insert(capability);
        }
    }

    fn disable(&self, capability: GLenum) {
        if let Some(gl) = self.state.borrow_mut().gl() {
            gl.enabled.remove(&capability);
        }
    }

    fn get_integer(&self, parameter: GLenum) -> GLint {
        let mut state = self.state.borrow_mut();
        let target = match parameter {
            gl::TEXTURE_BINDING_1D => gl::TEXTURE_1D,
            gl::TEXTURE_BINDING_2D => gl::TEXTURE_2D,
            gl::TEXTURE_BINDING_3D => gl::TEXTURE_3D,
            gl::TEXTURE_BINDING_RECTANGLE_ARB => gl::TEXTURE_RECTANGLE_ARB,
            gl::FRAMEBUFFER_BINDING_EXT => {
                return state.gl().map_or(0, |gl| gl.framebuffer as GLint);
            }
            gl::MATRIX_MODE => return state.gl().map_or(0, |gl| gl.matrix_mode as GLint),
            _ => {
                state.gl_error(gl::INVALID_ENUM);
                return 0;
            }
        };
        state.bound_texture(target) as GLint
    }

    fn get_current_color(&self) -> [GLfloat; 4] {
        self.state.borrow_mut().gl().map_or([0.0; 4], |gl| gl.color)
    }

    fn get_tex_level_parameter(&self, target: GLenum, level: GLint, parameter: GLenum) -> GLint {
        let mut state = self.state.borrow_mut();
        let texture = state.bound_texture(target);
        let record = state.textures.get(&texture).cloned();
        let record = match record {
            Some(record) if level == 0 => record,
            Some(_) => TextureRecord::default(),
            None => {
                state.gl_error(gl::INVALID_OPERATION);
                return 0;
            }
        };
        match parameter {
            gl::TEXTURE_INTERNAL_FORMAT => record.internal_format,
            gl::TEXTURE_WIDTH => record.width,
            gl::TEXTURE_HEIGHT => record.height,
            gl::TEXTURE_BORDER => record.border,
            _ => {
                state.gl_error(gl::INVALID_ENUM);
                0
            }
        }
    }

    fn gen_texture(&self) -> GLuint {
        let mut state = self.state.borrow_mut();
        if state.gl().is_none() {
            return 0;
        }
        let texture = state.new_gl_name();
        state.textures.insert(texture, TextureRecord::default());
        texture
    }

    fn delete_texture(&self, texture: GLuint) {
        let mut state = self.state.borrow_mut();
        if state.textures.remove(&texture).is_none() {
            return;
        }
        // Deleting a bound texture reverts the binding to zero.
        if let Some(gl) = state.gl() {
            for binding in gl.bindings.values_mut() {
                if *binding == texture {
                    *binding = 0;
                }
            }
        }
    }

    fn bind_texture(&self, target: GLenum, texture: GLuint) {
        let mut state = self.state.borrow_mut();
        if texture != 0 && !state.textures.contains_key(&texture) {
            state.gl_error(gl::INVALID_OPERATION);
            return;
        }
        if let Some(gl) = state.gl() {
            gl.bindings.insert(target, texture);
        }
    }

    fn tex_parameter(&self, target: GLenum, _: GLenum, _: GLint) {
        let mut state = self.state.borrow_mut();
        if state.bound_texture(target) == 0 {
            state.gl_error(gl::INVALID_OPERATION);
        }
    }

    fn gen_framebuffer(&self, _: &ExtensionFunctions) -> GLuint {
        let mut state = self.state.borrow_mut();
        let framebuffer = state.new_gl_name();
        state.framebuffers.insert(framebuffer, FramebufferRecord::default());
        framebuffer
    }

    fn delete_framebuffer(&self, _: &ExtensionFunctions, framebuffer: GLuint) {
        let mut state = self.state.borrow_mut();
        state.framebuffers.remove(&framebuffer);
        if let Some(gl) = state.gl() {
            if gl.framebuffer == framebuffer {
                gl.framebuffer = 0;
            }
        }
    }

    fn bind_framebuffer(&self, _: &ExtensionFunctions, target: GLenum, framebuffer: GLuint) {
        let mut state = self.state.borrow_mut();
        if target != gl::FRAMEBUFFER_EXT {
            state.gl_error(gl::INVALID_ENUM);
            return;
        }
        if framebuffer != 0 && !state.framebuffers.contains_key(&framebuffer) {
            state.gl_error(gl::INVALID_OPERATION);
            return;
        }
        if let Some(gl) = state.gl() {
            gl.framebuffer = framebuffer;
        }
    }

    fn framebuffer_texture_2d(&self,
                              _: &ExtensionFunctions,
                              target: GLenum,
                              attachment: GLenum,
                              texture_target: GLenum,
                              texture: GLuint,
                              level: GLint) {
        let mut state = self.state.borrow_mut();
        let framebuffer = state.gl().map_or(0, |gl| gl.framebuffer);
        if target != gl::FRAMEBUFFER_EXT ||
                attachment != gl::COLOR_ATTACHMENT0_EXT ||
                texture_target != gl::TEXTURE_2D ||
                level != 0 ||
                framebuffer == 0 {
            state.gl_error(gl::INVALID_OPERATION);
            return;
        }
        if let Some(record) = state.framebuffers.get_mut(&framebuffer) {
            record.color_attachment = texture;
        }
    }

    fn check_framebuffer_status(&self, _: &ExtensionFunctions, target: GLenum) -> GLenum {
        let mut state = self.state.borrow_mut();
        if target != gl::FRAMEBUFFER_EXT {
            state.gl_error(gl::INVALID_ENUM);
            return 0;
        }
        if state.failures.incomplete_framebuffer {
            return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT_EXT;
        }
        let framebuffer = state.gl().map_or(0, |gl| gl.framebuffer);
        match state.framebuffers.get(&framebuffer) {
            Some(record) if state.textures.contains_key(&record.color_attachment) => {
                gl::FRAMEBUFFER_COMPLETE_EXT
            }
            _ => gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT_EXT,
        }
    }

    fn matrix_mode(&self, mode: GLenum) {
        if let Some(gl) = self.state.borrow_mut().gl() {
            gl.matrix_mode = mode;
        }
    }

    fn push_matrix(&self) {
        let mut state = self.state.borrow_mut();
        if let Some(gl) = state.gl() {
            match gl.matrix_mode {
                gl::PROJECTION => gl.projection_depth += 1,
                _ => gl.modelview_depth += 1,
            }
        }
    }

    fn pop_matrix(&self) {
        let mut state = self.state.borrow_mut();
        let underflow = match state.gl() {
            Some(gl) => {
                let depth = match gl.matrix_mode {
                    gl::PROJECTION => &mut gl.projection_depth,
                    _ => &mut gl.modelview_depth,
                };
                if *depth > 1 {
                    *depth -= 1;
                    false
                } else {
                    true
                }
            }
            None => false,
        };
        if underflow {
            state.gl_error(gl::STACK_UNDERFLOW);
        }
    }

    fn load_identity(&self) {
        let _ = self.state.borrow_mut().gl();
    }

    fn viewport(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei) {
        if let Some(gl) = self.state.borrow_mut().gl() {
            gl.viewport = [x, y, width, height];
        }
    }

    fn translate(&self, _: GLfloat, _: GLfloat, _: GLfloat) {
        let _ = self.state.borrow_mut().gl();
    }

    fn scale(&self, _: GLfloat, _: GLfloat, _: GLfloat) {
        let _ = self.state.borrow_mut().gl();
    }

    fn color(&self, color: [GLfloat; 4]) {
        if let Some(gl) = self.state.borrow_mut().gl() {
            gl.color = color;
            if let Some(ref mut primitive) = gl.primitive {
                primitive.color = color;
            }
        }
    }

    fn begin(&self, mode: GLenum) {
        let mut state = self.state.borrow_mut();
        let context = state.current.context;
        let texture = state.bound_texture(gl::TEXTURE_2D);
        let invalid = match state.gl() {
            Some(gl) if gl.primitive.is_none() && mode == gl::QUADS => {
                gl.primitive = Some(DrawRecord {
                    context,
                    framebuffer: gl.framebuffer,
                    texture,
                    color: gl.color,
                    vertices: vec![],
                    tex_coords: vec![],
                });
                false
            }
            Some(_) => true,
            None => false,
        };
        if invalid {
            state.gl_error(gl::INVALID_OPERATION);
        }
    }

    fn end(&self) {
        let mut state = self.state.borrow_mut();
        match state.gl().map(|gl| gl.primitive.take()) {
            Some(Some(primitive)) => state.draws.push(primitive),
            Some(None) => state.gl_error(gl::INVALID_OPERATION),
            None => {}
        }
    }

    fn tex_coord(&self, s: GLfloat, t: GLfloat) {
        if let Some(gl) = self.state.borrow_mut().gl() {
            if let Some(ref mut primitive) = gl.primitive {
                primitive.tex_coords.push((s, t));
            }
        }
    }

    fn vertex(&self, x: GLint, y: GLint) {
        if let Some(gl) = self.state.borrow_mut().gl() {
            if let Some(ref mut primitive) = gl.primitive {
                primitive.vertices.push((x, y));
            }
        }
    }
}

/// A call to `put_surface()`.
#[derive(Clone, Debug, PartialEq)]
pub struct PresentRecord {
    pub surface: DecodeSurfaceID,
    pub pixmap: Pixmap,
    pub pixmap_size: Size2D<u32>,
    pub source: Rect<u32>,
    pub destination: Rect<u32>,
    pub flags: PresentFlags,
}

/// A scripted video decoder.
///
/// Presenting a surface into a pixmap creates an output for the pair, whose pending fields are
/// the ones presented (both for a frame).
#[derive(Debug, Default)]
pub struct MockDecoder {
    surfaces: HashMap<DecodeSurfaceID, Size2D<u32>>,
    outputs: HashMap<(DecodeSurfaceID, Pixmap), PresentFlags>,
    pub presents: Vec<PresentRecord>,
    pub queued: Vec<(DecodeSurfaceID, OutputSurface)>,
    pub syncs: Vec<DecodeSurfaceID>,
    pub put_failure: Option<Status>,
    pub sync_failure: Option<Status>,
    pub queue_failure: Option<Status>,
    /// Don't create outputs when presenting.
    pub skip_outputs: bool,
}

impl MockDecoder {
    pub fn new() -> MockDecoder {
        MockDecoder::default()
    }

    /// Adds a decoded surface of the given size.
    pub fn add_surface(&mut self, surface: DecodeSurfaceID, size: Size2D<u32>) {
        self.surfaces.insert(surface, size);
    }

    pub fn remove_surface(&mut self, surface: DecodeSurfaceID) {
        self.surfaces.remove(&surface);
        self.outputs.retain(|&(output_surface, _), _| output_surface != surface);
    }
}

impl DecodeBackend for MockDecoder {
    fn lookup_surface(&self, surface: DecodeSurfaceID) -> Option<DecodeSurface> {
        self.surfaces.get(&surface).map(|&size| DecodeSurface { id: surface, size })
    }

    fn put_surface(&mut self,
                   surface: DecodeSurfaceID,
                   pixmap: Pixmap,
                   pixmap_size: &Size2D<u32>,
                   source: &Rect<u32>,
                   destination: &Rect<u32>,
                   flags: PresentFlags)
                   -> Result<(), Status> {
        if let Some(status) = self.put_failure {
            return Err(status);
        }
        if !self.surfaces.contains_key(&surface) {
            return Err(Status::InvalidSurface);
        }

        self.presents.push(PresentRecord {
            surface,
            pixmap,
            pixmap_size: *pixmap_size,
            source: *source,
            destination: *destination,
            flags,
        });

        if !self.skip_outputs {
            let mut fields = flags & (PresentFlags::TOP_FIELD | PresentFlags::BOTTOM_FIELD);
            if fields.is_empty() {
                fields = PresentFlags::TOP_FIELD | PresentFlags::BOTTOM_FIELD;
            }
            self.outputs.insert((surface, pixmap), fields);
        }
        Ok(())
    }

    fn lookup_output(&self, surface: DecodeSurfaceID, drawable: Pixmap) -> Option<OutputSurface> {
        self.outputs
            .get(&(surface, drawable))
            .map(|&fields| OutputSurface { drawable, fields })
    }

    fn queue_surface(&mut self, surface: DecodeSurfaceID, output: &OutputSurface)
                     -> Result<(), Status> {
        if let Some(status) = self.queue_failure {
            return Err(status);
        }
        self.queued.push((surface, *output));
        self.outputs.insert((surface, output.drawable), PresentFlags::empty());
        Ok(())
    }

    fn sync_surface(&mut self, surface: DecodeSurfaceID) -> Result<(), Status> {
        if let Some(status) = self.sync_failure {
            return Err(status);
        }
        if !self.surfaces.contains_key(&surface) {
            return Err(Status::InvalidSurface);
        }
        self.syncs.push(surface);
        Ok(())
    }
}
