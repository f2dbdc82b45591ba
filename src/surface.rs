// vaglx/src/surface.rs
//
//! GL surfaces: a caller-owned texture plus the pixmap that decoded frames are presented into.

use crate::context::ContextState;
use crate::decode::DecodeSurfaceID;
use crate::error::trap_x_errors;
use crate::extensions::ExtensionFunctions;
use crate::gl::types::{GLenum, GLfloat, GLint, GLuint};
use crate::gl_utils::{self, TextureBinding};
use crate::native::{Backend, GlxPixmap, Pixmap};
use crate::{gl, glx, Error, WindowingApiError};

use euclid::default::Size2D;
use log::{debug, error, warn};
use std::fmt::{self, Debug, Formatter};
use std::os::raw::c_int;

/// An opaque handle to a surface, valid until the surface is destroyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceID(pub u64);

/// A GL texture that decode surfaces can be rendered into.
///
/// Each surface owns a private GLX context, an X11 pixmap with the size of the texture, the GLX
/// pixmap wrapping it and a texture name the GLX pixmap is bound to while rendering. The texture
/// the surface was created from stays owned by the caller.
pub struct GlSurface {
    pub(crate) context: ContextState,
    pub(crate) target: GLenum,
    pub(crate) texture: GLuint,
    pub(crate) size: Size2D<u32>,
    pub(crate) decode_surface: Option<DecodeSurfaceID>,
    pub(crate) is_bound: bool,
    pub(crate) pixmap: Pixmap,
    pub(crate) glx_pixmap: GlxPixmap,
    pub(crate) pix_texture: GLuint,
    pub(crate) framebuffer: GLuint,
}

impl Debug for GlSurface {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter,
               "GlSurface({}, {}x{}, pixmap {:x})",
               self.texture,
               self.size.width,
               self.size.height,
               self.pixmap)
    }
}

impl GlSurface {
    /// Wraps `texture`, which must be a 2D texture with an RGBA internal format.
    ///
    /// `context` must be current. On failure every resource created so far has been released
    /// again.
    pub(crate) fn new<B>(backend: &B, context: ContextState, target: GLenum, texture: GLuint)
                         -> Result<GlSurface, Error>
                         where B: Backend + ?Sized {
        let _binding = TextureBinding::new(backend, target, texture)?;

        let internal_format = gl_utils::get_texture_param(backend, gl::TEXTURE_INTERNAL_FORMAT)?;
        if !is_supported_internal_format(internal_format) {
            return Err(Error::UnsupportedTextureFormat(internal_format as GLenum));
        }

        let border = gl_utils::get_texture_param(backend, gl::TEXTURE_BORDER)?;
        let width = gl_utils::get_texture_param(backend, gl::TEXTURE_WIDTH)? - 2 * border;
        let height = gl_utils::get_texture_param(backend, gl::TEXTURE_HEIGHT)? - 2 * border;
        if width <= 0 || height <= 0 {
            return Err(Error::EmptyTexture);
        }

        let mut surface = GlSurface {
            context,
            target,
            texture,
            size: Size2D::new(width as u32, height as u32),
            decode_surface: None,
            is_bound: false,
            pixmap: 0,
            glx_pixmap: 0,
            pix_texture: 0,
            framebuffer: 0,
        };

        if let Err(err) = surface.create_tfp_surface(backend) {
            surface.destroy_tfp_surface(backend);
            return Err(err);
        }

        debug!("created {:?}", surface);
        Ok(surface)
    }

    /// Creates the pixmap, the GLX pixmap and the texture used for texture-from-pixmap.
    ///
    /// Each resource is recorded as soon as it exists, so `destroy_tfp_surface()` can clean up
    /// after a failure at any step.
    pub(crate) fn create_tfp_surface<B>(&mut self, backend: &B) -> Result<(), Error>
                                        where B: Backend + ?Sized {
        let root_window = backend.root_window();
        let root_depth = match backend.window_depth(root_window) {
            Some(depth) => depth,
            None => return Err(Error::PixmapCreationFailed(WindowingApiError::BadDrawable)),
        };

        let pixmap =
            backend.create_pixmap(root_window, self.size.width, self.size.height, root_depth);
        if pixmap == 0 {
            return Err(Error::PixmapCreationFailed(WindowingApiError::BadAlloc));
        }
        self.pixmap = pixmap;

        let geometry = trap_x_errors(backend, || backend.get_geometry(pixmap))
            .map_err(Error::PixmapCreationFailed)?
            .ok_or(Error::PixmapCreationFailed(WindowingApiError::Failed))?;
        let depth = geometry.depth;
        if depth != 24 && depth != 32 {
            return Err(Error::UnsupportedPixmapDepth(depth));
        }

        let config = backend.choose_fb_config(&pixmap_config_attributes(depth))
                            .into_iter()
                            .next()
                            .ok_or(Error::NoPixelFormatFound)?;

        let glx_pixmap = trap_x_errors(backend, || {
            backend.create_glx_pixmap(config, pixmap, &glx_pixmap_attributes(depth))
        }).map_err(Error::GlxPixmapCreationFailed)?;
        if glx_pixmap == 0 {
            return Err(Error::GlxPixmapCreationFailed(WindowingApiError::Failed));
        }
        self.glx_pixmap = glx_pixmap;

        self.pix_texture = backend.gen_texture();
        backend.bind_texture(gl::TEXTURE_2D, self.pix_texture);
        backend.tex_parameter(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR as GLint);
        backend.tex_parameter(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint);
        Ok(())
    }

    /// Releases whatever `create_tfp_surface()` managed to create. Idempotent.
    pub(crate) fn destroy_tfp_surface<B>(&mut self, backend: &B) where B: Backend + ?Sized {
        if self.glx_pixmap != 0 {
            backend.destroy_glx_pixmap(self.glx_pixmap);
            self.glx_pixmap = 0;
        }

        if self.pixmap != 0 {
            backend.free_pixmap(self.pixmap);
            self.pixmap = 0;
        }

        if self.pix_texture != 0 {
            backend.delete_texture(self.pix_texture);
            self.pix_texture = 0;
        }
    }

    /// Makes the pixmap the image of the pixmap texture. Does nothing if it already is.
    pub(crate) fn bind_pixmap<B>(&mut self, backend: &B, functions: &ExtensionFunctions)
                                 -> Result<(), Error>
                                 where B: Backend + ?Sized {
        if self.is_bound {
            return Ok(());
        }

        backend.bind_texture(gl::TEXTURE_2D, self.pix_texture);

        let glx_pixmap = self.glx_pixmap;
        trap_x_errors(backend, || {
            backend.bind_tex_image(functions, glx_pixmap, glx::FRONT_LEFT_EXT as c_int);
            backend.sync();
        }).map_err(|err| {
            error!("failed to bind pixmap");
            Error::BindPixmapFailed(err)
        })?;

        self.is_bound = true;
        Ok(())
    }

    /// Detaches the pixmap from the pixmap texture. Does nothing if it isn't attached.
    pub(crate) fn unbind_pixmap<B>(&mut self, backend: &B, functions: &ExtensionFunctions)
                                   -> Result<(), Error>
                                   where B: Backend + ?Sized {
        if !self.is_bound {
            return Ok(());
        }

        let glx_pixmap = self.glx_pixmap;
        trap_x_errors(backend, || {
            backend.release_tex_image(functions, glx_pixmap, glx::FRONT_LEFT_EXT as c_int);
            backend.sync();
        }).map_err(|err| {
            error!("failed to release pixmap");
            Error::ReleasePixmapFailed(err)
        })?;

        backend.bind_texture(gl::TEXTURE_2D, 0);

        self.is_bound = false;
        Ok(())
    }

    /// Draws the bound pixmap texture as a quad covering the whole surface, in opaque white.
    pub(crate) fn render_pixmap<B>(&self, backend: &B) -> Result<(), Error>
                                   where B: Backend + ?Sized {
        let (width, height) = (self.size.width as GLint, self.size.height as GLint);
        let old_color = gl_utils::get_current_color(backend)?;

        backend.color([1.0; 4]);
        backend.begin(gl::QUADS);
        let corners: [(GLfloat, GLfloat, GLint, GLint); 4] = [
            (0.0, 0.0, 0,     0),
            (0.0, 1.0, 0,     height),
            (1.0, 1.0, width, height),
            (1.0, 0.0, width, 0),
        ];
        for &(s, t, x, y) in &corners {
            backend.tex_coord(s, t);
            backend.vertex(x, y);
        }
        backend.end();
        backend.color(old_color);
        Ok(())
    }

    /// Unbinds the pixmap and releases every GL and X resource of the surface, except its
    /// context. The surface's context must be current.
    pub(crate) fn release<B>(&mut self, backend: &B, functions: &ExtensionFunctions)
                             where B: Backend + ?Sized {
        if let Err(err) = self.unbind_pixmap(backend, functions) {
            warn!("destroying a surface whose pixmap couldn't be released: {:?}", err);
        }
        self.destroy_fbo_surface(backend, functions);
        self.destroy_tfp_surface(backend);
        self.decode_surface = None;
    }

    #[inline]
    pub fn target(&self) -> GLenum {
        self.target
    }

    #[inline]
    pub fn texture(&self) -> GLuint {
        self.texture
    }

    #[inline]
    pub fn size(&self) -> Size2D<u32> {
        self.size
    }

    /// The decode surface most recently associated with this surface, if any.
    #[inline]
    pub fn decode_surface(&self) -> Option<DecodeSurfaceID> {
        self.decode_surface
    }

    /// True while the pixmap is the image source of the pixmap texture.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.is_bound
    }

    #[inline]
    pub fn pixmap(&self) -> Pixmap {
        self.pixmap
    }

    #[inline]
    pub fn glx_pixmap(&self) -> GlxPixmap {
        self.glx_pixmap
    }

    #[inline]
    pub fn pixmap_texture(&self) -> GLuint {
        self.pix_texture
    }

    #[inline]
    pub fn has_framebuffer(&self) -> bool {
        self.framebuffer != 0
    }

    /// The private context this surface renders with.
    #[inline]
    pub fn context(&self) -> &ContextState {
        &self.context
    }
}

fn is_supported_internal_format(format: GLint) -> bool {
    // `4` is the legacy way of saying "four components".
    match format as GLenum {
        4 | gl::RGBA | gl::RGBA8 => true,
        _ => false,
    }
}

/// The framebuffer configuration attributes for a texture-from-pixmap pixmap of `depth` bits.
pub(crate) fn pixmap_config_attributes(depth: u32) -> Vec<c_int> {
    let mut attributes = vec![
        glx::DRAWABLE_TYPE as c_int,    glx::PIXMAP_BIT as c_int,
        glx::DOUBLEBUFFER as c_int,     1,
        glx::RENDER_TYPE as c_int,      glx::RGBA_BIT as c_int,
        glx::X_RENDERABLE as c_int,     1,
        // Pixmaps are top-down, GL textures bottom-up.
        glx::Y_INVERTED_EXT as c_int,   1,
        glx::RED_SIZE as c_int,         8,
        glx::GREEN_SIZE as c_int,       8,
        glx::BLUE_SIZE as c_int,        8,
        glx::DEPTH_SIZE as c_int,       depth as c_int,
    ];
    if depth == 32 {
        attributes.extend_from_slice(&[
            glx::ALPHA_SIZE as c_int,               8,
            glx::BIND_TO_TEXTURE_RGBA_EXT as c_int, 1,
        ]);
    } else {
        attributes.extend_from_slice(&[glx::BIND_TO_TEXTURE_RGB_EXT as c_int, 1]);
    }
    attributes.push(0);
    attributes
}

/// The GLX pixmap attributes for a texture-from-pixmap pixmap of `depth` bits.
pub(crate) fn glx_pixmap_attributes(depth: u32) -> [c_int; 7] {
    let texture_format = if depth == 32 {
        glx::TEXTURE_FORMAT_RGBA_EXT
    } else {
        glx::TEXTURE_FORMAT_RGB_EXT
    };
    [
        glx::TEXTURE_TARGET_EXT as c_int,   glx::TEXTURE_2D_EXT as c_int,
        glx::MIPMAP_TEXTURE_EXT as c_int,   0,
        glx::TEXTURE_FORMAT_EXT as c_int,   texture_format as c_int,
        0,
    ]
}
