// vaglx/src/gl_utils.rs
//
//! Various OpenGL utilities used by the surface machinery.

use crate::error::gl_error_string;
use crate::gl;
use crate::gl::types::{GLenum, GLfloat, GLint, GLuint};
use crate::native::GlApi;
use crate::Error;

use log::{error, warn};

/// Discards any error left pending by earlier GL calls.
pub(crate) fn purge_errors<G>(gl: &G) where G: GlApi + ?Sized {
    while gl.get_error() != gl::NO_ERROR {}
}

/// Drains the GL error queue, reporting the first error found.
pub(crate) fn check_error<G>(gl: &G) -> Result<(), Error> where G: GlApi + ?Sized {
    let mut first_error = None;
    loop {
        let err = gl.get_error();
        if err == gl::NO_ERROR {
            break;
        }
        error!("glError: {} caught", gl_error_string(err));
        first_error.get_or_insert(err);
    }

    match first_error {
        None => Ok(()),
        Some(err) => Err(Error::GLError(err)),
    }
}

pub(crate) fn get_integer<G>(gl: &G, parameter: GLenum) -> Result<GLint, Error>
                             where G: GlApi + ?Sized {
    purge_errors(gl);
    let value = gl.get_integer(parameter);
    check_error(gl)?;
    Ok(value)
}

/// Queries a level-0 parameter of the texture bound to `GL_TEXTURE_2D`.
pub(crate) fn get_texture_param<G>(gl: &G, parameter: GLenum) -> Result<GLint, Error>
                                   where G: GlApi + ?Sized {
    purge_errors(gl);
    let value = gl.get_tex_level_parameter(gl::TEXTURE_2D, 0, parameter);
    check_error(gl)?;
    Ok(value)
}

pub(crate) fn get_current_color<G>(gl: &G) -> Result<[GLfloat; 4], Error>
                                   where G: GlApi + ?Sized {
    purge_errors(gl);
    let color = gl.get_current_color();
    check_error(gl)?;
    Ok(color)
}

/// Returns the `glGetIntegerv()` query naming the texture bound to `target`.
pub(crate) fn texture_binding_query(target: GLenum) -> Option<GLenum> {
    match target {
        gl::TEXTURE_1D => Some(gl::TEXTURE_BINDING_1D),
        gl::TEXTURE_2D => Some(gl::TEXTURE_BINDING_2D),
        gl::TEXTURE_3D => Some(gl::TEXTURE_BINDING_3D),
        gl::TEXTURE_RECTANGLE_ARB => Some(gl::TEXTURE_BINDING_RECTANGLE_ARB),
        _ => None,
    }
}

/// Binds a texture for as long as it lives, then puts the previous binding and enable state of
/// the target back.
///
/// The old texture is rebound only if the binding differs from it at restore time, and the target
/// is disabled only if it was disabled before.
pub(crate) struct TextureBinding<'a, G> where G: GlApi + ?Sized {
    gl: &'a G,
    target: GLenum,
    binding_query: GLenum,
    old_texture: Option<GLuint>,
    was_enabled: bool,
}

impl<'a, G> TextureBinding<'a, G> where G: GlApi + ?Sized {
    pub(crate) fn new(gl: &'a G, target: GLenum, texture: GLuint)
                      -> Result<TextureBinding<'a, G>, Error> {
        let binding_query = match texture_binding_query(target) {
            Some(binding_query) => binding_query,
            None => return Err(Error::UnsupportedTextureTarget(target)),
        };

        let was_enabled = gl.is_enabled(target);
        if !was_enabled {
            gl.enable(target);
        }

        // From here on, dropping `binding` undoes whatever was done.
        let mut binding = TextureBinding {
            gl,
            target,
            binding_query,
            old_texture: None,
            was_enabled,
        };

        let old_texture = get_integer(gl, binding_query)? as GLuint;
        binding.old_texture = Some(old_texture);

        if old_texture != texture {
            purge_errors(gl);
            gl.bind_texture(target, texture);
            check_error(gl)?;
        }

        Ok(binding)
    }
}

impl<'a, G> Drop for TextureBinding<'a, G> where G: GlApi + ?Sized {
    fn drop(&mut self) {
        if let Some(old_texture) = self.old_texture {
            let current_texture = self.gl.get_integer(self.binding_query) as GLuint;
            if current_texture != old_texture {
                self.gl.bind_texture(self.target, old_texture);
            }
        }

        if !self.was_enabled {
            self.gl.disable(self.target);
        }

        // Restoration is best effort; don't let its errors leak into the caller's queue.
        let err = self.gl.get_error();
        if err != gl::NO_ERROR {
            warn!("restoring texture state raised {}", gl_error_string(err));
            purge_errors(self.gl);
        }
    }
}
