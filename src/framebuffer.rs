// vaglx/src/framebuffer.rs
//
//! The framebuffer object used to copy decoded frames into a surface's own texture.

use crate::extensions::ExtensionFunctions;
use crate::gl;
use crate::gl::types::{GLfloat, GLsizei, GLuint};
use crate::native::GlApi;
use crate::surface::GlSurface;
use crate::Error;

use euclid::default::Size2D;
use log::warn;

impl GlSurface {
    /// Creates a framebuffer object with the surface's texture as its color attachment.
    ///
    /// The framebuffer is recorded even if it turns out to be incomplete, so
    /// `destroy_fbo_surface()` still frees it.
    pub(crate) fn create_fbo_surface<G>(&mut self, gl: &G, functions: &ExtensionFunctions)
                                        -> Result<(), Error>
                                        where G: GlApi + ?Sized {
        let framebuffer = gl.gen_framebuffer(functions);
        self.framebuffer = framebuffer;

        gl.bind_framebuffer(functions, gl::FRAMEBUFFER_EXT, framebuffer);
        gl.framebuffer_texture_2d(functions,
                                  gl::FRAMEBUFFER_EXT,
                                  gl::COLOR_ATTACHMENT0_EXT,
                                  gl::TEXTURE_2D,
                                  self.texture,
                                  0);
        let status = gl.check_framebuffer_status(functions, gl::FRAMEBUFFER_EXT);
        gl.bind_framebuffer(functions, gl::FRAMEBUFFER_EXT, 0);

        if status != gl::FRAMEBUFFER_COMPLETE_EXT {
            warn!("framebuffer {} is incomplete: 0x{:x}", framebuffer, status);
            return Err(Error::IncompleteFramebuffer(status));
        }
        Ok(())
    }

    /// Deletes the framebuffer object, if any. Idempotent.
    pub(crate) fn destroy_fbo_surface<G>(&mut self, gl: &G, functions: &ExtensionFunctions)
                                         where G: GlApi + ?Sized {
        if self.framebuffer != 0 {
            gl.delete_framebuffer(functions, self.framebuffer);
            self.framebuffer = 0;
        }
    }
}

/// Renders into a framebuffer object for as long as it lives.
///
/// Entering binds the framebuffer, saves both matrix stacks and maps (0, 0)-(width, height) onto
/// the viewport. Dropping restores the matrices and rebinds the default framebuffer.
pub(crate) struct FramebufferScope<'a, G> where G: GlApi + ?Sized {
    gl: &'a G,
    functions: &'a ExtensionFunctions,
}

impl<'a, G> FramebufferScope<'a, G> where G: GlApi + ?Sized {
    pub(crate) fn enter(gl: &'a G,
                        functions: &'a ExtensionFunctions,
                        framebuffer: GLuint,
                        size: Size2D<u32>)
                        -> FramebufferScope<'a, G> {
        gl.bind_framebuffer(functions, gl::FRAMEBUFFER_EXT, framebuffer);
        gl.matrix_mode(gl::PROJECTION);
        gl.push_matrix();
        gl.load_identity();
        gl.matrix_mode(gl::MODELVIEW);
        gl.push_matrix();
        gl.load_identity();
        gl.viewport(0, 0, size.width as GLsizei, size.height as GLsizei);
        gl.translate(-1.0, -1.0, 0.0);
        gl.scale(2.0 / size.width as GLfloat, 2.0 / size.height as GLfloat, 1.0);

        FramebufferScope { gl, functions }
    }
}

impl<'a, G> Drop for FramebufferScope<'a, G> where G: GlApi + ?Sized {
    fn drop(&mut self) {
        self.gl.matrix_mode(gl::PROJECTION);
        self.gl.pop_matrix();
        self.gl.matrix_mode(gl::MODELVIEW);
        self.gl.pop_matrix();
        self.gl.bind_framebuffer(self.functions, gl::FRAMEBUFFER_EXT, 0);
    }
}
