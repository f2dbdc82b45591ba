// vaglx/src/device.rs
//
//! The public operations on GL surfaces.

use crate::context::{self, CurrentContextGuard};
use crate::decode::{DecodeBackend, DecodeSurface, DecodeSurfaceID, PresentFlags};
use crate::extensions::{self, ExtensionFunctions, Extensions};
use crate::framebuffer::FramebufferScope;
use crate::gl;
use crate::gl::types::{GLenum, GLuint};
use crate::gl_utils::TextureBinding;
use crate::handle::HandleTable;
use crate::native::Backend;
use crate::surface::{GlSurface, SurfaceID};
use crate::Error;

use euclid::default::{Point2D, Rect};
use log::{debug, warn};

/// Presents decoded video through GL textures.
///
/// A device pairs a windowing/GL backend with the video decoder whose surfaces it presents, and
/// keeps track of every GL surface created through it. All methods expect the caller's GL context
/// to be current on the calling thread; they switch to the surface's private context for the
/// duration of the call and switch back before returning, on failure too.
///
/// Destroy every surface with `destroy_surface()` before dropping the device. Surfaces still
/// alive at that point are leaked.
pub struct Device<B, D> where B: Backend, D: DecodeBackend {
    backend: B,
    decoder: D,
    extensions: Option<Extensions>,
    surfaces: HandleTable<GlSurface>,
}

impl<B, D> Device<B, D> where B: Backend, D: DecodeBackend {
    pub fn new(backend: B, decoder: D) -> Device<B, D> {
        Device { backend, decoder, extensions: None, surfaces: HandleTable::new() }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    #[inline]
    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }

    /// The extension record, once the first surface creation has probed for it.
    #[inline]
    pub fn extensions(&self) -> Option<&Extensions> {
        self.extensions.as_ref()
    }

    pub fn surface(&self, surface_id: SurfaceID) -> Result<&GlSurface, Error> {
        self.surfaces.get(surface_id.0).ok_or(Error::InvalidSurface)
    }

    /// The number of live surfaces.
    #[inline]
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Creates a surface presenting into `texture`.
    ///
    /// `target` must be `GL_TEXTURE_2D`, and `texture` a texture with an RGBA internal format
    /// and a non-empty level 0.
    pub fn create_surface(&mut self, target: GLenum, texture: GLuint)
                          -> Result<SurfaceID, Error> {
        extensions::ensure_extensions(&self.backend, &mut self.extensions)?;

        if target != gl::TEXTURE_2D {
            return Err(Error::UnsupportedTextureTarget(target));
        }
        if !self.backend.is_texture(texture) {
            return Err(Error::InvalidTexture);
        }

        let ambient = context::current_context(&self.backend);
        let mut surface_context = context::create_context(&self.backend, Some(&ambient))?;

        let result = match CurrentContextGuard::enter(&self.backend, &surface_context) {
            Err(err) => Err(err),
            Ok(_guard) => {
                GlSurface::new(&self.backend, surface_context, target, texture)
                    .map_err(|err| Error::SurfaceCreationFailed(Box::new(err)))
            }
        };

        match result {
            Ok(surface) => {
                let surface_id = SurfaceID(self.surfaces.allocate(surface));
                debug!("surface {:?} wraps texture {}", surface_id, texture);
                Ok(surface_id)
            }
            Err(err) => {
                warn!("failed to create a surface for texture {}: {}", texture, err);
                context::destroy_context(&self.backend, &mut surface_context);
                Err(err)
            }
        }
    }

    /// Releases everything the surface owns. The handle is invalid afterwards.
    pub fn destroy_surface(&mut self, surface_id: SurfaceID) -> Result<(), Error> {
        let surface = self.surfaces.get_mut(surface_id.0).ok_or(Error::InvalidSurface)?;
        let functions = extensions::resolved_functions(&self.extensions)?;
        let mut surface_context = surface.context;

        {
            let _guard = CurrentContextGuard::enter(&self.backend, &surface_context)?;
            surface.release(&self.backend, &functions);
            self.surfaces.free(surface_id.0);
        }

        context::destroy_context(&self.backend, &mut surface_context);
        debug!("destroyed surface {:?}", surface_id);
        Ok(())
    }

    /// Presents `decode_surface` into the surface's pixmap, replacing any earlier association.
    pub fn associate_surface(&mut self,
                             surface_id: SurfaceID,
                             decode_surface: DecodeSurfaceID,
                             flags: PresentFlags)
                             -> Result<(), Error> {
        let surface = self.surfaces.get_mut(surface_id.0).ok_or(Error::InvalidSurface)?;
        let decode_surface =
            self.decoder.lookup_surface(decode_surface).ok_or(Error::InvalidDecodeSurface)?;
        let functions = extensions::resolved_functions(&self.extensions)?;

        let _guard = CurrentContextGuard::enter(&self.backend, &surface.context)?;
        associate(&self.backend, &mut self.decoder, &functions, surface, &decode_surface, flags)
    }

    pub fn deassociate_surface(&mut self, surface_id: SurfaceID) -> Result<(), Error> {
        let surface = self.surfaces.get_mut(surface_id.0).ok_or(Error::InvalidSurface)?;
        let functions = extensions::resolved_functions(&self.extensions)?;

        let _guard = CurrentContextGuard::enter(&self.backend, &surface.context)?;
        deassociate(&self.backend, &functions, surface)
    }

    /// Waits until the associated decode surface has been fully decoded.
    pub fn sync_surface(&mut self, surface_id: SurfaceID) -> Result<(), Error> {
        let surface = self.surfaces.get_mut(surface_id.0).ok_or(Error::InvalidSurface)?;

        let _guard = CurrentContextGuard::enter(&self.backend, &surface.context)?;
        sync(&mut self.decoder, surface)
    }

    /// Syncs, then makes the pixmap the image of the surface's pixmap texture.
    pub fn begin_render_surface(&mut self, surface_id: SurfaceID) -> Result<(), Error> {
        let surface = self.surfaces.get_mut(surface_id.0).ok_or(Error::InvalidSurface)?;
        let functions = extensions::resolved_functions(&self.extensions)?;

        let _guard = CurrentContextGuard::enter(&self.backend, &surface.context)?;
        begin_render(&self.backend, &mut self.decoder, &functions, surface)
    }

    pub fn end_render_surface(&mut self, surface_id: SurfaceID) -> Result<(), Error> {
        let surface = self.surfaces.get_mut(surface_id.0).ok_or(Error::InvalidSurface)?;
        let functions = extensions::resolved_functions(&self.extensions)?;

        let _guard = CurrentContextGuard::enter(&self.backend, &surface.context)?;
        end_render(&self.backend, &functions, surface)
    }

    /// Copies the contents of `decode_surface` into the surface's texture.
    ///
    /// The decode surface is associated only for the duration of the copy.
    pub fn copy_surface(&mut self,
                        surface_id: SurfaceID,
                        decode_surface: DecodeSurfaceID,
                        flags: PresentFlags)
                        -> Result<(), Error> {
        let surface = self.surfaces.get_mut(surface_id.0).ok_or(Error::InvalidSurface)?;
        let decode_surface =
            self.decoder.lookup_surface(decode_surface).ok_or(Error::InvalidDecodeSurface)?;
        let functions = extensions::resolved_functions(&self.extensions)?;

        let _guard = CurrentContextGuard::enter(&self.backend, &surface.context)?;
        copy(&self.backend, &mut self.decoder, &functions, surface, &decode_surface, flags)
    }
}

impl<B, D> Drop for Device<B, D> where B: Backend, D: DecodeBackend {
    fn drop(&mut self) {
        // Teardown needs the caller's context current, which can't be assumed here.
        if self.surface_count() > 0 {
            warn!("device dropped with {} live surface(s); their contexts, pixmaps and \
                   framebuffers are leaked",
                  self.surface_count());
        }
    }
}

fn associate<B, D>(backend: &B,
                   decoder: &mut D,
                   functions: &ExtensionFunctions,
                   surface: &mut GlSurface,
                   decode_surface: &DecodeSurface,
                   flags: PresentFlags)
                   -> Result<(), Error>
                   where B: Backend, D: DecodeBackend {
    deassociate(backend, functions, surface)?;

    let source = Rect::new(Point2D::zero(), decode_surface.size);
    let destination = Rect::new(Point2D::zero(), surface.size);
    decoder.put_surface(decode_surface.id,
                        surface.pixmap,
                        &surface.size,
                        &source,
                        &destination,
                        flags | PresentFlags::CLEAR_DRAWABLE)
           .map_err(Error::DecoderFailed)?;

    // A single field is rendered right away rather than at its presentation time.
    if flags.is_single_field() {
        match decoder.lookup_output(decode_surface.id, surface.pixmap) {
            Some(output) if !output.fields.is_empty() => {
                decoder.queue_surface(decode_surface.id, &output).map_err(Error::DecoderFailed)?;
            }
            Some(_) => {}
            None => warn!("no output presents {:?} into {:x}", decode_surface.id, surface.pixmap),
        }
    }

    surface.decode_surface = Some(decode_surface.id);
    Ok(())
}

fn deassociate<B>(backend: &B, functions: &ExtensionFunctions, surface: &mut GlSurface)
                  -> Result<(), Error>
                  where B: Backend {
    surface.unbind_pixmap(backend, functions)?;
    surface.decode_surface = None;
    Ok(())
}

fn sync<D>(decoder: &mut D, surface: &GlSurface) -> Result<(), Error> where D: DecodeBackend {
    let decode_surface = surface.decode_surface
                                .and_then(|decode_surface| decoder.lookup_surface(decode_surface))
                                .ok_or(Error::InvalidDecodeSurface)?;
    decoder.sync_surface(decode_surface.id).map_err(Error::DecoderFailed)
}

fn begin_render<B, D>(backend: &B,
                      decoder: &mut D,
                      functions: &ExtensionFunctions,
                      surface: &mut GlSurface)
                      -> Result<(), Error>
                      where B: Backend, D: DecodeBackend {
    sync(decoder, surface)?;
    surface.bind_pixmap(backend, functions)
}

fn end_render<B>(backend: &B, functions: &ExtensionFunctions, surface: &mut GlSurface)
                 -> Result<(), Error>
                 where B: Backend {
    surface.unbind_pixmap(backend, functions)
}

fn copy<B, D>(backend: &B,
              decoder: &mut D,
              functions: &ExtensionFunctions,
              surface: &mut GlSurface,
              decode_surface: &DecodeSurface,
              flags: PresentFlags)
              -> Result<(), Error>
              where B: Backend, D: DecodeBackend {
    if surface.framebuffer == 0 {
        if let Err(err) = surface.create_fbo_surface(backend, functions) {
            surface.destroy_fbo_surface(backend, functions);
            return Err(err);
        }
    }

    associate(backend, decoder, functions, surface, decode_surface, flags)?;

    {
        let _binding = TextureBinding::new(backend, surface.target, surface.texture)?;
        let _scope = FramebufferScope::enter(backend, functions, surface.framebuffer, surface.size);

        begin_render(backend, decoder, functions, surface)?;
        let rendered = surface.render_pixmap(backend);
        let ended = end_render(backend, functions, surface);
        rendered.and(ended)?;
    }

    deassociate(backend, functions, surface)
}
