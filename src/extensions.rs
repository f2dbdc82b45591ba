// vaglx/src/extensions.rs
//
//! Discovery of the GL and GLX extensions the surface machinery relies on.
//!
//! Texture-from-pixmap needs `GLX_EXT_texture_from_pixmap`; the copy path needs framebuffer
//! objects; and surfaces sized like video frames need non-power-of-two textures. The verdict is
//! computed once per device and never recomputed, even if the GL implementation changes under
//! us.

use crate::native::Backend;
use crate::Error;

use log::{debug, warn};
use std::os::raw::c_void;
use std::ptr::NonNull;

/// A resolved extension entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcAddress(NonNull<c_void>);

/// The extension entry points, resolved.
#[derive(Clone, Copy, Debug)]
pub struct ExtensionFunctions {
    pub glx_bind_tex_image: ProcAddress,
    pub glx_release_tex_image: ProcAddress,
    pub gen_framebuffers: ProcAddress,
    pub delete_framebuffers: ProcAddress,
    pub bind_framebuffer: ProcAddress,
    pub gen_renderbuffers: ProcAddress,
    pub delete_renderbuffers: ProcAddress,
    pub bind_renderbuffer: ProcAddress,
    pub renderbuffer_storage: ProcAddress,
    pub framebuffer_renderbuffer: ProcAddress,
    pub framebuffer_texture_2d: ProcAddress,
    pub check_framebuffer_status: ProcAddress,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtensionStatus {
    /// Nobody has asked yet.
    Unknown,
    Supported,
    Unsupported,
}

/// The per-device extension record.
#[derive(Debug)]
pub struct Extensions {
    status: ExtensionStatus,
    functions: Option<ExtensionFunctions>,
}

impl ProcAddress {
    #[inline]
    pub fn as_ptr(self) -> *const c_void {
        self.0.as_ptr()
    }
}

impl Default for Extensions {
    fn default() -> Extensions {
        Extensions { status: ExtensionStatus::Unknown, functions: None }
    }
}

impl Extensions {
    #[inline]
    pub fn status(&self) -> ExtensionStatus {
        self.status
    }

    /// Returns the entry points if the extensions were found to be supported.
    #[inline]
    pub fn functions(&self) -> Option<&ExtensionFunctions> {
        match self.status {
            ExtensionStatus::Supported => self.functions.as_ref(),
            ExtensionStatus::Unknown | ExtensionStatus::Unsupported => None,
        }
    }
}

/// Makes sure texture-from-pixmap and framebuffer objects are usable, resolving their entry
/// points on the first call.
///
/// A GL context must be current on the first call, since the GL extension string is queried.
/// The record is allocated on first access.
pub fn ensure_extensions<B>(backend: &B, extensions: &mut Option<Extensions>)
                            -> Result<ExtensionFunctions, Error>
                            where B: Backend + ?Sized {
    let extensions = extensions.get_or_insert_with(Extensions::default);

    if extensions.status == ExtensionStatus::Unknown {
        // Any early return below leaves the failure cached.
        extensions.status = ExtensionStatus::Unsupported;
        check_extensions(backend)?;
        extensions.functions = Some(load_extensions(backend)?);
        extensions.status = ExtensionStatus::Supported;
        debug!("texture-from-pixmap and framebuffer object extensions are available");
    }

    extensions.functions().cloned().ok_or(Error::RequiredExtensionUnavailable)
}

/// Returns the entry points resolved by an earlier successful `ensure_extensions()`.
pub(crate) fn resolved_functions(extensions: &Option<Extensions>)
                                 -> Result<ExtensionFunctions, Error> {
    extensions.as_ref()
              .and_then(Extensions::functions)
              .cloned()
              .ok_or(Error::RequiredExtensionUnavailable)
}

fn check_extensions<B>(backend: &B) -> Result<(), Error> where B: Backend + ?Sized {
    let gl_extensions = backend.gl_extensions();
    let glx_extensions = backend.glx_extensions();

    let required = [
        has_extension(&gl_extensions, "GL_ARB_texture_non_power_of_two"),
        has_extension(&glx_extensions, "GLX_EXT_texture_from_pixmap"),
        has_extension(&gl_extensions, "GL_ARB_framebuffer_object") ||
            has_extension(&gl_extensions, "GL_EXT_framebuffer_object"),
    ];
    if required.iter().all(|&present| present) {
        return Ok(());
    }

    warn!("required extensions missing (GL: {:?}, GLX: {:?})", gl_extensions, glx_extensions);
    Err(Error::RequiredExtensionUnavailable)
}

fn load_extensions<B>(backend: &B) -> Result<ExtensionFunctions, Error>
                      where B: Backend + ?Sized {
    let lookup = |symbol_name: &'static str| {
        match NonNull::new(backend.get_proc_address(symbol_name) as *mut c_void) {
            Some(address) => Ok(ProcAddress(address)),
            None => {
                warn!("extension entry point `{}` not found", symbol_name);
                Err(Error::GLFunctionNotFound(symbol_name))
            }
        }
    };

    Ok(ExtensionFunctions {
        glx_bind_tex_image: lookup("glXBindTexImageEXT")?,
        glx_release_tex_image: lookup("glXReleaseTexImageEXT")?,
        gen_framebuffers: lookup("glGenFramebuffersEXT")?,
        delete_framebuffers: lookup("glDeleteFramebuffersEXT")?,
        bind_framebuffer: lookup("glBindFramebufferEXT")?,
        gen_renderbuffers: lookup("glGenRenderbuffersEXT")?,
        delete_renderbuffers: lookup("glDeleteRenderbuffersEXT")?,
        bind_renderbuffer: lookup("glBindRenderbufferEXT")?,
        renderbuffer_storage: lookup("glRenderbufferStorageEXT")?,
        framebuffer_renderbuffer: lookup("glFramebufferRenderbufferEXT")?,
        framebuffer_texture_2d: lookup("glFramebufferTexture2DEXT")?,
        check_framebuffer_status: lookup("glCheckFramebufferStatusEXT")?,
    })
}

/// Extension strings are space-separated lists; a marker must match a whole entry.
fn has_extension(extensions: &str, name: &str) -> bool {
    extensions.split_whitespace().any(|extension| extension == name)
}

#[cfg(test)]
mod tests {
    use super::has_extension;

    #[test]
    fn test_extension_markers_match_whole_words() {
        let extensions = "GL_EXT_framebuffer_object_ex GL_ARB_texture_non_power_of_two";
        assert!(has_extension(extensions, "GL_ARB_texture_non_power_of_two"));
        assert!(!has_extension(extensions, "GL_EXT_framebuffer_object"));
        assert!(!has_extension("", "GL_EXT_framebuffer_object"));
    }
}
