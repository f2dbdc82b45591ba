// vaglx/src/context.rs
//
//! Creation of the private GLX contexts surfaces render with, and save/restore of the context
//! current on the calling thread.

use crate::glx;
use crate::native::{Drawable, FbConfig, NativeContext, NativeDisplay, WindowingApi};
use crate::{Error, WindowingApiError};

use log::{debug, warn};
use std::os::raw::c_int;

/// A (display, drawable, context) triple, as made current by `glXMakeCurrent()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextState {
    pub display: NativeDisplay,
    pub drawable: Drawable,
    pub context: NativeContext,
}

impl ContextState {
    /// The state reported when no context is current.
    #[inline]
    pub fn empty() -> ContextState {
        ContextState {
            display: NativeDisplay::null(),
            drawable: 0,
            context: NativeContext::null(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.display.is_null() && self.drawable == 0 && self.context.is_null()
    }
}

/// Creates a context compatible with `parent`, sharing objects with it.
///
/// If `parent` carries a live context, the new context uses the framebuffer configuration with
/// the same `GLX_FBCONFIG_ID`. Otherwise the first double-buffered 8-8-8 RGBA window
/// configuration is used and nothing is shared. The new context targets the parent's drawable.
pub fn create_context<W>(api: &W, parent: Option<&ContextState>) -> Result<ContextState, Error>
                         where W: WindowingApi + ?Sized {
    let parent = parent.filter(|parent| !parent.context.is_null());

    let config = match parent {
        Some(parent) => find_parent_config(api, parent)?,
        None => choose_default_config(api)?,
    };

    let share_with = parent.map_or(NativeContext::null(), |parent| parent.context);
    let context = api.create_new_context(config, share_with);
    if context.is_null() {
        return Err(Error::ContextCreationFailed(WindowingApiError::Failed));
    }

    debug!("created GLX context {:?} (shared with {:?})", context, share_with);
    Ok(ContextState {
        display: api.display(),
        drawable: parent.map_or(0, |parent| parent.drawable),
        context,
    })
}

fn find_parent_config<W>(api: &W, parent: &ContextState) -> Result<FbConfig, Error>
                         where W: WindowingApi + ?Sized {
    let fb_config_id = api.query_context(parent.display,
                                         parent.context,
                                         glx::FBCONFIG_ID as c_int)
                          .map_err(Error::ContextCreationFailed)?;

    api.fb_configs()
       .into_iter()
       .find(|&config| {
           api.fb_config_attrib(config, glx::FBCONFIG_ID as c_int) == Ok(fb_config_id)
       })
       .ok_or(Error::NoPixelFormatFound)
}

fn choose_default_config<W>(api: &W) -> Result<FbConfig, Error> where W: WindowingApi + ?Sized {
    let attributes = [
        glx::DRAWABLE_TYPE as c_int,    glx::WINDOW_BIT as c_int,
        glx::RENDER_TYPE as c_int,      glx::RGBA_BIT as c_int,
        glx::DOUBLEBUFFER as c_int,     1,
        glx::RED_SIZE as c_int,         8,
        glx::GREEN_SIZE as c_int,       8,
        glx::BLUE_SIZE as c_int,        8,
        0,
    ];
    api.choose_fb_config(&attributes).into_iter().next().ok_or(Error::NoPixelFormatFound)
}

/// Destroys the context if it was ever created. Safe to call on an empty or already destroyed
/// state.
pub fn destroy_context<W>(api: &W, state: &mut ContextState) where W: WindowingApi + ?Sized {
    if !state.display.is_null() && !state.context.is_null() {
        api.destroy_context(state.display, state.context);
        state.display = NativeDisplay::null();
        state.context = NativeContext::null();
    }
}

/// Captures whatever is current on the calling thread.
pub fn current_context<W>(api: &W) -> ContextState where W: WindowingApi + ?Sized {
    ContextState {
        display: api.current_display(),
        drawable: api.current_drawable(),
        context: api.current_context(),
    }
}

/// Makes `new` current.
///
/// A state without a display is what `current_context()` reports when nothing was current; it
/// is accepted without a switch as long as its other fields are empty too. If `old` is given,
/// the previously current state is stored there, and nothing is switched when it already equals
/// `new`.
pub fn set_current_context<W>(api: &W, new: &ContextState, old: Option<&mut ContextState>)
                              -> Result<(), Error>
                              where W: WindowingApi + ?Sized {
    if new.display.is_null() {
        if new.is_empty() {
            return Ok(());
        }
        return Err(Error::MakeCurrentFailed(WindowingApiError::BadContext));
    }

    if let Some(old) = old {
        *old = current_context(api);
        if *old == *new {
            return Ok(());
        }
    }

    if !api.make_current(new.display, new.drawable, new.context) {
        return Err(Error::MakeCurrentFailed(WindowingApiError::Failed));
    }
    Ok(())
}

/// Keeps a context current for as long as it lives, restoring the previously current one when
/// dropped.
pub(crate) struct CurrentContextGuard<'a, W> where W: WindowingApi + ?Sized {
    api: &'a W,
    previous: ContextState,
    switched: bool,
    /// The display to release if nothing was current before we switched.
    release_display: Option<NativeDisplay>,
}

impl<'a, W> CurrentContextGuard<'a, W> where W: WindowingApi + ?Sized {
    pub(crate) fn enter(api: &'a W, context: &ContextState)
                        -> Result<CurrentContextGuard<'a, W>, Error> {
        let mut previous = ContextState::empty();
        set_current_context(api, context, Some(&mut previous))?;

        let switched = !context.display.is_null() && previous != *context;
        let release_display = if switched && previous.display.is_null() {
            Some(context.display)
        } else {
            None
        };

        Ok(CurrentContextGuard { api, previous, switched, release_display })
    }
}

impl<'a, W> Drop for CurrentContextGuard<'a, W> where W: WindowingApi + ?Sized {
    fn drop(&mut self) {
        if !self.switched {
            return;
        }

        if let Some(display) = self.release_display {
            if !self.api.make_current(display, 0, NativeContext::null()) {
                warn!("failed to release the current context");
            }
            return;
        }

        if let Err(err) = set_current_context(self.api, &self.previous, None) {
            warn!("failed to restore the previous context: {:?}", err);
        }
    }
}
