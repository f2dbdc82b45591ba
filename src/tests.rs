// vaglx/src/tests.rs
//
//! Unit tests.

use crate::decode::{DecodeSurfaceID, PresentFlags};
use crate::context::{self, create_context, destroy_context, set_current_context};
use crate::extensions::ExtensionStatus;
use crate::gl;
use crate::gl::types::GLuint;
use crate::glx;
use crate::native::{GlApi, NativeContext, NativeDisplay, WindowingApi};
use crate::platform::mock::{MockBackend, MockDecoder, MockFailures, ResourceCounts};
use crate::{ContextState, Device, Error, Status, SurfaceID, WindowingApiError};

use euclid::default::Size2D;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::os::raw::c_int;

const SD_FRAME: DecodeSurfaceID = DecodeSurfaceID(1);
const HD_FRAME: DecodeSurfaceID = DecodeSurfaceID(2);

type MockDevice = Device<MockBackend, MockDecoder>;
type InjectFailure = fn(&mut MockFailures);

fn create_device(backend: MockBackend) -> (MockDevice, ContextState) {
    let caller = backend.create_caller_context();
    let mut decoder = MockDecoder::new();
    decoder.add_surface(SD_FRAME, Size2D::new(720, 480));
    decoder.add_surface(HD_FRAME, Size2D::new(1920, 1080));
    (Device::new(backend, decoder), caller)
}

fn create_device_and_surface() -> (MockDevice, ContextState, SurfaceID) {
    let (mut device, caller) = create_device(MockBackend::new());
    let texture = device.backend().create_texture(gl::RGBA8, 256, 128, 0);
    let surface_id = device.create_surface(gl::TEXTURE_2D, texture).unwrap();
    (device, caller, surface_id)
}

fn wrapped(error: Error) -> Error {
    Error::SurfaceCreationFailed(Box::new(error))
}

fn has_attribute(attributes: &[c_int], name: u32, value: c_int) -> bool {
    attributes.chunks(2).any(|pair| pair.len() == 2 && pair[0] == name as c_int && pair[1] == value)
}

fn has_attribute_name(attributes: &[c_int], name: u32) -> bool {
    attributes.chunks(2).any(|pair| pair.len() == 2 && pair[0] == name as c_int)
}

fn assert_no_x_errors(backend: &MockBackend) {
    assert!(backend.fatal_x_errors().is_empty());
    assert_eq!(backend.gl_calls_without_context(), 0);
}

#[test]
fn test_surface_creation() {
    let (device, caller, surface_id) = create_device_and_surface();
    let backend = device.backend();

    let surface = device.surface(surface_id).unwrap();
    assert_eq!(surface.target(), gl::TEXTURE_2D);
    assert_eq!(surface.size(), Size2D::new(256, 128));
    assert_eq!(surface.decode_surface(), None);
    assert!(!surface.is_bound());
    assert!(!surface.has_framebuffer());
    assert!(backend.pixmap_exists(surface.pixmap()));
    assert!(backend.texture_exists(surface.pixmap_texture()));
    assert!(!backend.is_glx_pixmap_bound(surface.glx_pixmap()));

    // The private context shares objects with the caller's and renders to the same window.
    assert_ne!(surface.context().context, caller.context);
    assert_eq!(surface.context().drawable, caller.drawable);

    assert_eq!(backend.current(), caller);
    assert_eq!(backend.resource_counts(), ResourceCounts {
        contexts: 2,
        pixmaps: 1,
        glx_pixmaps: 1,
        textures: 2,
        framebuffers: 0,
    });
    assert_eq!(device.extensions().map(|extensions| extensions.status()),
               Some(ExtensionStatus::Supported));
    assert_no_x_errors(backend);
}

#[test]
fn test_texture_border_is_excluded_from_size() {
    let (mut device, _) = create_device(MockBackend::new());
    let texture = device.backend().create_texture(gl::RGBA, 64, 32, 1);
    let surface_id = device.create_surface(gl::TEXTURE_2D, texture).unwrap();
    assert_eq!(device.surface(surface_id).unwrap().size(), Size2D::new(64, 32));
}

#[test]
fn test_creation_rejects_bad_textures() {
    let (mut device, caller) = create_device(MockBackend::new());
    let good = device.backend().create_texture(gl::RGBA8, 256, 128, 0);
    let luminance = device.backend().create_texture(gl::LUMINANCE, 256, 128, 0);
    let empty = device.backend().create_texture(gl::RGBA, 0, 128, 0);
    let bordered_empty = device.backend().create_texture(gl::RGBA, 0, 16, 1);
    let baseline = device.backend().resource_counts();

    let result = device.create_surface(gl::TEXTURE_RECTANGLE_ARB, good);
    assert_eq!(result, Err(Error::UnsupportedTextureTarget(gl::TEXTURE_RECTANGLE_ARB)));
    assert_eq!(Status::from_result(&result), Status::InvalidParameter);

    let result = device.create_surface(gl::TEXTURE_2D, 999);
    assert_eq!(result, Err(Error::InvalidTexture));
    assert_eq!(Status::from_result(&result), Status::InvalidParameter);

    let result = device.create_surface(gl::TEXTURE_2D, luminance);
    assert_eq!(result, Err(wrapped(Error::UnsupportedTextureFormat(gl::LUMINANCE))));
    assert_eq!(Status::from_result(&result), Status::AllocationFailed);

    for &texture in &[empty, bordered_empty] {
        let result = device.create_surface(gl::TEXTURE_2D, texture);
        assert_eq!(result, Err(wrapped(Error::EmptyTexture)));
        assert_eq!(Status::from_result(&result), Status::AllocationFailed);
    }

    let backend = device.backend();
    assert_eq!(backend.resource_counts(), baseline);
    assert_eq!(backend.current(), caller);
    assert_eq!(device.surface_count(), 0);
    assert_no_x_errors(backend);
}

// Every step of creation can fail; none of them may leave a resource or a switched context
// behind.
#[test]
fn test_creation_failures_release_everything() {
    let failures: [(InjectFailure, Error); 7] = [
        (|failures: &mut MockFailures| failures.create_context = true,
         Error::ContextCreationFailed(WindowingApiError::Failed)),
        (|failures: &mut MockFailures| failures.make_current = true,
         Error::MakeCurrentFailed(WindowingApiError::Failed)),
        (|failures: &mut MockFailures| failures.create_pixmap = true,
         wrapped(Error::PixmapCreationFailed(WindowingApiError::BadAlloc))),
        (|failures: &mut MockFailures| failures.get_geometry = true,
         wrapped(Error::PixmapCreationFailed(WindowingApiError::BadDrawable))),
        (|failures: &mut MockFailures| failures.pixmap_depth = Some(16),
         wrapped(Error::UnsupportedPixmapDepth(16))),
        (|failures: &mut MockFailures| failures.no_fb_config = true,
         wrapped(Error::NoPixelFormatFound)),
        (|failures: &mut MockFailures| failures.create_glx_pixmap = true,
         wrapped(Error::GlxPixmapCreationFailed(WindowingApiError::BadMatch))),
    ];

    let (mut device, caller) = create_device(MockBackend::new());
    let texture = device.backend().create_texture(gl::RGBA8, 256, 128, 0);
    let baseline = device.backend().resource_counts();

    for (inject, expected) in failures {
        device.backend().inject_failures(inject);
        let result = device.create_surface(gl::TEXTURE_2D, texture);
        println!("expecting {:?}", expected);
        assert_eq!(Status::from_result(&result), expected.status());
        assert_eq!(result, Err(expected));
        device.backend().clear_failures();

        let backend = device.backend();
        assert_eq!(backend.resource_counts(), baseline);
        assert_eq!(backend.current(), caller);
        assert_eq!(device.surface_count(), 0);
        assert_no_x_errors(backend);
    }

    let surface_id = device.create_surface(gl::TEXTURE_2D, texture).unwrap();
    device.destroy_surface(surface_id).unwrap();
    assert_eq!(device.backend().resource_counts(), baseline);
}

#[test]
fn test_missing_extension_is_remembered() {
    let (mut device, caller) = create_device(MockBackend::new());
    let texture = device.backend().create_texture(gl::RGBA8, 256, 128, 0);
    let baseline = device.backend().resource_counts();

    device.backend().inject_failures(|failures| {
        failures.missing_extension = Some("GLX_EXT_texture_from_pixmap");
    });
    let result = device.create_surface(gl::TEXTURE_2D, texture);
    assert_eq!(result, Err(Error::RequiredExtensionUnavailable));
    assert_eq!(Status::from_result(&result), Status::OperationFailed);
    assert_eq!(device.extensions().unwrap().status(), ExtensionStatus::Unsupported);
    let queries = device.backend().extension_queries();

    // The verdict sticks even once the extension shows up.
    device.backend().clear_failures();
    let result = device.create_surface(gl::TEXTURE_2D, texture);
    assert_eq!(result, Err(Error::RequiredExtensionUnavailable));
    assert_eq!(device.backend().extension_queries(), queries);

    assert_eq!(device.backend().resource_counts(), baseline);
    assert_eq!(device.backend().current(), caller);
}

#[test]
fn test_each_required_extension_is_checked() {
    let markers = [
        "GL_ARB_texture_non_power_of_two",
        "GL_EXT_framebuffer_object",
        "GLX_EXT_texture_from_pixmap",
    ];
    for &marker in &markers {
        let (mut device, _) = create_device(MockBackend::new());
        let texture = device.backend().create_texture(gl::RGBA8, 256, 128, 0);
        device.backend().inject_failures(|failures| failures.missing_extension = Some(marker));
        assert_eq!(device.create_surface(gl::TEXTURE_2D, texture),
                   Err(Error::RequiredExtensionUnavailable));
    }
}

#[test]
fn test_missing_entry_point_is_remembered() {
    let (mut device, _) = create_device(MockBackend::new());
    let texture = device.backend().create_texture(gl::RGBA8, 256, 128, 0);

    device.backend().inject_failures(|failures| {
        failures.missing_entry_point = Some("glFramebufferTexture2DEXT");
    });
    assert_eq!(device.create_surface(gl::TEXTURE_2D, texture),
               Err(Error::GLFunctionNotFound("glFramebufferTexture2DEXT")));
    assert_eq!(device.extensions().unwrap().status(), ExtensionStatus::Unsupported);
    assert!(device.extensions().unwrap().functions().is_none());

    device.backend().clear_failures();
    assert_eq!(device.create_surface(gl::TEXTURE_2D, texture),
               Err(Error::RequiredExtensionUnavailable));
}

#[test]
fn test_extensions_are_probed_once() {
    let (mut device, _, _) = create_device_and_surface();
    let queries = device.backend().extension_queries();
    assert_eq!(queries, 2);

    let texture = device.backend().create_texture(gl::RGBA8, 32, 32, 0);
    device.create_surface(gl::TEXTURE_2D, texture).unwrap();
    assert_eq!(device.backend().extension_queries(), queries);
    assert!(device.extensions().unwrap().functions().is_some());
}

#[test]
fn test_bind_and_unbind_are_idempotent() {
    let (mut device, caller, surface_id) = create_device_and_surface();
    device.associate_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    let glx_pixmap = device.surface(surface_id).unwrap().glx_pixmap();

    for _ in 0..2 {
        device.begin_render_surface(surface_id).unwrap();
        assert!(device.surface(surface_id).unwrap().is_bound());
        assert!(device.backend().is_glx_pixmap_bound(glx_pixmap));
    }
    for _ in 0..2 {
        device.end_render_surface(surface_id).unwrap();
        assert!(!device.surface(surface_id).unwrap().is_bound());
        assert!(!device.backend().is_glx_pixmap_bound(glx_pixmap));
    }

    // Each begin syncs, even when the pixmap is already bound.
    assert_eq!(device.decoder().syncs, vec![SD_FRAME, SD_FRAME]);
    assert_eq!(device.backend().current(), caller);
    assert_no_x_errors(device.backend());
}

#[test]
fn test_random_bind_sequences_track_bound_state() {
    let (mut device, caller, surface_id) = create_device_and_surface();
    let glx_pixmap = device.surface(surface_id).unwrap().glx_pixmap();
    let mut rng = StdRng::seed_from_u64(0x7fb);
    let (mut associated, mut bound) = (false, false);

    for _ in 0..500 {
        match rng.gen_range(0..4) {
            0 => {
                let result = device.begin_render_surface(surface_id);
                if associated {
                    result.unwrap();
                    bound = true;
                } else {
                    assert_eq!(result, Err(Error::InvalidDecodeSurface));
                }
            }
            1 => {
                device.end_render_surface(surface_id).unwrap();
                bound = false;
            }
            2 => {
                let decode_surface = if rng.gen_bool(0.5) { SD_FRAME } else { HD_FRAME };
                device.associate_surface(surface_id, decode_surface, PresentFlags::empty())
                      .unwrap();
                associated = true;
                bound = false;
            }
            _ => {
                device.deassociate_surface(surface_id).unwrap();
                associated = false;
                bound = false;
            }
        }

        let surface = device.surface(surface_id).unwrap();
        assert_eq!(surface.is_bound(), bound);
        assert_eq!(surface.decode_surface().is_some(), associated);
        assert_eq!(device.backend().is_glx_pixmap_bound(glx_pixmap), bound);
        assert_eq!(device.backend().current(), caller);
    }
    assert_no_x_errors(device.backend());
}

#[test]
fn test_operations_restore_the_current_context() {
    let (mut device, caller, surface_id) = create_device_and_surface();

    let results = vec![
        device.sync_surface(surface_id),
        device.begin_render_surface(surface_id),
        device.associate_surface(surface_id, DecodeSurfaceID(99), PresentFlags::empty()),
        device.associate_surface(surface_id, SD_FRAME, PresentFlags::TOP_FIELD),
        device.sync_surface(surface_id),
        device.begin_render_surface(surface_id),
        device.end_render_surface(surface_id),
        device.copy_surface(surface_id, HD_FRAME, PresentFlags::empty()),
        device.deassociate_surface(surface_id),
    ];
    assert_eq!(results[0], Err(Error::InvalidDecodeSurface));
    assert_eq!(results[1], Err(Error::InvalidDecodeSurface));
    assert_eq!(results[2], Err(Error::InvalidDecodeSurface));
    assert!(results[3..].iter().all(Result::is_ok));

    assert_eq!(device.backend().current(), caller);
    device.destroy_surface(surface_id).unwrap();
    assert_eq!(device.backend().current(), caller);
}

#[test]
fn test_operations_without_a_current_context_release_theirs() {
    let (mut device, _, surface_id) = create_device_and_surface();
    {
        let backend = device.backend();
        assert!(backend.make_current(backend.display(), 0, NativeContext::null()));
    }

    device.associate_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    device.begin_render_surface(surface_id).unwrap();
    device.end_render_surface(surface_id).unwrap();
    assert!(device.backend().current().is_empty());

    device.destroy_surface(surface_id).unwrap();
    assert!(device.backend().current().is_empty());
}

#[test]
fn test_no_switch_when_surface_context_is_current() {
    let (mut device, _, surface_id) = create_device_and_surface();
    let context = *device.surface(surface_id).unwrap().context();
    {
        let backend = device.backend();
        assert!(backend.make_current(context.display, context.drawable, context.context));
    }

    let calls = device.backend().make_current_calls();
    device.associate_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    device.deassociate_surface(surface_id).unwrap();
    assert_eq!(device.backend().make_current_calls(), calls);
    assert_eq!(device.backend().current(), context);
}

#[test]
fn test_half_empty_context_states_are_rejected() {
    let backend = MockBackend::new();
    let caller = backend.create_caller_context();
    let calls = backend.make_current_calls();

    let orphans = [
        ContextState { display: NativeDisplay::null(), ..caller },
        ContextState { display: NativeDisplay::null(), context: NativeContext::null(), ..caller },
        ContextState { display: NativeDisplay::null(), drawable: 0, ..caller },
    ];
    for orphan in &orphans {
        assert_eq!(set_current_context(&backend, orphan, None),
                   Err(Error::MakeCurrentFailed(WindowingApiError::BadContext)));
    }

    // Restoring "nothing was current" is a no-op.
    assert_eq!(set_current_context(&backend, &ContextState::empty(), None), Ok(()));

    // Neither is switching to what is already current.
    let mut previous = ContextState::empty();
    assert_eq!(set_current_context(&backend, &caller, Some(&mut previous)), Ok(()));
    assert_eq!(previous, caller);

    assert_eq!(backend.make_current_calls(), calls);
    assert_eq!(backend.current(), caller);
}

#[test]
fn test_context_without_parent_uses_default_config() {
    let backend = MockBackend::new();
    let caller = backend.create_caller_context();

    for parent in &[None, Some(ContextState::empty())] {
        let mut state = create_context(&backend, parent.as_ref()).unwrap();
        assert_eq!(state.display, backend.display());
        assert_eq!(state.drawable, 0);
        assert_ne!(state.context, caller.context);

        // The first match for a double-buffered 8-8-8 RGBA window.
        let request = backend.fb_config_requests().last().cloned().unwrap();
        assert!(has_attribute(&request, glx::DRAWABLE_TYPE, glx::WINDOW_BIT as c_int));
        assert!(has_attribute(&request, glx::RENDER_TYPE, glx::RGBA_BIT as c_int));
        assert!(has_attribute(&request, glx::DOUBLEBUFFER, 1));
        for &channel in &[glx::RED_SIZE, glx::GREEN_SIZE, glx::BLUE_SIZE] {
            assert!(has_attribute(&request, channel, 8));
        }
        assert_eq!(backend.query_context(state.display,
                                         state.context,
                                         glx::FBCONFIG_ID as c_int),
                   Ok(0x21));

        destroy_context(&backend, &mut state);
    }

    // A parent with a context shares its config instead of choosing one.
    let requests = backend.fb_config_requests().len();
    let mut state = create_context(&backend, Some(&caller)).unwrap();
    assert_eq!(backend.fb_config_requests().len(), requests);
    assert_eq!(backend.query_context(state.display, state.context, glx::FBCONFIG_ID as c_int),
               backend.query_context(caller.display, caller.context, glx::FBCONFIG_ID as c_int));
    destroy_context(&backend, &mut state);

    assert_eq!(backend.current(), caller);
    assert_eq!(backend.resource_counts().contexts, 1);
}

#[test]
fn test_destroying_a_context_twice() {
    let backend = MockBackend::new();
    let caller = backend.create_caller_context();

    let mut state = create_context(&backend, Some(&caller)).unwrap();
    assert_eq!(backend.resource_counts().contexts, 2);
    destroy_context(&backend, &mut state);
    assert!(state.context.is_null());
    assert_eq!(backend.resource_counts().contexts, 1);

    destroy_context(&backend, &mut state);
    destroy_context(&backend, &mut ContextState::empty());
    assert_eq!(backend.resource_counts().contexts, 1);
    assert_eq!(context::current_context(&backend), caller);
}

#[test]
fn test_dropping_a_device_with_live_surfaces() {
    let (device, caller, _) = create_device_and_surface();
    assert_eq!(device.surface_count(), 1);
    assert_eq!(device.backend().current(), caller);
    drop(device);
}

#[test]
fn test_reassociation_replaces_previous_association() {
    let (mut device, caller, surface_id) = create_device_and_surface();
    device.associate_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    device.begin_render_surface(surface_id).unwrap();
    let counts = device.backend().resource_counts();

    device.associate_surface(surface_id, HD_FRAME, PresentFlags::empty()).unwrap();
    let surface = device.surface(surface_id).unwrap();
    assert_eq!(surface.decode_surface(), Some(HD_FRAME));
    assert!(!surface.is_bound());
    assert!(!device.backend().is_glx_pixmap_bound(surface.glx_pixmap()));
    assert_eq!(device.backend().resource_counts(), counts);

    let presents = &device.decoder().presents;
    assert_eq!(presents.len(), 2);
    let present = &presents[1];
    assert_eq!(present.surface, HD_FRAME);
    assert_eq!(present.pixmap, surface.pixmap());
    assert_eq!(present.pixmap_size, Size2D::new(256, 128));
    assert_eq!(present.source.size, Size2D::new(1920, 1080));
    assert!(present.source.origin.x == 0 && present.source.origin.y == 0);
    assert_eq!(present.destination.size, Size2D::new(256, 128));
    assert_eq!(present.flags, PresentFlags::CLEAR_DRAWABLE);

    // An unknown decode surface leaves the association alone.
    assert_eq!(device.associate_surface(surface_id, DecodeSurfaceID(42), PresentFlags::empty()),
               Err(Error::InvalidDecodeSurface));
    assert_eq!(device.surface(surface_id).unwrap().decode_surface(), Some(HD_FRAME));
    assert_eq!(device.backend().current(), caller);
}

#[test]
fn test_single_field_association_renders_immediately() {
    let (mut device, _, surface_id) = create_device_and_surface();
    let pixmap = device.surface(surface_id).unwrap().pixmap();

    let cases = [
        (PresentFlags::empty(), false),
        (PresentFlags::TOP_FIELD | PresentFlags::BOTTOM_FIELD, false),
        (PresentFlags::TOP_FIELD, true),
        (PresentFlags::BOTTOM_FIELD, true),
    ];
    for &(flags, queued) in &cases {
        let before = device.decoder().queued.len();
        device.associate_surface(surface_id, SD_FRAME, flags).unwrap();
        assert_eq!(device.decoder().presents.last().unwrap().flags,
                   flags | PresentFlags::CLEAR_DRAWABLE);

        let after = &device.decoder().queued;
        assert_eq!(after.len(), before + queued as usize);
        if queued {
            let (surface, output) = after[after.len() - 1];
            assert_eq!(surface, SD_FRAME);
            assert_eq!(output.drawable, pixmap);
            assert_eq!(output.fields, flags);
        }
    }

    // Without a matching output there is nothing to queue, and that isn't an error.
    device.decoder_mut().skip_outputs = true;
    device.decoder_mut().remove_surface(HD_FRAME);
    device.decoder_mut().add_surface(HD_FRAME, Size2D::new(1920, 1080));
    let before = device.decoder().queued.len();
    device.associate_surface(surface_id, HD_FRAME, PresentFlags::TOP_FIELD).unwrap();
    assert_eq!(device.decoder().queued.len(), before);
}

#[test]
fn test_decoder_failures_propagate() {
    let (mut device, caller, surface_id) = create_device_and_surface();

    device.decoder_mut().put_failure = Some(Status::AllocationFailed);
    let result = device.associate_surface(surface_id, SD_FRAME, PresentFlags::empty());
    assert_eq!(result, Err(Error::DecoderFailed(Status::AllocationFailed)));
    assert_eq!(Status::from_result(&result), Status::AllocationFailed);
    assert_eq!(device.surface(surface_id).unwrap().decode_surface(), None);
    device.decoder_mut().put_failure = None;

    device.decoder_mut().queue_failure = Some(Status::OperationFailed);
    assert_eq!(device.associate_surface(surface_id, SD_FRAME, PresentFlags::BOTTOM_FIELD),
               Err(Error::DecoderFailed(Status::OperationFailed)));
    device.decoder_mut().queue_failure = None;

    device.associate_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    device.decoder_mut().sync_failure = Some(Status::OperationFailed);
    assert_eq!(device.begin_render_surface(surface_id),
               Err(Error::DecoderFailed(Status::OperationFailed)));
    assert!(!device.surface(surface_id).unwrap().is_bound());

    // The decode surface went away after the association was made.
    device.decoder_mut().sync_failure = None;
    device.decoder_mut().remove_surface(SD_FRAME);
    assert_eq!(device.sync_surface(surface_id), Err(Error::InvalidDecodeSurface));
    assert_eq!(device.backend().current(), caller);
}

#[test]
fn test_bind_and_release_failures_are_reported() {
    let (mut device, caller, surface_id) = create_device_and_surface();
    device.associate_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();

    device.backend().inject_failures(|failures| failures.bind_tex_image = true);
    let result = device.begin_render_surface(surface_id);
    assert_eq!(result, Err(Error::BindPixmapFailed(WindowingApiError::BadMatch)));
    assert_eq!(Status::from_result(&result), Status::OperationFailed);
    assert!(!device.surface(surface_id).unwrap().is_bound());
    device.backend().clear_failures();

    device.begin_render_surface(surface_id).unwrap();
    device.backend().inject_failures(|failures| failures.release_tex_image = true);
    assert_eq!(device.end_render_surface(surface_id),
               Err(Error::ReleasePixmapFailed(WindowingApiError::BadMatch)));
    assert!(device.surface(surface_id).unwrap().is_bound());
    device.backend().clear_failures();

    device.end_render_surface(surface_id).unwrap();
    assert_eq!(device.backend().current(), caller);
    assert_no_x_errors(device.backend());
}

#[test]
fn test_copy_surface() {
    let (mut device, caller, surface_id) = create_device_and_surface();
    let other_texture = device.backend().create_texture(gl::RGBA8, 16, 16, 0);
    {
        let backend = device.backend();
        backend.bind_texture(gl::TEXTURE_2D, other_texture);
        backend.color([0.25, 0.5, 0.75, 1.0]);
    }

    device.copy_surface(surface_id, HD_FRAME, PresentFlags::empty()).unwrap();

    // The caller's state is untouched.
    let backend = device.backend();
    assert_eq!(backend.current(), caller);
    assert_eq!(backend.bound_texture(gl::TEXTURE_2D), other_texture);
    assert!(!backend.is_target_enabled(gl::TEXTURE_2D));
    assert_eq!(backend.current_color(), [0.25, 0.5, 0.75, 1.0]);
    assert_eq!(backend.matrix_depths(), (1, 1));
    assert_eq!(backend.bound_framebuffer(), 0);

    let surface = device.surface(surface_id).unwrap();
    assert!(surface.has_framebuffer());
    assert!(!surface.is_bound());
    assert_eq!(surface.decode_surface(), None);

    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    let draw = &draws[0];
    assert_eq!(draw.context, surface.context().context);
    assert_ne!(draw.framebuffer, 0);
    assert_eq!(draw.texture, surface.pixmap_texture());
    assert_eq!(draw.color, [1.0; 4]);
    assert_eq!(draw.vertices, vec![(0, 0), (0, 128), (256, 128), (256, 0)]);
    assert_eq!(draw.tex_coords, vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]);
    drop(draws);

    assert_eq!(device.decoder().presents.len(), 1);
    assert_eq!(device.decoder().syncs, vec![HD_FRAME]);
    assert_eq!(backend.resource_counts().framebuffers, 1);
    assert_no_x_errors(backend);
}

#[test]
fn test_copy_restores_the_surface_context() {
    let (mut device, caller, surface_id) = create_device_and_surface();
    device.copy_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    device.copy_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    assert_eq!(device.backend().resource_counts().framebuffers, 1);
    assert_eq!(device.backend().draws().len(), 2);

    let context = *device.surface(surface_id).unwrap().context();
    let backend = device.backend();
    assert!(backend.make_current(context.display, context.drawable, context.context));
    assert_eq!(backend.bound_texture(gl::TEXTURE_2D), 0);
    assert!(!backend.is_target_enabled(gl::TEXTURE_2D));
    assert_eq!(backend.current_color(), [1.0; 4]);
    assert_eq!(backend.matrix_depths(), (1, 1));
    assert_eq!(backend.bound_framebuffer(), 0);
    assert_eq!(backend.current_viewport(), [0, 0, 256, 128]);
    assert!(backend.pending_gl_errors().is_empty());
    assert!(backend.make_current(caller.display, caller.drawable, caller.context));
}

#[test]
fn test_copy_with_incomplete_framebuffer() {
    let (mut device, caller, surface_id) = create_device_and_surface();
    let counts = device.backend().resource_counts();

    device.backend().inject_failures(|failures| failures.incomplete_framebuffer = true);
    let result = device.copy_surface(surface_id, SD_FRAME, PresentFlags::empty());
    assert_eq!(result,
               Err(Error::IncompleteFramebuffer(gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT_EXT)));
    assert_eq!(Status::from_result(&result), Status::AllocationFailed);
    assert!(!device.surface(surface_id).unwrap().has_framebuffer());
    assert_eq!(device.backend().resource_counts(), counts);
    assert!(device.decoder().presents.is_empty());
    assert_eq!(device.backend().current(), caller);

    // The next copy tries again.
    device.backend().clear_failures();
    device.copy_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    assert!(device.surface(surface_id).unwrap().has_framebuffer());
}

#[test]
fn test_pixmap_attributes_follow_depth() {
    for &depth in &[24, 32] {
        let (mut device, _) = create_device(MockBackend::with_root_depth(depth));
        let texture = device.backend().create_texture(gl::RGBA8, 256, 128, 0);
        let surface_id = device.create_surface(gl::TEXTURE_2D, texture).unwrap();

        let backend = device.backend();
        let requests = backend.fb_config_requests();
        assert_eq!(requests.len(), 1);
        let config = &requests[0];
        assert!(has_attribute(config, glx::DRAWABLE_TYPE, glx::PIXMAP_BIT as c_int));
        assert!(has_attribute(config, glx::Y_INVERTED_EXT, 1));
        assert!(has_attribute(config, glx::DEPTH_SIZE, depth as c_int));

        let glx_pixmap = device.surface(surface_id).unwrap().glx_pixmap();
        let pixmap_attributes = backend.glx_pixmap_attributes(glx_pixmap).unwrap();
        assert!(has_attribute(&pixmap_attributes,
                              glx::TEXTURE_TARGET_EXT,
                              glx::TEXTURE_2D_EXT as c_int));
        assert!(has_attribute(&pixmap_attributes, glx::MIPMAP_TEXTURE_EXT, 0));

        if depth == 24 {
            assert!(has_attribute(config, glx::BIND_TO_TEXTURE_RGB_EXT, 1));
            assert!(!has_attribute_name(config, glx::BIND_TO_TEXTURE_RGBA_EXT));
            assert!(!has_attribute_name(config, glx::ALPHA_SIZE));
            assert!(has_attribute(&pixmap_attributes,
                                  glx::TEXTURE_FORMAT_EXT,
                                  glx::TEXTURE_FORMAT_RGB_EXT as c_int));
        } else {
            assert!(has_attribute(config, glx::BIND_TO_TEXTURE_RGBA_EXT, 1));
            assert!(has_attribute(config, glx::ALPHA_SIZE, 8));
            assert!(!has_attribute_name(config, glx::BIND_TO_TEXTURE_RGB_EXT));
            assert!(has_attribute(&pixmap_attributes,
                                  glx::TEXTURE_FORMAT_EXT,
                                  glx::TEXTURE_FORMAT_RGBA_EXT as c_int));
        }
    }
}

#[test]
fn test_surface_lifecycle() {
    let (mut device, caller) = create_device(MockBackend::new());
    let texture = device.backend().create_texture(gl::RGBA, 256, 128, 0);
    let baseline = device.backend().resource_counts();

    let surface_id = device.create_surface(gl::TEXTURE_2D, texture).unwrap();
    assert_eq!(device.surface(surface_id).unwrap().size(), Size2D::new(256, 128));

    device.associate_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    assert_eq!(device.surface(surface_id).unwrap().decode_surface(), Some(SD_FRAME));

    device.begin_render_surface(surface_id).unwrap();
    assert!(device.surface(surface_id).unwrap().is_bound());
    device.end_render_surface(surface_id).unwrap();
    assert!(!device.surface(surface_id).unwrap().is_bound());

    let result = device.destroy_surface(surface_id);
    assert_eq!(Status::from_result(&result), Status::Success);
    assert_eq!(device.backend().resource_counts(), baseline);
    assert!(device.backend().texture_exists(texture));
    assert_eq!(device.backend().current(), caller);
    assert_no_x_errors(device.backend());

    assert_stale(&mut device, surface_id);
}

#[test]
fn test_operations_on_unknown_surfaces() {
    let (mut device, _) = create_device(MockBackend::new());
    assert_stale(&mut device, SurfaceID(0));
}

fn assert_stale(device: &mut MockDevice, surface_id: SurfaceID) {
    assert_eq!(device.surface(surface_id).err(), Some(Error::InvalidSurface));
    assert_eq!(device.associate_surface(surface_id, SD_FRAME, PresentFlags::empty()),
               Err(Error::InvalidSurface));
    assert_eq!(device.deassociate_surface(surface_id), Err(Error::InvalidSurface));
    assert_eq!(device.sync_surface(surface_id), Err(Error::InvalidSurface));
    assert_eq!(device.begin_render_surface(surface_id), Err(Error::InvalidSurface));
    assert_eq!(device.end_render_surface(surface_id), Err(Error::InvalidSurface));
    assert_eq!(device.copy_surface(surface_id, SD_FRAME, PresentFlags::empty()),
               Err(Error::InvalidSurface));
    let result = device.destroy_surface(surface_id);
    assert_eq!(result, Err(Error::InvalidSurface));
    assert_eq!(Status::from_result(&result), Status::InvalidSurface);
}

#[test]
fn test_stale_handles_stay_stale() {
    let (mut device, _, first) = create_device_and_surface();
    device.destroy_surface(first).unwrap();

    let texture = device.backend().create_texture(gl::RGBA8, 64, 64, 0);
    let second = device.create_surface(gl::TEXTURE_2D, texture).unwrap();
    assert_ne!(first, second);
    assert_eq!(device.surface(first).err(), Some(Error::InvalidSurface));
    assert_eq!(device.surface(second).unwrap().texture(), texture);
    assert_eq!(device.surface_count(), 1);
}

#[test]
fn test_destroying_busy_surfaces() {
    let (mut device, caller, surface_id) = create_device_and_surface();
    let glx_pixmap = device.surface(surface_id).unwrap().glx_pixmap();
    device.copy_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    device.associate_surface(surface_id, SD_FRAME, PresentFlags::empty()).unwrap();
    device.begin_render_surface(surface_id).unwrap();
    assert!(device.backend().is_glx_pixmap_bound(glx_pixmap));

    // A failed release doesn't stop the rest of the teardown.
    device.backend().inject_failures(|failures| failures.release_tex_image = true);
    device.destroy_surface(surface_id).unwrap();
    device.backend().clear_failures();

    assert_eq!(device.backend().resource_counts(), ResourceCounts {
        contexts: 1,
        pixmaps: 0,
        glx_pixmaps: 0,
        textures: 1,
        framebuffers: 0,
    });
    assert_eq!(device.surface_count(), 0);
    assert_eq!(device.backend().current(), caller);
    assert_no_x_errors(device.backend());
}

#[test]
fn test_independent_surfaces() {
    let (mut device, _, first) = create_device_and_surface();
    let texture: GLuint = device.backend().create_texture(gl::RGBA8, 640, 360, 0);
    let second = device.create_surface(gl::TEXTURE_2D, texture).unwrap();

    device.associate_surface(first, SD_FRAME, PresentFlags::empty()).unwrap();
    device.associate_surface(second, HD_FRAME, PresentFlags::empty()).unwrap();
    device.begin_render_surface(second).unwrap();
    assert!(!device.surface(first).unwrap().is_bound());
    assert!(device.surface(second).unwrap().is_bound());
    assert_eq!(device.surface(first).unwrap().decode_surface(), Some(SD_FRAME));

    device.destroy_surface(first).unwrap();
    assert!(device.surface(second).unwrap().is_bound());
    device.end_render_surface(second).unwrap();
}

#[test]
fn test_error_statuses() {
    assert_eq!(Error::ContextCreationFailed(WindowingApiError::Failed).status(),
               Status::AllocationFailed);
    assert_eq!(Error::MakeCurrentFailed(WindowingApiError::BadContext).status(),
               Status::OperationFailed);
    assert_eq!(wrapped(Error::GLError(gl::INVALID_OPERATION)).status(), Status::AllocationFailed);
    assert_eq!(Error::DecoderFailed(Status::InvalidParameter).status(), Status::InvalidParameter);
    assert_eq!(Status::from_result(&Ok::<(), Error>(())), Status::Success);
    assert_eq!(crate::error::gl_error_string(gl::STACK_UNDERFLOW), "stack underflow");
    assert_eq!(crate::error::gl_error_string(0xdead), "unknown");
}

#[cfg(x11)]
mod x11 {
    use crate::error::trap_x_errors;
    use crate::native::WindowingApi;
    use crate::Connection;
    use serial_test::serial;

    // Talks to the X server named by `DISPLAY`, if there is one.
    #[test]
    #[serial]
    fn test_connection() {
        let connection = match Connection::new() {
            Ok(connection) => connection,
            Err(_) => return,
        };
        assert!(!connection.native_display().is_null());

        let root_window = connection.root_window();
        let depth = connection.window_depth(root_window).unwrap();
        let pixmap = connection.create_pixmap(root_window, 16, 8, depth);
        assert_ne!(pixmap, 0);

        let geometry = trap_x_errors(&connection, || connection.get_geometry(pixmap));
        let geometry = geometry.unwrap().unwrap();
        assert_eq!((geometry.width, geometry.height, geometry.depth), (16, 8, depth));
        connection.free_pixmap(pixmap);

        // Freeing it twice is a protocol error, which must be caught rather than abort us.
        let result = trap_x_errors(&connection, || connection.free_pixmap(pixmap));
        assert!(result.is_err());
    }
}
