// vaglx/build.rs
//
//! The `vaglx` build script.

use cfg_aliases::cfg_aliases;
use gl_generator::{Api, Fallbacks, Profile, Registry, StructGenerator};
use std::env;
use std::fs::File;
use std::path::PathBuf;

fn main() {
    // Setup aliases for #[cfg] checks
    cfg_aliases! {
        linux: { all(unix, not(any(target_os = "macos", target_os = "android", target_env = "ohos"))) },
        x11: { all(linux, feature = "sm-x11") },
    }

    let dest = PathBuf::from(&env::var("OUT_DIR").unwrap());

    // The copy path draws with the fixed-function pipeline, so we need the compatibility profile.
    let mut file = File::create(dest.join("gl_bindings.rs")).unwrap();
    let registry = Registry::new(
        Api::Gl,
        (2, 1),
        Profile::Compatibility,
        Fallbacks::All,
        ["GL_EXT_framebuffer_object", "GL_ARB_texture_rectangle"],
    );
    registry.write_bindings(StructGenerator, &mut file).unwrap();

    let mut file = File::create(dest.join("glx_bindings.rs")).unwrap();
    let registry = Registry::new(
        Api::Glx,
        (1, 4),
        Profile::Core,
        Fallbacks::All,
        ["GLX_EXT_texture_from_pixmap"],
    );
    registry.write_bindings(StructGenerator, &mut file).unwrap();
}
