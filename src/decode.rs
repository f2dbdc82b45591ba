// vaglx/src/decode.rs
//
//! The interface to the video decoder whose surfaces are presented through GL.

use crate::native::Pixmap;
use crate::Status;

use bitflags::bitflags;
use euclid::default::{Rect, Size2D};

/// Identifies a decode surface owned by the video decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DecodeSurfaceID(pub u32);

bitflags! {
    /// Flags passed along when a decode surface is presented into a pixmap.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PresentFlags: u32 {
        const TOP_FIELD      = 0x01;
        const BOTTOM_FIELD   = 0x02;
        const CLEAR_DRAWABLE = 0x08;
    }
}

impl PresentFlags {
    /// True if exactly one of the two fields was requested.
    #[inline]
    pub fn is_single_field(self) -> bool {
        let fields = self & (PresentFlags::TOP_FIELD | PresentFlags::BOTTOM_FIELD);
        fields == PresentFlags::TOP_FIELD || fields == PresentFlags::BOTTOM_FIELD
    }
}

/// What the decoder knows about one of its surfaces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodeSurface {
    pub id: DecodeSurfaceID,
    pub size: Size2D<u32>,
}

/// A pending presentation of a decode surface into a drawable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputSurface {
    pub drawable: Pixmap,
    /// The fields still waiting to be rendered.
    pub fields: PresentFlags,
}

/// The video decoder side of the interop.
///
/// Implementations own the decode surfaces; this crate only refers to them by ID.
pub trait DecodeBackend {
    fn lookup_surface(&self, surface: DecodeSurfaceID) -> Option<DecodeSurface>;

    /// Renders `surface` into `pixmap`, mapping `source` in the decode surface onto
    /// `destination` in the pixmap.
    fn put_surface(&mut self,
                   surface: DecodeSurfaceID,
                   pixmap: Pixmap,
                   pixmap_size: &Size2D<u32>,
                   source: &Rect<u32>,
                   destination: &Rect<u32>,
                   flags: PresentFlags)
                   -> Result<(), Status>;

    /// Finds the output that presents `surface` into `drawable`.
    fn lookup_output(&self, surface: DecodeSurfaceID, drawable: Pixmap) -> Option<OutputSurface>;
    /// Renders the output now instead of waiting for its presentation time.
    fn queue_surface(&mut self, surface: DecodeSurfaceID, output: &OutputSurface)
                     -> Result<(), Status>;

    /// Blocks until decoding into `surface` has finished.
    fn sync_surface(&mut self, surface: DecodeSurfaceID) -> Result<(), Status>;
}
