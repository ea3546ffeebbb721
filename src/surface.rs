pub mod scene;
pub mod terminal;

use crate::types::{Bounds, LatLng};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u64);

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct PolylineId(pub u64);

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub u64);

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MarkerStyle {
    Vehicle,
    Stop,
    AlternateStop,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PolylineStyle {
    Route,
    TravelledPath,
    Deviation,
}

impl PolylineStyle {
    /// RGB stroke colour.
    #[must_use]
    pub fn color(self) -> [u8; 3] {
        match self {
            PolylineStyle::Route | PolylineStyle::TravelledPath => [0x4A, 0x90, 0xE2],
            PolylineStyle::Deviation => [0xFF, 0x4B, 0x4B],
        }
    }

    #[must_use]
    pub fn width(self) -> f32 {
        match self {
            PolylineStyle::TravelledPath => 2.0,
            PolylineStyle::Route | PolylineStyle::Deviation => 3.0,
        }
    }

    /// Dash and gap lengths for dashed strokes.
    #[must_use]
    pub fn dash_pattern(self) -> Option<(f32, f32)> {
        match self {
            PolylineStyle::Deviation => Some((10.0, 5.0)),
            PolylineStyle::Route | PolylineStyle::TravelledPath => None,
        }
    }
}

/// Where an info overlay opens.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OverlayAnchor {
    /// Above a marker, when the marker is clicked.
    Marker(MarkerId),
    /// At the clicked point of a polyline.
    PolylineClick(PolylineId),
}

/// Map rendering backend a tracker session draws on.
///
/// Handles returned by `add_*` stay valid until the matching `remove_*`.
/// Calls with a stale handle are ignored.
pub trait RenderSurface: Send {
    fn reset_view(&mut self, center: LatLng, zoom: u8);

    fn set_center(&mut self, center: LatLng);

    fn fit_bounds(&mut self, bounds: Bounds);

    fn add_marker(
        &mut self,
        position: Option<LatLng>,
        style: MarkerStyle,
        title: Option<&str>,
    ) -> MarkerId;

    fn move_marker(&mut self, marker: MarkerId, position: LatLng);

    fn set_marker_style(&mut self, marker: MarkerId, style: MarkerStyle);

    fn remove_marker(&mut self, marker: MarkerId);

    fn add_polyline(&mut self, path: &[LatLng], style: PolylineStyle) -> PolylineId;

    fn set_polyline_path(&mut self, polyline: PolylineId, path: &[LatLng]);

    fn remove_polyline(&mut self, polyline: PolylineId);

    fn add_overlay(&mut self, content: &str, anchor: OverlayAnchor) -> OverlayId;

    fn set_overlay_content(&mut self, overlay: OverlayId, content: &str);

    fn remove_overlay(&mut self, overlay: OverlayId);
}
