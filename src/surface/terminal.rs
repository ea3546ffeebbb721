use crate::surface::scene::{Scene, SceneViewer};
use crate::surface::{MarkerStyle, PolylineStyle};
use crate::thread_manager::SteppableTask;

/// Periodically logs a summary of the scene when it has changed.
pub struct TerminalRenderer {
    pub viewer: SceneViewer,
    last_revision: Option<u64>,
}

impl TerminalRenderer {
    #[must_use]
    pub fn new(viewer: SceneViewer) -> Self {
        Self {
            viewer,
            last_revision: None,
        }
    }
}

#[must_use]
pub fn summarize(scene: &Scene) -> String {
    let vehicle = scene
        .markers_with_style(MarkerStyle::Vehicle)
        .first()
        .and_then(|marker| marker.position)
        .map_or_else(|| String::from("unknown"), |position| position.to_string());
    let travelled = scene
        .polylines_with_style(PolylineStyle::TravelledPath)
        .first()
        .map_or(0, |polyline| polyline.path.len());
    let stops = scene.markers_with_style(MarkerStyle::Stop).len();
    let alternate_stops = scene.markers_with_style(MarkerStyle::AlternateStop).len();
    let deviation = if scene
        .polylines_with_style(PolylineStyle::Deviation)
        .is_empty()
    {
        "none"
    } else {
        "active"
    };
    format!(
        "vehicle at {vehicle}, path {travelled} points, {stops} stops ({alternate_stops} alternate), deviation {deviation}, center {}",
        scene.viewport().center
    )
}

impl SteppableTask for TerminalRenderer {
    fn step(&mut self) -> bool {
        let scene = self.viewer.read();
        if self.last_revision != Some(scene.revision()) {
            self.last_revision = Some(scene.revision());
            log::info!("{}", summarize(&scene));
        }
        true
    }
}
