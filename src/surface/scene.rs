use crate::surface::{
    MarkerId, MarkerStyle, OverlayAnchor, OverlayId, PolylineId, PolylineStyle, RenderSurface,
};
use crate::types::{Bounds, LatLng};

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
    pub fitted_bounds: Option<Bounds>,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            center: LatLng::new(0.0, 0.0),
            zoom: 1,
            fitted_bounds: None,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct SceneMarker {
    pub position: Option<LatLng>,
    pub style: MarkerStyle,
    pub title: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ScenePolyline {
    pub path: Vec<LatLng>,
    pub style: PolylineStyle,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SceneOverlay {
    pub content: String,
    pub anchor: OverlayAnchor,
    pub open_at: Option<LatLng>,
}

/// Everything currently drawn, in a form viewers can read.
#[derive(Debug, Default)]
pub struct Scene {
    viewport: Viewport,
    markers: std::collections::BTreeMap<MarkerId, SceneMarker>,
    polylines: std::collections::BTreeMap<PolylineId, ScenePolyline>,
    overlays: std::collections::BTreeMap<OverlayId, SceneOverlay>,
    next_handle: u64,
    revision: u64,
}

impl Scene {
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn markers(&self) -> &std::collections::BTreeMap<MarkerId, SceneMarker> {
        &self.markers
    }

    #[must_use]
    pub fn polylines(&self) -> &std::collections::BTreeMap<PolylineId, ScenePolyline> {
        &self.polylines
    }

    #[must_use]
    pub fn overlays(&self) -> &std::collections::BTreeMap<OverlayId, SceneOverlay> {
        &self.overlays
    }

    #[must_use]
    pub fn marker(&self, marker: MarkerId) -> Option<&SceneMarker> {
        self.markers.get(&marker)
    }

    #[must_use]
    pub fn polyline(&self, polyline: PolylineId) -> Option<&ScenePolyline> {
        self.polylines.get(&polyline)
    }

    #[must_use]
    pub fn overlay(&self, overlay: OverlayId) -> Option<&SceneOverlay> {
        self.overlays.get(&overlay)
    }

    /// Increments on every change, so viewers can skip redraws.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.polylines.is_empty() && self.overlays.is_empty()
    }

    #[must_use]
    pub fn polylines_with_style(&self, style: PolylineStyle) -> Vec<&ScenePolyline> {
        self.polylines
            .values()
            .filter(|polyline| polyline.style == style)
            .collect()
    }

    #[must_use]
    pub fn markers_with_style(&self, style: MarkerStyle) -> Vec<&SceneMarker> {
        self.markers
            .values()
            .filter(|marker| marker.style == style)
            .collect()
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Opens every overlay bound to `polyline` at the clicked point.
    fn click_polyline(&mut self, polyline: PolylineId, at: LatLng) -> Vec<OverlayId> {
        if !self.polylines.contains_key(&polyline) {
            return Vec::new();
        }
        let mut opened = Vec::new();
        for (id, overlay) in &mut self.overlays {
            if overlay.anchor == OverlayAnchor::PolylineClick(polyline) {
                overlay.open_at = Some(at);
                opened.push(*id);
            }
        }
        if !opened.is_empty() {
            self.touch();
        }
        opened
    }

    /// Opens every overlay bound to `marker` at the marker position.
    fn click_marker(&mut self, marker: MarkerId) -> Vec<OverlayId> {
        let Some(position) = self.markers.get(&marker).and_then(|marker| marker.position) else {
            return Vec::new();
        };
        let mut opened = Vec::new();
        for (id, overlay) in &mut self.overlays {
            if overlay.anchor == OverlayAnchor::Marker(marker) {
                overlay.open_at = Some(position);
                opened.push(*id);
            }
        }
        if !opened.is_empty() {
            self.touch();
        }
        opened
    }
}

fn write_scene(inner: &std::sync::RwLock<Scene>) -> std::sync::RwLockWriteGuard<'_, Scene> {
    match inner.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Surface that renders into a shared [`Scene`].
pub struct SceneSurface {
    inner: std::sync::Arc<std::sync::RwLock<Scene>>,
}

impl SceneSurface {
    #[must_use]
    pub fn new() -> Self {
        SceneSurface {
            inner: std::sync::Arc::new(std::sync::RwLock::new(Scene::default())),
        }
    }

    #[must_use]
    pub fn viewer(&self) -> SceneViewer {
        SceneViewer {
            inner: self.inner.clone(),
        }
    }
}

impl Default for SceneSurface {
    fn default() -> Self {
        SceneSurface::new()
    }
}

impl RenderSurface for SceneSurface {
    fn reset_view(&mut self, center: LatLng, zoom: u8) {
        let mut scene = write_scene(&self.inner);
        scene.viewport = Viewport {
            center,
            zoom,
            fitted_bounds: None,
        };
        scene.touch();
    }

    fn set_center(&mut self, center: LatLng) {
        let mut scene = write_scene(&self.inner);
        scene.viewport.center = center;
        scene.touch();
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        let mut scene = write_scene(&self.inner);
        scene.viewport.center = bounds.center();
        scene.viewport.fitted_bounds = Some(bounds);
        scene.touch();
    }

    fn add_marker(
        &mut self,
        position: Option<LatLng>,
        style: MarkerStyle,
        title: Option<&str>,
    ) -> MarkerId {
        let mut scene = write_scene(&self.inner);
        let id = MarkerId(scene.next_handle());
        scene.markers.insert(
            id,
            SceneMarker {
                position,
                style,
                title: title.map(str::to_string),
            },
        );
        scene.touch();
        id
    }

    fn move_marker(&mut self, marker: MarkerId, position: LatLng) {
        let mut scene = write_scene(&self.inner);
        if let Some(entry) = scene.markers.get_mut(&marker) {
            entry.position = Some(position);
            scene.touch();
        }
    }

    fn set_marker_style(&mut self, marker: MarkerId, style: MarkerStyle) {
        let mut scene = write_scene(&self.inner);
        if let Some(entry) = scene.markers.get_mut(&marker) {
            entry.style = style;
            scene.touch();
        }
    }

    fn remove_marker(&mut self, marker: MarkerId) {
        let mut scene = write_scene(&self.inner);
        if scene.markers.remove(&marker).is_some() {
            scene.touch();
        }
    }

    fn add_polyline(&mut self, path: &[LatLng], style: PolylineStyle) -> PolylineId {
        let mut scene = write_scene(&self.inner);
        let id = PolylineId(scene.next_handle());
        scene.polylines.insert(
            id,
            ScenePolyline {
                path: path.to_vec(),
                style,
            },
        );
        scene.touch();
        id
    }

    fn set_polyline_path(&mut self, polyline: PolylineId, path: &[LatLng]) {
        let mut scene = write_scene(&self.inner);
        if let Some(entry) = scene.polylines.get_mut(&polyline) {
            entry.path = path.to_vec();
            scene.touch();
        }
    }

    fn remove_polyline(&mut self, polyline: PolylineId) {
        let mut scene = write_scene(&self.inner);
        if scene.polylines.remove(&polyline).is_some() {
            scene.touch();
        }
    }

    fn add_overlay(&mut self, content: &str, anchor: OverlayAnchor) -> OverlayId {
        let mut scene = write_scene(&self.inner);
        let id = OverlayId(scene.next_handle());
        scene.overlays.insert(
            id,
            SceneOverlay {
                content: content.to_string(),
                anchor,
                open_at: None,
            },
        );
        scene.touch();
        id
    }

    fn set_overlay_content(&mut self, overlay: OverlayId, content: &str) {
        let mut scene = write_scene(&self.inner);
        if let Some(entry) = scene.overlays.get_mut(&overlay) {
            content.clone_into(&mut entry.content);
            scene.touch();
        }
    }

    fn remove_overlay(&mut self, overlay: OverlayId) {
        let mut scene = write_scene(&self.inner);
        if scene.overlays.remove(&overlay).is_some() {
            scene.touch();
        }
    }
}

/// Shared read access to a scene, plus the click interactions a map view
/// forwards.
#[derive(Clone)]
pub struct SceneViewer {
    inner: std::sync::Arc<std::sync::RwLock<Scene>>,
}

impl SceneViewer {
    pub fn read(&self) -> std::sync::RwLockReadGuard<'_, Scene> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn click_polyline(&self, polyline: PolylineId, at: LatLng) -> Vec<OverlayId> {
        write_scene(&self.inner).click_polyline(polyline, at)
    }

    pub fn click_marker(&self, marker: MarkerId) -> Vec<OverlayId> {
        write_scene(&self.inner).click_marker(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::SceneSurface;
    use crate::surface::{MarkerStyle, OverlayAnchor, PolylineStyle, RenderSurface};
    use crate::types::{Bounds, LatLng};

    #[test]
    fn when_bounds_are_fitted_then_viewport_centers_on_them() {
        let mut surface = SceneSurface::new();
        let viewer = surface.viewer();
        surface.reset_view(LatLng::new(6.9271, 79.8612), 12);
        let bounds = Bounds::enclosing(&[LatLng::new(6.0, 79.0), LatLng::new(8.0, 81.0)])
            .expect("non-empty");

        surface.fit_bounds(bounds);

        let viewport = viewer.read().viewport();
        assert_eq!(viewport.center, LatLng::new(7.0, 80.0));
        assert_eq!(viewport.zoom, 12);
        assert_eq!(viewport.fitted_bounds, Some(bounds));
    }

    #[test]
    fn when_polyline_is_clicked_then_bound_overlay_opens_at_click_point() {
        let mut surface = SceneSurface::new();
        let viewer = surface.viewer();
        let polyline = surface.add_polyline(
            &[LatLng::new(6.90, 79.85), LatLng::new(6.95, 79.86)],
            PolylineStyle::Deviation,
        );
        let overlay = surface.add_overlay("Route Deviation", OverlayAnchor::PolylineClick(polyline));
        let click = LatLng::new(6.92, 79.855);

        let opened = viewer.click_polyline(polyline, click);

        assert_eq!(opened, vec![overlay]);
        assert_eq!(viewer.read().overlay(overlay).unwrap().open_at, Some(click));
    }

    #[test]
    fn when_marker_is_clicked_then_bound_overlay_opens_at_marker() {
        let mut surface = SceneSurface::new();
        let viewer = surface.viewer();
        let position = LatLng::new(6.93, 79.85);
        let marker = surface.add_marker(Some(position), MarkerStyle::Stop, Some("Fort"));
        let overlay = surface.add_overlay("Fort", OverlayAnchor::Marker(marker));

        assert_eq!(viewer.click_marker(marker), vec![overlay]);
        assert_eq!(viewer.read().overlay(overlay).unwrap().open_at, Some(position));
    }

    #[test]
    fn when_handles_are_removed_then_stale_calls_are_ignored() {
        let mut surface = SceneSurface::new();
        let viewer = surface.viewer();
        let marker = surface.add_marker(None, MarkerStyle::Vehicle, None);
        surface.remove_marker(marker);
        let revision = viewer.read().revision();

        surface.move_marker(marker, LatLng::new(1.0, 1.0));
        surface.set_marker_style(marker, MarkerStyle::Stop);

        assert!(viewer.read().is_empty());
        assert_eq!(viewer.read().revision(), revision);
    }
}
