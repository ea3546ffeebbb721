mod constants;

use crate::surface::scene::{Scene, SceneViewer};
use crate::surface::{MarkerId, MarkerStyle, PolylineId, PolylineStyle};
use crate::types::LatLng;
use constants::{
    ALTERNATE_STOP_COLOR, BUS_REFERENCE_SHAPE, CLICK_RADIUS, OVERLAY_FONT_SIZE, OVERLAY_PADDING,
    STOP_COLOR, STOP_RADIUS, VEHICLE_COLOR,
};
use eframe::egui;

/// Map window drawing a tracker scene over OpenStreetMap tiles.
pub struct TrackerApp {
    scene_viewer: SceneViewer,
    tiles: walkers::HttpTiles,
    map_memory: walkers::MapMemory,
    zoom_applied: bool,
}

impl TrackerApp {
    #[must_use]
    pub fn new(egui_ctx: egui::Context, scene_viewer: SceneViewer) -> Self {
        Self {
            tiles: walkers::HttpTiles::new(walkers::sources::OpenStreetMap, egui_ctx),
            map_memory: walkers::MapMemory::default(),
            scene_viewer,
            zoom_applied: false,
        }
    }
}

impl eframe::App for TrackerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let viewport = self.scene_viewer.read().viewport();
        if !self.zoom_applied {
            if let Err(err) = self.map_memory.set_zoom(f64::from(viewport.zoom)) {
                log::warn!("Cannot apply zoom {}: {err:?}", viewport.zoom);
            }
            self.zoom_applied = true;
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let center = walkers::lat_lon(viewport.center.lat, viewport.center.lng);
                let map = walkers::Map::new(Some(&mut self.tiles), &mut self.map_memory, center)
                    .zoom_with_ctrl(false)
                    .drag_pan_buttons(
                        egui::DragPanButtons::PRIMARY | egui::DragPanButtons::SECONDARY,
                    )
                    .with_plugin(ScenePlugin::new(self.scene_viewer.clone()));

                map.show(ui, |_ui, _response, _projector, _map_memory| {})
            });

        // scene changes arrive from the tracker thread
        ctx.request_repaint_after(std::time::Duration::from_millis(250));
    }
}

pub struct ScenePlugin {
    viewer: SceneViewer,
}

impl ScenePlugin {
    #[must_use]
    pub fn new(viewer: SceneViewer) -> Self {
        ScenePlugin { viewer }
    }
}

impl walkers::Plugin for ScenePlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &walkers::Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        let to_screen =
            |point: LatLng| projector.project(walkers::lat_lon(point.lat, point.lng)).to_pos2();

        if response.clicked() {
            if let Some(click) = response.interact_pointer_pos() {
                handle_click(&self.viewer, click, &to_screen, projector);
            }
        }

        let scene = self.viewer.read();
        draw_polylines(ui, &scene, &to_screen);
        draw_markers(ui, &scene, &to_screen);
        draw_overlays(ui, &scene, &to_screen);
    }
}

fn handle_click(
    viewer: &SceneViewer,
    click: egui::Pos2,
    to_screen: &impl Fn(LatLng) -> egui::Pos2,
    projector: &walkers::Projector,
) {
    let (marker, polyline) = {
        let scene = viewer.read();
        (
            nearest_marker(&scene, click, to_screen),
            nearest_polyline(&scene, click, to_screen),
        )
    };
    if let Some(marker) = marker {
        viewer.click_marker(marker);
    } else if let Some(polyline) = polyline {
        let position = projector.unproject(click.to_vec2());
        viewer.click_polyline(polyline, LatLng::new(position.y(), position.x()));
    }
}

fn nearest_marker(
    scene: &Scene,
    click: egui::Pos2,
    to_screen: &impl Fn(LatLng) -> egui::Pos2,
) -> Option<MarkerId> {
    scene
        .markers()
        .iter()
        .filter_map(|(id, marker)| {
            let distance = to_screen(marker.position?).distance(click);
            (distance <= CLICK_RADIUS).then_some((*id, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

fn nearest_polyline(
    scene: &Scene,
    click: egui::Pos2,
    to_screen: &impl Fn(LatLng) -> egui::Pos2,
) -> Option<PolylineId> {
    scene
        .polylines()
        .iter()
        .filter_map(|(id, polyline)| {
            let points: Vec<egui::Pos2> = polyline.path.iter().map(|p| to_screen(*p)).collect();
            let distance = match points.as_slice() {
                [] => return None,
                [only] => only.distance(click),
                _ => points
                    .windows(2)
                    .map(|segment| distance_to_segment(click, segment[0], segment[1]))
                    .fold(f32::INFINITY, f32::min),
            };
            (distance <= CLICK_RADIUS).then_some((*id, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

fn distance_to_segment(point: egui::Pos2, start: egui::Pos2, end: egui::Pos2) -> f32 {
    let segment = end - start;
    let length_sq = segment.length_sq();
    if length_sq == 0.0 {
        return point.distance(start);
    }
    let t = ((point - start).dot(segment) / length_sq).clamp(0.0, 1.0);
    point.distance(start + segment * t)
}

fn draw_polylines(ui: &egui::Ui, scene: &Scene, to_screen: &impl Fn(LatLng) -> egui::Pos2) {
    // route first so the travelled path and deviation draw on top
    for style in [
        PolylineStyle::Route,
        PolylineStyle::TravelledPath,
        PolylineStyle::Deviation,
    ] {
        for polyline in scene.polylines_with_style(style) {
            if polyline.path.len() < 2 {
                continue;
            }
            let points: Vec<egui::Pos2> = polyline.path.iter().map(|p| to_screen(*p)).collect();
            let [r, g, b] = style.color();
            let stroke = egui::Stroke::new(style.width(), egui::Color32::from_rgb(r, g, b));
            match style.dash_pattern() {
                Some((dash, gap)) => {
                    ui.painter()
                        .extend(egui::Shape::dashed_line(&points, stroke, dash, gap));
                }
                None => {
                    ui.painter().add(egui::Shape::line(points, stroke));
                }
            }
        }
    }
}

fn draw_markers(ui: &egui::Ui, scene: &Scene, to_screen: &impl Fn(LatLng) -> egui::Pos2) {
    let visible = ui.max_rect();
    for marker in scene.markers().values() {
        let Some(position) = marker.position else {
            continue;
        };
        let point = to_screen(position);
        if !visible.contains(point) {
            continue;
        }
        match marker.style {
            MarkerStyle::Vehicle => {
                let shape: Vec<egui::Pos2> = BUS_REFERENCE_SHAPE
                    .iter()
                    .map(|offset| point + offset.to_vec2())
                    .collect();
                ui.painter().add(egui::Shape::convex_polygon(
                    shape,
                    VEHICLE_COLOR,
                    egui::Stroke::new(1.0, egui::Color32::WHITE),
                ));
            }
            MarkerStyle::Stop | MarkerStyle::AlternateStop => {
                let fill = if marker.style == MarkerStyle::Stop {
                    STOP_COLOR
                } else {
                    ALTERNATE_STOP_COLOR
                };
                ui.painter().circle(
                    point,
                    STOP_RADIUS,
                    fill,
                    egui::Stroke::new(1.0, egui::Color32::WHITE),
                );
            }
        }
    }
}

fn draw_overlays(ui: &egui::Ui, scene: &Scene, to_screen: &impl Fn(LatLng) -> egui::Pos2) {
    for overlay in scene.overlays().values() {
        let Some(open_at) = overlay.open_at else {
            continue;
        };
        let anchor = to_screen(open_at) - egui::vec2(0.0, STOP_RADIUS + OVERLAY_PADDING);
        let galley = ui.painter().layout_no_wrap(
            overlay.content.clone(),
            egui::FontId::proportional(OVERLAY_FONT_SIZE),
            egui::Color32::BLACK,
        );
        let rect = egui::Align2::CENTER_BOTTOM.anchor_size(anchor, galley.size());
        ui.painter()
            .rect_filled(rect.expand(OVERLAY_PADDING), 4.0, egui::Color32::WHITE);
        ui.painter().galley(rect.min, galley, egui::Color32::BLACK);
    }
}

/// Opens the map window and blocks until it is closed.
pub fn run(scene_viewer: SceneViewer) -> Result<(), eframe::Error> {
    eframe::run_native(
        "bus-tracker",
        eframe::NativeOptions::default(),
        Box::new(|creation_context| {
            Ok(Box::new(TrackerApp::new(
                creation_context.egui_ctx.clone(),
                scene_viewer,
            )))
        }),
    )
}
