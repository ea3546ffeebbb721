use eframe::egui;

/// Bus outline around its position, pointing up.
pub const BUS_REFERENCE_SHAPE: [egui::Pos2; 5] = [
    egui::pos2(0.0, -11.0),
    egui::pos2(6.0, -6.0),
    egui::pos2(6.0, 9.0),
    egui::pos2(-6.0, 9.0),
    egui::pos2(-6.0, -6.0),
];

pub const STOP_RADIUS: f32 = 5.0;
/// Screen distance within which a click selects a marker or polyline.
pub const CLICK_RADIUS: f32 = 8.0;
pub const OVERLAY_FONT_SIZE: f32 = 12.0;
pub const OVERLAY_PADDING: f32 = 4.0;

pub const VEHICLE_COLOR: egui::Color32 = egui::Color32::from_rgb(0x1F, 0x3A, 0x93);
pub const STOP_COLOR: egui::Color32 = egui::Color32::from_rgb(0x4A, 0x90, 0xE2);
pub const ALTERNATE_STOP_COLOR: egui::Color32 = egui::Color32::from_rgb(0xFF, 0x8C, 0x00);
