use crate::types::VehicleId;

pub const SERVICE_ALERT: &str = "service_alert";
pub const ROUTE_DEVIATION: &str = "route_deviation";
pub const SEAT_STATUS_UPDATE: &str = "seat_status_update";
pub const BOOKING_CONFIRMATION: &str = "booking_confirmation";
pub const GPS_UPDATE: &str = "gps_update";
pub const SMS_STATUS_UPDATE: &str = "sms_status_update";

pub const STATUS_EVENTS: [&str; 4] = [
    SEAT_STATUS_UPDATE,
    BOOKING_CONFIRMATION,
    GPS_UPDATE,
    SMS_STATUS_UPDATE,
];

const VEHICLE_LOCATION_PREFIX: &str = "bus_location_";
const VEHICLE_DEVIATION_PREFIX: &str = "bus_deviation_";

#[must_use]
pub fn vehicle_location_channel(vehicle_id: &VehicleId) -> String {
    format!("{VEHICLE_LOCATION_PREFIX}{vehicle_id}")
}

#[must_use]
pub fn vehicle_deviation_channel(vehicle_id: &VehicleId) -> String {
    format!("{VEHICLE_DEVIATION_PREFIX}{vehicle_id}")
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VehicleChannelKind {
    Location,
    Deviation,
}

static VEHICLE_CHANNEL_REGEX: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| {
        regex::Regex::new(r"^bus_(?P<kind>location|deviation)_(?P<vehicle>\S+)$")
            .expect("vehicle channel pattern is valid")
    });

/// Splits a per-vehicle channel name into its kind and vehicle id.
#[must_use]
pub fn parse_vehicle_channel(event: &str) -> Option<(VehicleChannelKind, VehicleId)> {
    let captures = VEHICLE_CHANNEL_REGEX.captures(event)?;
    let kind = match captures.name("kind")?.as_str() {
        "location" => VehicleChannelKind::Location,
        _ => VehicleChannelKind::Deviation,
    };
    let vehicle_id = VehicleId::new(captures.name("vehicle")?.as_str()).ok()?;
    Some((kind, vehicle_id))
}
