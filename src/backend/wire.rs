//! Payloads exchanged with the backend and carried on realtime channels.

use crate::types::{LatLng, deserialize_coordinate, deserialize_identifier};

pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct RouteDataResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub route: Option<RouteRecord>,
    #[serde(default, deserialize_with = "deserialize_entries")]
    pub stops: Vec<StopRecord>,
    #[serde(default)]
    pub active_deviation: Option<DeviationRecord>,
}

impl RouteDataResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct RouteRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub route_number: Option<String>,
    pub coordinates: Vec<LatLng>,
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct StopRecord {
    #[serde(deserialize_with = "deserialize_identifier")]
    pub name: String,
    #[serde(default)]
    pub stop_name: Option<String>,
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub latitude: f64,
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub sequence: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_entries")]
    pub facilities: Vec<FacilityRecord>,
    #[serde(default)]
    pub eta: Option<String>,
}

impl StopRecord {
    /// Display name, or the document name when none is set.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.stop_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct FacilityRecord {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub facility_type: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub status: String,
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct DeviationRecord {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub reason: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub description: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub delay_minutes: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_entries")]
    pub stops: Vec<DeviationStopRecord>,
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct DeviationStopRecord {
    #[serde(deserialize_with = "deserialize_identifier")]
    pub name: String,
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub latitude: f64,
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub longitude: f64,
}

/// Text fields of child table rows may be null when left empty.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(<Option<String> as serde::Deserialize>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes a list entry by entry, skipping entries that do not decode.
fn deserialize_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let entries =
        <Option<Vec<serde_json::Value>> as serde::Deserialize>::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                let kind = std::any::type_name::<T>().rsplit("::").next().unwrap_or("entry");
                log::warn!("Skipping malformed {kind}: {e}");
                None
            }
        })
        .collect())
}

/// Payload of `bus_location_<vehicle>`.
#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct LocationUpdate {
    pub location: LocationRecord,
    #[serde(default)]
    pub upcoming_stops: Vec<UpcomingStop>,
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct LocationRecord {
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub lat: f64,
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub lng: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl LocationRecord {
    #[must_use]
    pub fn coordinates(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct UpcomingStop {
    pub stop: String,
    #[serde(default)]
    pub eta: Option<String>,
}

/// Payload of `bus_deviation_<vehicle>`. A missing or null deviation means
/// the previous one has ended.
#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct DeviationUpdate {
    #[serde(default)]
    pub active_deviation: Option<DeviationRecord>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricEvent {
    Sent,
    Delivered,
    Opened,
    ActionClick,
}

impl std::fmt::Display for MetricEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MetricEvent::Sent => "sent",
            MetricEvent::Delivered => "delivered",
            MetricEvent::Opened => "opened",
            MetricEvent::ActionClick => "action_click",
        };
        write!(f, "{name}")
    }
}

pub const APP_NOTIFICATION_CHANNEL: &str = "App Notification";

#[derive(Debug, PartialEq, Eq, Clone, serde::Serialize)]
pub struct NotificationMetric {
    pub notification_type: String,
    pub event_type: MetricEvent,
    pub channel: String,
}

impl NotificationMetric {
    #[must_use]
    pub fn app(notification_type: &str, event_type: MetricEvent) -> Self {
        NotificationMetric {
            notification_type: notification_type.to_string(),
            event_type,
            channel: APP_NOTIFICATION_CHANNEL.to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, serde::Serialize)]
pub struct DeviceRegistration {
    pub device_id: String,
    pub token: String,
    pub platform: String,
    pub app_version: String,
}

/// Outcome of a business action such as ticket generation. Any other fields
/// of the reply (`ticket_data`, `payment_id`) are kept in `details`.
#[derive(Debug, PartialEq, Eq, Clone, serde::Deserialize)]
pub struct ActionStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl ActionStatus {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerNotification {
    BookingConfirmation,
    TripReminder,
}

#[derive(Debug, PartialEq, Clone, serde::Serialize)]
pub struct PaymentDetails {
    pub payment_type: String,
    pub amount: f64,
}

#[cfg(test)]
mod tests {
    use super::{
        ActionStatus, DeviationUpdate, LocationUpdate, MetricEvent, NotificationMetric, RouteDataResponse,
    };

    #[test]
    fn when_route_data_has_deviation_then_all_sections_are_decoded() {
        let json = r#"{
            "status": "success",
            "route": {"name": "R-1", "route_number": "138", "coordinates": [
                {"lat": "6.9271", "lng": "79.8612"}, {"lat": 6.93, "lng": 79.87}
            ]},
            "stops": [{
                "name": "S1", "stop_name": "Fort", "latitude": "6.9271", "longitude": "79.8612",
                "address": "Olcott Mawatha", "sequence": 1,
                "facilities": [{"facility_type": "Shelter", "status": "Working"}]
            }],
            "active_deviation": {
                "reason": "Road works", "description": "Galle Road closed",
                "end_time": "2024-03-01 18:00:00", "delay_minutes": 15,
                "stops": [{"name": "S1", "latitude": 6.9271, "longitude": 79.8612}]
            }
        }"#;
        let response: RouteDataResponse = serde_json::from_str(json).expect("valid payload");
        assert!(response.is_success());
        assert_eq!(response.route.expect("route").coordinates.len(), 2);
        assert_eq!(response.stops[0].facilities[0].facility_type, "Shelter");
        assert_eq!(response.stops[0].eta, None);
        let deviation = response.active_deviation.expect("deviation");
        assert_eq!(deviation.delay_minutes, Some(15));
        assert_eq!(deviation.stops[0].name, "S1");
    }

    #[test]
    fn when_one_stop_is_malformed_then_the_other_stops_still_decode() {
        let json = r#"{
            "status": "success",
            "stops": [
                {"name": "S1", "stop_name": null, "latitude": 6.93, "longitude": 79.85,
                 "facilities": [{"facility_type": "Shelter", "status": null}, {"facility_type": null}]},
                {"name": "S2", "stop_name": "Kollupitiya", "latitude": null, "longitude": 79.84},
                {"name": "S3", "stop_name": "Bambalapitiya", "latitude": 6.89, "longitude": 79.85,
                 "facilities": null}
            ]
        }"#;
        let response: RouteDataResponse = serde_json::from_str(json).expect("valid payload");

        let names: Vec<&str> = response.stops.iter().map(|stop| stop.name.as_str()).collect();
        assert_eq!(names, vec!["S1", "S3"]);
        assert_eq!(response.stops[0].display_name(), "S1");
        assert_eq!(response.stops[0].facilities[0].status, "");
        assert_eq!(response.stops[0].facilities[1].facility_type, "");
        assert!(response.stops[1].facilities.is_empty());
    }

    #[test]
    fn when_route_data_is_an_error_then_only_status_and_message_are_needed() {
        let response: RouteDataResponse = serde_json::from_str(
            r#"{"status": "error", "message": "No active trip found for this bus"}"#,
        )
        .expect("valid payload");
        assert!(!response.is_success());
        assert!(response.stops.is_empty());
        assert!(response.route.is_none());
    }

    #[test]
    fn when_location_update_has_no_upcoming_stops_then_list_is_empty() {
        let update: LocationUpdate =
            serde_json::from_str(r#"{"location": {"lat": 6.9, "lng": 79.8, "timestamp": "2024-03-01 08:00:00"}}"#)
                .expect("valid payload");
        assert!(update.upcoming_stops.is_empty());
        assert_eq!(update.location.timestamp.as_deref(), Some("2024-03-01 08:00:00"));
    }

    #[test]
    fn when_deviation_update_is_null_then_it_means_cleared() {
        let update: DeviationUpdate =
            serde_json::from_str(r#"{"active_deviation": null}"#).expect("valid payload");
        assert!(update.active_deviation.is_none());
    }

    #[test]
    fn when_metric_is_serialized_then_event_type_is_snake_case() {
        let metric = NotificationMetric::app("route_deviation", MetricEvent::ActionClick);
        let json = serde_json::to_value(&metric).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({
                "notification_type": "route_deviation",
                "event_type": "action_click",
                "channel": "App Notification"
            })
        );
    }

    #[test]
    fn when_action_reply_has_extra_fields_then_they_are_kept_as_details() {
        let status: ActionStatus = serde_json::from_str(
            r#"{"status": "success", "payment_id": "PAY-0001"}"#,
        )
        .expect("valid payload");
        assert!(status.is_success());
        assert_eq!(status.message, None);
        assert_eq!(status.details["payment_id"], "PAY-0001");
    }
}
