use crate::realtime::channels::{
    BOOKING_CONFIRMATION, GPS_UPDATE, SEAT_STATUS_UPDATE, SMS_STATUS_UPDATE,
};
use crate::realtime::{RealtimeHandler, RealtimeMessage};
use crate::types::{LatLng, deserialize_coordinate, deserialize_identifier};

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct SeatStatusUpdate {
    #[serde(deserialize_with = "deserialize_identifier")]
    pub trip: String,
    #[serde(deserialize_with = "deserialize_identifier")]
    pub seat_id: String,
    pub status: String,
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct BookingConfirmation {
    #[serde(deserialize_with = "deserialize_identifier")]
    pub booking_id: String,
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct GpsUpdate {
    #[serde(deserialize_with = "deserialize_identifier")]
    pub bus: String,
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub latitude: f64,
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub longitude: f64,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct SmsStatusUpdate {
    #[serde(deserialize_with = "deserialize_identifier")]
    pub sms_id: String,
}

/// Operational events on the generic realtime channels.
#[derive(Debug, PartialEq, Clone)]
pub enum StatusEvent {
    SeatStatus(SeatStatusUpdate),
    BookingConfirmation(BookingConfirmation),
    Gps(GpsUpdate),
    SmsStatus(SmsStatusUpdate),
}

impl StatusEvent {
    /// Returns `Ok(None)` for events that are not status events.
    pub fn parse(
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        let payload = payload.clone();
        let parsed = match event {
            SEAT_STATUS_UPDATE => StatusEvent::SeatStatus(serde_json::from_value(payload)?),
            BOOKING_CONFIRMATION => {
                StatusEvent::BookingConfirmation(serde_json::from_value(payload)?)
            }
            GPS_UPDATE => StatusEvent::Gps(serde_json::from_value(payload)?),
            SMS_STATUS_UPDATE => StatusEvent::SmsStatus(serde_json::from_value(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }
}

/// What the host application is currently showing.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub enum HostView {
    #[default]
    Nothing,
    Trip(String),
    Bus(String),
    SmsLog(String),
    BookingList,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct HostViewParseError(String);

impl std::fmt::Display for HostViewParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Unknown view '{}', expected none, bookings, trip:<name>, bus:<name> or sms:<name>",
            self.0
        )
    }
}

impl std::error::Error for HostViewParseError {}

impl std::str::FromStr for HostView {
    type Err = HostViewParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "none" | "" => return Ok(HostView::Nothing),
            "bookings" => return Ok(HostView::BookingList),
            _ => {}
        }
        match s.split_once(':') {
            Some(("trip", name)) if !name.is_empty() => Ok(HostView::Trip(name.to_string())),
            Some(("bus", name)) if !name.is_empty() => Ok(HostView::Bus(name.to_string())),
            Some(("sms", name)) if !name.is_empty() => Ok(HostView::SmsLog(name.to_string())),
            _ => Err(HostViewParseError(s.to_string())),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Indicator {
    Green,
    Blue,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Alert {
    pub message: String,
    pub indicator: Indicator,
}

#[derive(Debug, PartialEq, Clone)]
pub enum HostAction {
    ReloadRecord,
    RefreshList,
    ShowAlert(Alert),
    UpdateMapLocation(LatLng),
}

/// Host reactions to `event` given what is on screen, in the order they
/// should be applied.
#[must_use]
pub fn actions_for(event: &StatusEvent, view: &HostView) -> Vec<HostAction> {
    match (event, view) {
        (StatusEvent::SeatStatus(update), HostView::Trip(trip)) if *trip == update.trip => vec![
            HostAction::ReloadRecord,
            HostAction::ShowAlert(Alert {
                message: format!(
                    "Seat {} status updated to {}",
                    update.seat_id, update.status
                ),
                indicator: Indicator::Green,
            }),
        ],
        (StatusEvent::BookingConfirmation(confirmation), view) => {
            let mut actions = vec![HostAction::ShowAlert(Alert {
                message: format!("New booking confirmed: {}", confirmation.booking_id),
                indicator: Indicator::Green,
            })];
            if *view == HostView::BookingList {
                actions.push(HostAction::RefreshList);
            }
            actions
        }
        (StatusEvent::Gps(update), HostView::Bus(bus)) if *bus == update.bus => vec![
            HostAction::ShowAlert(Alert {
                message: format!("Bus location updated at {}", update.timestamp),
                indicator: Indicator::Blue,
            }),
            HostAction::UpdateMapLocation(LatLng::new(update.latitude, update.longitude)),
        ],
        (StatusEvent::SmsStatus(update), HostView::SmsLog(sms)) if *sms == update.sms_id => {
            vec![HostAction::ReloadRecord]
        }
        _ => Vec::new(),
    }
}

/// The host application as seen by status event handling.
pub trait HostContext: Send + 'static {
    fn current_view(&self) -> HostView;

    fn apply(&mut self, action: &HostAction);
}

/// Host that only logs what it would do.
#[derive(Debug, Default)]
pub struct LoggingHost {
    view: HostView,
}

impl LoggingHost {
    #[must_use]
    pub fn new(view: HostView) -> Self {
        LoggingHost { view }
    }
}

impl HostContext for LoggingHost {
    fn current_view(&self) -> HostView {
        self.view.clone()
    }

    fn apply(&mut self, action: &HostAction) {
        match action {
            HostAction::ShowAlert(alert) => {
                log::info!("[{:?}] {}", alert.indicator, alert.message);
            }
            HostAction::ReloadRecord => log::info!("Reloading {:?}", self.view),
            HostAction::RefreshList => log::info!("Refreshing booking list"),
            HostAction::UpdateMapLocation(location) => {
                log::info!("Moving map of {:?} to {location}", self.view);
            }
        }
    }
}

pub struct StatusEventHandler<C: HostContext> {
    host: C,
}

impl<C: HostContext> StatusEventHandler<C> {
    #[must_use]
    pub fn new(host: C) -> Self {
        StatusEventHandler { host }
    }

    #[must_use]
    pub fn host(&self) -> &C {
        &self.host
    }
}

impl<C: HostContext> RealtimeHandler for StatusEventHandler<C> {
    fn handle(&mut self, message: &RealtimeMessage) {
        let event = match StatusEvent::parse(&message.event, &message.payload) {
            Ok(Some(event)) => event,
            Ok(None) => {
                log::debug!("Status handler ignoring {}", message.event);
                return;
            }
            Err(err) => {
                log::warn!("Malformed {} payload: {err}", message.event);
                return;
            }
        };
        for action in actions_for(&event, &self.host.current_view()) {
            self.host.apply(&action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Alert, HostAction, HostContext, HostView, Indicator, StatusEvent, StatusEventHandler,
        actions_for,
    };
    use crate::realtime::{RealtimeHandler, RealtimeMessage};
    use crate::types::LatLng;

    struct RecordingHost {
        view: HostView,
        applied: Vec<HostAction>,
    }

    impl HostContext for RecordingHost {
        fn current_view(&self) -> HostView {
            self.view.clone()
        }

        fn apply(&mut self, action: &HostAction) {
            self.applied.push(action.clone());
        }
    }

    fn parse(event: &str, payload: serde_json::Value) -> StatusEvent {
        StatusEvent::parse(event, &payload).unwrap().unwrap()
    }

    #[test]
    fn when_seat_update_matches_viewed_trip_then_record_reloads_and_alert_shows() {
        let event = parse(
            "seat_status_update",
            serde_json::json!({"trip": "TRIP-0001", "seat_id": 12, "status": "Booked"}),
        );

        let actions = actions_for(&event, &HostView::Trip(String::from("TRIP-0001")));

        assert_eq!(
            actions,
            vec![
                HostAction::ReloadRecord,
                HostAction::ShowAlert(Alert {
                    message: String::from("Seat 12 status updated to Booked"),
                    indicator: Indicator::Green,
                }),
            ]
        );
    }

    #[test]
    fn when_seat_update_is_for_another_trip_then_nothing_happens() {
        let event = parse(
            "seat_status_update",
            serde_json::json!({"trip": "TRIP-0001", "seat_id": "A1", "status": "Booked"}),
        );
        assert!(actions_for(&event, &HostView::Trip(String::from("TRIP-0002"))).is_empty());
        assert!(actions_for(&event, &HostView::Nothing).is_empty());
    }

    #[test]
    fn when_booking_is_confirmed_then_alert_always_shows_and_list_refreshes_if_viewed() {
        let event = parse(
            "booking_confirmation",
            serde_json::json!({"booking_id": "BK-0042"}),
        );

        let elsewhere = actions_for(&event, &HostView::Nothing);
        let on_list = actions_for(&event, &HostView::BookingList);

        assert_eq!(elsewhere.len(), 1);
        assert_eq!(
            on_list,
            vec![
                HostAction::ShowAlert(Alert {
                    message: String::from("New booking confirmed: BK-0042"),
                    indicator: Indicator::Green,
                }),
                HostAction::RefreshList,
            ]
        );
    }

    #[test]
    fn when_gps_update_matches_viewed_bus_then_blue_alert_and_map_move() {
        let event = parse(
            "gps_update",
            serde_json::json!({
                "bus": "BUS-7",
                "latitude": "6.9271",
                "longitude": 79.8612,
                "timestamp": "2024-03-01 08:15:00"
            }),
        );

        let actions = actions_for(&event, &HostView::Bus(String::from("BUS-7")));

        assert_eq!(
            actions,
            vec![
                HostAction::ShowAlert(Alert {
                    message: String::from("Bus location updated at 2024-03-01 08:15:00"),
                    indicator: Indicator::Blue,
                }),
                HostAction::UpdateMapLocation(LatLng::new(6.9271, 79.8612)),
            ]
        );
    }

    #[test]
    fn when_sms_status_changes_for_viewed_log_then_only_reload() {
        let event = parse("sms_status_update", serde_json::json!({"sms_id": "SMS-0009"}));
        assert_eq!(
            actions_for(&event, &HostView::SmsLog(String::from("SMS-0009"))),
            vec![HostAction::ReloadRecord]
        );
    }

    #[test]
    fn when_view_strings_are_parsed_then_each_form_is_recognised() {
        let parse = |s: &str| s.parse::<HostView>().unwrap();
        assert_eq!(parse("none"), HostView::Nothing);
        assert_eq!(parse("bookings"), HostView::BookingList);
        assert_eq!(parse("trip:TRIP-0001"), HostView::Trip(String::from("TRIP-0001")));
        assert_eq!(parse("bus:BUS-7"), HostView::Bus(String::from("BUS-7")));
        assert_eq!(parse("sms:SMS-1"), HostView::SmsLog(String::from("SMS-1")));
        assert!("trip:".parse::<HostView>().is_err());
        assert!("booking".parse::<HostView>().is_err());
    }

    #[test]
    fn when_handler_gets_malformed_or_unknown_event_then_host_is_untouched() {
        let mut handler = StatusEventHandler::new(RecordingHost {
            view: HostView::BookingList,
            applied: Vec::new(),
        });

        handler.handle(&RealtimeMessage {
            event: String::from("booking_confirmation"),
            payload: serde_json::json!({"wrong": true}),
        });
        handler.handle(&RealtimeMessage {
            event: String::from("weather_update"),
            payload: serde_json::json!({}),
        });
        handler.handle(&RealtimeMessage {
            event: String::from("booking_confirmation"),
            payload: serde_json::json!({"booking_id": "BK-1"}),
        });

        assert_eq!(handler.host().applied.len(), 2);
    }
}
