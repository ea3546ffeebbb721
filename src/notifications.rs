pub mod device;
pub mod metrics;
pub mod push;
pub mod sink;

use crate::backend::wire::MetricEvent;
use crate::realtime::channels::{ROUTE_DEVIATION, SERVICE_ALERT};
use crate::realtime::{RealtimeHandler, RealtimeMessage};
use metrics::MetricsQueue;
use push::PushPayload;
use sink::{NotificationData, NotificationSink, Permission, PlatformNotification};

pub const SERVICE_ALERT_TYPE: &str = "service_alert";
pub const ROUTE_DEVIATION_TYPE: &str = "route_deviation";

pub const DEVIATION_ICON: &str = "/assets/public_transport/images/deviation-icon.png";
pub const DEVIATION_TITLE: &str = "Route Deviation Detected";

#[derive(Debug, serde::Deserialize)]
struct ServiceAlertEvent {
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
    #[serde(deserialize_with = "crate::types::deserialize_identifier")]
    alert_id: String,
}

#[derive(Debug, serde::Deserialize)]
struct RouteDeviationEvent {
    #[serde(default)]
    message: String,
    #[serde(deserialize_with = "crate::types::deserialize_identifier")]
    deviation_id: String,
}

/// In-app page an opened notification leads to.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NavigationTarget {
    pub route: &'static str,
    pub parameter: &'static str,
    pub value: String,
}

impl std::fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}?{}={}", self.route, self.parameter, self.value)
    }
}

#[must_use]
pub fn navigation_for(data: &NotificationData) -> Option<NavigationTarget> {
    let value = data.id.clone()?;
    match data.kind.as_str() {
        SERVICE_ALERT_TYPE => Some(NavigationTarget {
            route: "service-alerts",
            parameter: "alert",
            value,
        }),
        ROUTE_DEVIATION_TYPE => Some(NavigationTarget {
            route: "track-bus",
            parameter: "deviation",
            value,
        }),
        _ => None,
    }
}

/// Shows notifications for push messages and realtime alerts, and reports
/// their delivery and interaction metrics.
pub struct NotificationHandler {
    sink: Box<dyn NotificationSink>,
    metrics: MetricsQueue,
    scope: String,
    last_navigation: Option<NavigationTarget>,
}

impl NotificationHandler {
    /// `scope` is the base URL clicked push notifications resolve against.
    #[must_use]
    pub fn new(sink: Box<dyn NotificationSink>, metrics: MetricsQueue, scope: &str) -> Self {
        NotificationHandler {
            sink,
            metrics,
            scope: scope.to_string(),
            last_navigation: None,
        }
    }

    #[must_use]
    pub fn permission(&self) -> Permission {
        self.sink.permission()
    }

    #[must_use]
    pub fn sink(&self) -> &dyn NotificationSink {
        self.sink.as_ref()
    }

    #[must_use]
    pub fn last_navigation(&self) -> Option<&NavigationTarget> {
        self.last_navigation.as_ref()
    }

    /// Shows a received push message and reports it delivered.
    pub fn handle_push(&mut self, payload: &PushPayload) -> bool {
        match self.sink.show(&payload.to_notification()) {
            Ok(()) => {
                self.metrics
                    .report(payload.notification_type(), MetricEvent::Delivered);
                true
            }
            Err(err) => {
                log::warn!("Push '{}' not shown: {err}", payload.title);
                false
            }
        }
    }

    /// Reports the click and returns the URL to open.
    pub fn handle_push_click(&mut self, data: &NotificationData) -> String {
        self.metrics.report(&data.kind, MetricEvent::ActionClick);
        push::target_url(&self.scope, data)
    }

    /// Reports an in-app notification as opened and returns where to go.
    pub fn handle_notification_open(
        &mut self,
        data: &NotificationData,
    ) -> Option<NavigationTarget> {
        self.metrics.report(&data.kind, MetricEvent::Opened);
        let target = navigation_for(data);
        if let Some(target) = &target {
            log::info!("Opening {target}");
        }
        self.last_navigation.clone_from(&target);
        target
    }

    pub fn handle_service_alert(&mut self, payload: &serde_json::Value) -> bool {
        let event: ServiceAlertEvent = match serde_json::from_value(payload.clone()) {
            Ok(event) => event,
            Err(err) => {
                log::warn!("Malformed service alert: {err}");
                return false;
            }
        };
        let notification = PlatformNotification {
            title: event.title,
            body: event.message,
            icon: Some(push::DEFAULT_ICON.to_string()),
            badge: None,
            tag: Some(format!("service-alert-{}", event.alert_id)),
            data: NotificationData {
                kind: SERVICE_ALERT_TYPE.to_string(),
                id: Some(event.alert_id),
            },
            actions: Vec::new(),
        };
        self.show_realtime(&notification)
    }

    pub fn handle_route_deviation(&mut self, payload: &serde_json::Value) -> bool {
        let event: RouteDeviationEvent = match serde_json::from_value(payload.clone()) {
            Ok(event) => event,
            Err(err) => {
                log::warn!("Malformed route deviation alert: {err}");
                return false;
            }
        };
        let notification = PlatformNotification {
            title: DEVIATION_TITLE.to_string(),
            body: event.message,
            icon: Some(DEVIATION_ICON.to_string()),
            badge: None,
            tag: Some(format!("deviation-{}", event.deviation_id)),
            data: NotificationData {
                kind: ROUTE_DEVIATION_TYPE.to_string(),
                id: Some(event.deviation_id),
            },
            actions: Vec::new(),
        };
        self.show_realtime(&notification)
    }

    fn show_realtime(&mut self, notification: &PlatformNotification) -> bool {
        if self.sink.permission() != Permission::Granted {
            log::debug!(
                "Notification permission not granted, skipping {}",
                notification.data.kind
            );
            return false;
        }
        let kind = notification.data.kind.as_str();
        self.metrics.report(kind, MetricEvent::Sent);
        match self.sink.show(notification) {
            Ok(()) => {
                self.metrics.report(kind, MetricEvent::Delivered);
                true
            }
            Err(err) => {
                log::warn!("{kind} notification not shown: {err}");
                false
            }
        }
    }
}

impl RealtimeHandler for NotificationHandler {
    fn handle(&mut self, message: &RealtimeMessage) {
        match message.event.as_str() {
            SERVICE_ALERT => {
                self.handle_service_alert(&message.payload);
            }
            ROUTE_DEVIATION => {
                self.handle_route_deviation(&message.payload);
            }
            other => log::debug!("Notification handler ignoring {other}"),
        }
    }
}
