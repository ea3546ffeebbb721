use crate::notifications::sink::{NotificationAction, NotificationData, PlatformNotification};
use crate::notifications::{ROUTE_DEVIATION_TYPE, SERVICE_ALERT_TYPE};

pub const DEFAULT_ICON: &str = "/assets/public_transport/images/alert-icon.png";
pub const DEFAULT_BADGE: &str = "/assets/public_transport/images/notification-badge.png";

/// Body of a push message as the delivery pipeline sends it.
#[derive(Debug, PartialEq, Eq, Clone, serde::Deserialize)]
pub struct PushPayload {
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default = "empty_data")]
    pub data: NotificationData,
}

fn empty_data() -> NotificationData {
    NotificationData {
        kind: String::new(),
        id: None,
    }
}

impl PushPayload {
    /// Top-level `type`, falling back to the one nested in `data`.
    #[must_use]
    pub fn notification_type(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.data.kind)
    }

    #[must_use]
    pub fn to_notification(&self) -> PlatformNotification {
        PlatformNotification {
            title: self.title.clone(),
            body: self.message.clone(),
            icon: Some(
                self.icon
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ICON.to_string()),
            ),
            badge: Some(DEFAULT_BADGE.to_string()),
            tag: self.tag.clone(),
            data: self.data.clone(),
            actions: actions_for(self.notification_type()),
        }
    }
}

/// Buttons offered on a push notification of the given type.
#[must_use]
pub fn actions_for(kind: &str) -> Vec<NotificationAction> {
    match kind {
        SERVICE_ALERT_TYPE => vec![
            NotificationAction::new("view_details", "View Details"),
            NotificationAction::new("dismiss", "Dismiss"),
        ],
        ROUTE_DEVIATION_TYPE => vec![
            NotificationAction::new("track_bus", "Track Bus"),
            NotificationAction::new("view_route", "View Route"),
        ],
        _ => Vec::new(),
    }
}

/// Page a clicked notification opens, relative to the registration scope.
#[must_use]
pub fn target_url(scope: &str, data: &NotificationData) -> String {
    let id = data.id.as_deref().unwrap_or_default();
    match data.kind.as_str() {
        SERVICE_ALERT_TYPE => format!("{scope}service_alerts?alert={id}"),
        ROUTE_DEVIATION_TYPE => format!("{scope}track_bus?deviation={id}"),
        _ => scope.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BADGE, DEFAULT_ICON, PushPayload, actions_for, target_url};
    use crate::notifications::sink::NotificationData;

    #[test]
    fn when_push_has_no_icon_then_defaults_are_used() {
        let payload: PushPayload = serde_json::from_str(
            r#"{"title": "Delay", "message": "Route 138 delayed", "type": "service_alert",
                "data": {"type": "service_alert", "id": "SA-0001"}}"#,
        )
        .unwrap();

        let notification = payload.to_notification();

        assert_eq!(notification.icon.as_deref(), Some(DEFAULT_ICON));
        assert_eq!(notification.badge.as_deref(), Some(DEFAULT_BADGE));
        assert_eq!(notification.body, "Route 138 delayed");
        let titles: Vec<&str> = notification
            .actions
            .iter()
            .map(|action| action.title.as_str())
            .collect();
        assert_eq!(titles, vec!["View Details", "Dismiss"]);
    }

    #[test]
    fn when_type_is_unknown_then_no_actions_are_offered() {
        assert!(actions_for("promotion").is_empty());
        assert_eq!(actions_for("route_deviation")[0].action, "track_bus");
    }

    #[test]
    fn when_notification_is_clicked_then_url_depends_on_type() {
        let scope = "https://transit.example/";
        let alert = NotificationData {
            kind: String::from("service_alert"),
            id: Some(String::from("SA-0001")),
        };
        let deviation = NotificationData {
            kind: String::from("route_deviation"),
            id: Some(String::from("RD-0003")),
        };
        let other = NotificationData {
            kind: String::from("promotion"),
            id: None,
        };

        assert_eq!(
            target_url(scope, &alert),
            "https://transit.example/service_alerts?alert=SA-0001"
        );
        assert_eq!(
            target_url(scope, &deviation),
            "https://transit.example/track_bus?deviation=RD-0003"
        );
        assert_eq!(target_url(scope, &other), scope);
    }
}
