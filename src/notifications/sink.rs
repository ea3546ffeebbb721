#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Permission {
    Granted,
    Denied,
    /// The environment cannot show notifications at all.
    Unsupported,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    #[must_use]
    pub fn new(action: &str, title: &str) -> Self {
        NotificationAction {
            action: action.to_string(),
            title: title.to_string(),
        }
    }
}

/// What a notification refers to, carried through to click handling.
#[derive(Debug, PartialEq, Eq, Clone, serde::Deserialize, serde::Serialize)]
pub struct NotificationData {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
}

fn deserialize_optional_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "crate::types::deserialize_identifier")] String);

    Ok(<Option<Wrapper> as serde::Deserialize>::deserialize(deserializer)?.map(|Wrapper(id)| id))
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PlatformNotification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum NotificationSinkError {
    PermissionDenied,
    Unsupported,
    Failed(String),
}

impl std::fmt::Display for NotificationSinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationSinkError::PermissionDenied => {
                write!(f, "Notification permission was not granted")
            }
            NotificationSinkError::Unsupported => {
                write!(f, "Notifications are not supported here")
            }
            NotificationSinkError::Failed(reason) => {
                write!(f, "Failed to show notification: {reason}")
            }
        }
    }
}

impl std::error::Error for NotificationSinkError {}

/// Where notifications are shown. Hosts without notification support use
/// [`NoopSink`].
pub trait NotificationSink: Send {
    fn permission(&self) -> Permission;

    fn show(&mut self, notification: &PlatformNotification) -> Result<(), NotificationSinkError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn permission(&self) -> Permission {
        Permission::Unsupported
    }

    fn show(&mut self, _notification: &PlatformNotification) -> Result<(), NotificationSinkError> {
        Err(NotificationSinkError::Unsupported)
    }
}

/// Writes notifications to the log, for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(&mut self, notification: &PlatformNotification) -> Result<(), NotificationSinkError> {
        let actions: Vec<&str> = notification
            .actions
            .iter()
            .map(|action| action.title.as_str())
            .collect();
        log::info!(
            "[{}] {}: {}{}",
            notification.tag.as_deref().unwrap_or(&notification.data.kind),
            notification.title,
            notification.body,
            if actions.is_empty() {
                String::new()
            } else {
                format!(" ({})", actions.join(" | "))
            }
        );
        Ok(())
    }
}

#[cfg(test)]
pub use recording::RecordingSink;

#[cfg(test)]
mod recording {
    use super::{NotificationSink, NotificationSinkError, Permission, PlatformNotification};

    /// Keeps every notification it was asked to show.
    pub struct RecordingSink {
        pub permission: Permission,
        pub shown: std::sync::Arc<std::sync::Mutex<Vec<PlatformNotification>>>,
    }

    impl RecordingSink {
        pub fn granted() -> Self {
            RecordingSink {
                permission: Permission::Granted,
                shown: std::sync::Arc::default(),
            }
        }

        pub fn denied() -> Self {
            RecordingSink {
                permission: Permission::Denied,
                shown: std::sync::Arc::default(),
            }
        }
    }

    impl NotificationSink for RecordingSink {
        fn permission(&self) -> Permission {
            self.permission
        }

        fn show(
            &mut self,
            notification: &PlatformNotification,
        ) -> Result<(), NotificationSinkError> {
            if self.permission != Permission::Granted {
                return Err(NotificationSinkError::PermissionDenied);
            }
            self.shown.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NotificationData;

    #[test]
    fn when_data_id_is_numeric_then_it_is_read_as_text() {
        let data: NotificationData =
            serde_json::from_str(r#"{"type": "service_alert", "id": 42}"#).unwrap();
        assert_eq!(data.id.as_deref(), Some("42"));
    }

    #[test]
    fn when_data_id_is_missing_or_null_then_it_is_none() {
        let missing: NotificationData = serde_json::from_str(r#"{"type": "x"}"#).unwrap();
        let null: NotificationData = serde_json::from_str(r#"{"type": "x", "id": null}"#).unwrap();
        assert_eq!(missing.id, None);
        assert_eq!(null.id, None);
    }
}
