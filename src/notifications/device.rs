use crate::backend::Backend;
use crate::backend::error::BackendError;
use crate::backend::wire::DeviceRegistration;
use crate::notifications::sink::{NotificationSink, Permission};
use rand::Rng;

pub const DEVICE_ID_PREFIX: &str = "dev_";
pub const DEFAULT_APP_VERSION: &str = "1.0.0";
const DEVICE_ID_SUFFIX_LEN: usize = 9;
const BASE36_DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static ANDROID_REGEX: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"(?i)Android").unwrap());
static IOS_REGEX: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"(?i)iPhone|iPad|iPod").unwrap());

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Platform {
    Android,
    Ios,
    Web,
}

impl Platform {
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        if ANDROID_REGEX.is_match(user_agent) {
            Platform::Android
        } else if IOS_REGEX.is_match(user_agent) {
            Platform::Ios
        } else {
            Platform::Web
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Platform::Android => "Android",
            Platform::Ios => "iOS",
            Platform::Web => "Web",
        };
        write!(f, "{name}")
    }
}

pub mod errors {
    #[derive(Debug)]
    pub enum DeviceIdError {
        Read {
            source: std::io::Error,
            path: std::path::PathBuf,
        },
        Write {
            source: std::io::Error,
            path: std::path::PathBuf,
        },
        Malformed {
            content: String,
            path: std::path::PathBuf,
        },
    }

    impl std::fmt::Display for DeviceIdError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                DeviceIdError::Read { source, path } => {
                    write!(
                        f,
                        "Failed to read device id from '{}': {source}",
                        path.display()
                    )
                }
                DeviceIdError::Write { source, path } => {
                    write!(
                        f,
                        "Failed to save device id to '{}': {source}",
                        path.display()
                    )
                }
                DeviceIdError::Malformed { content, path } => {
                    write!(
                        f,
                        "Device id file '{}' holds '{content}', which is not a device id",
                        path.display()
                    )
                }
            }
        }
    }

    impl std::error::Error for DeviceIdError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            match self {
                DeviceIdError::Read { source, .. } | DeviceIdError::Write { source, .. } => {
                    Some(source)
                }
                DeviceIdError::Malformed { .. } => None,
            }
        }
    }

    #[derive(Debug)]
    pub enum RegistrationError {
        DeviceId(DeviceIdError),
        Backend(crate::backend::error::BackendError),
    }

    impl std::fmt::Display for RegistrationError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                RegistrationError::DeviceId(err) => write!(f, "Push registration failed: {err}"),
                RegistrationError::Backend(err) => write!(f, "Push registration failed: {err}"),
            }
        }
    }

    impl std::error::Error for RegistrationError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            match self {
                RegistrationError::DeviceId(err) => Some(err),
                RegistrationError::Backend(err) => Some(err),
            }
        }
    }
}

use errors::{DeviceIdError, RegistrationError};

impl From<DeviceIdError> for RegistrationError {
    fn from(err: DeviceIdError) -> Self {
        RegistrationError::DeviceId(err)
    }
}

impl From<BackendError> for RegistrationError {
    fn from(err: BackendError) -> Self {
        RegistrationError::Backend(err)
    }
}

#[must_use]
pub fn generate_device_id<R: Rng>(rng: &mut R) -> String {
    let suffix: String = (0..DEVICE_ID_SUFFIX_LEN)
        .map(|_| char::from(BASE36_DIGITS[rng.random_range(0..BASE36_DIGITS.len())]))
        .collect();
    format!("{DEVICE_ID_PREFIX}{suffix}")
}

/// Device identifier persisted in a single-line file.
#[derive(Debug, Clone)]
pub struct DeviceIdStore {
    path: std::path::PathBuf,
}

impl DeviceIdStore {
    #[must_use]
    pub fn new(path: &std::path::Path) -> Self {
        DeviceIdStore {
            path: path.to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Returns the stored id, generating and saving one on first use.
    pub fn load_or_create(&self) -> Result<String, DeviceIdError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let device_id = content.trim();
                if device_id.is_empty() || device_id.contains(char::is_whitespace) {
                    return Err(DeviceIdError::Malformed {
                        content: content.clone(),
                        path: self.path.clone(),
                    });
                }
                Ok(device_id.to_string())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let device_id = generate_device_id(&mut rand::rng());
                self.save(&device_id)?;
                log::info!(
                    "Generated device id {device_id} in {}",
                    self.path.display()
                );
                Ok(device_id)
            }
            Err(source) => Err(DeviceIdError::Read {
                source,
                path: self.path.clone(),
            }),
        }
    }

    fn save(&self, device_id: &str) -> Result<(), DeviceIdError> {
        let to_write_error = |source| DeviceIdError::Write {
            source,
            path: self.path.clone(),
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(to_write_error)?;
            }
        }
        std::fs::write(&self.path, format!("{device_id}\n")).map_err(to_write_error)
    }
}

/// Registers this device for push delivery. Returns `None` without calling
/// the backend when the sink may not show notifications.
pub fn register_push_device(
    backend: &dyn Backend,
    sink: &dyn NotificationSink,
    store: &DeviceIdStore,
    subscription: &serde_json::Value,
    user_agent: &str,
    app_version: Option<&str>,
) -> Result<Option<DeviceRegistration>, RegistrationError> {
    if sink.permission() != Permission::Granted {
        log::info!("Notification permission not granted, skipping push registration");
        return Ok(None);
    }

    let registration = DeviceRegistration {
        device_id: store.load_or_create()?,
        token: subscription.to_string(),
        platform: Platform::from_user_agent(user_agent).to_string(),
        app_version: app_version.unwrap_or(DEFAULT_APP_VERSION).to_string(),
    };
    backend.register_device(&registration)?;
    log::info!(
        "Registered device {} ({})",
        registration.device_id,
        registration.platform
    );
    Ok(Some(registration))
}

#[cfg(test)]
mod tests {
    use super::errors::{DeviceIdError, RegistrationError};
    use super::{DeviceIdStore, Platform, generate_device_id, register_push_device};
    use crate::backend::fake::{FakeBackend, RecordedCall};
    use crate::notifications::sink::RecordingSink;

    #[test]
    fn when_device_id_is_generated_then_it_has_prefix_and_base36_suffix() {
        let device_id = generate_device_id(&mut rand::rng());
        let suffix = device_id.strip_prefix("dev_").expect("prefixed");
        assert_eq!(suffix.len(), 9);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
    }

    #[test]
    fn when_store_is_used_twice_then_same_id_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeviceIdStore::new(&dir.path().join("state").join("device_id"));

        let first = store.load_or_create().unwrap();
        let second = DeviceIdStore::new(store.path()).load_or_create().unwrap();

        assert_eq!(first, second);
        assert!(store.path().exists());
    }

    #[test]
    fn when_stored_id_is_blank_then_it_is_reported_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device_id");
        std::fs::write(&path, "  \n").unwrap();

        let result = DeviceIdStore::new(&path).load_or_create();

        assert!(matches!(result, Err(DeviceIdError::Malformed { .. })));
    }

    #[test]
    fn when_user_agent_is_checked_then_platform_is_detected() {
        assert_eq!(
            Platform::from_user_agent("Mozilla/5.0 (Linux; Android 14; Pixel 8)"),
            Platform::Android
        );
        assert_eq!(
            Platform::from_user_agent("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)"),
            Platform::Ios
        );
        assert_eq!(
            Platform::from_user_agent("Mozilla/5.0 (X11; Linux x86_64)").to_string(),
            "Web"
        );
    }

    #[test]
    fn when_permission_is_granted_then_device_is_registered() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeviceIdStore::new(&dir.path().join("device_id"));
        let backend = FakeBackend::default();
        let subscription = serde_json::json!({"endpoint": "https://push.example/abc"});

        let registration = register_push_device(
            &backend,
            &RecordingSink::granted(),
            &store,
            &subscription,
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)",
            None,
        )
        .unwrap()
        .expect("registered");

        assert_eq!(registration.platform, "iOS");
        assert_eq!(registration.app_version, "1.0.0");
        assert_eq!(registration.token, r#"{"endpoint":"https://push.example/abc"}"#);
        assert_eq!(
            backend.calls(),
            vec![RecordedCall::RegisterDevice(registration)]
        );
    }

    #[test]
    fn when_permission_is_denied_then_registration_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeviceIdStore::new(&dir.path().join("device_id"));
        let backend = FakeBackend::default();

        let outcome = register_push_device(
            &backend,
            &RecordingSink::denied(),
            &store,
            &serde_json::json!({}),
            "",
            Some("2.1.0"),
        );

        assert!(matches!(outcome, Ok(None)));
        assert!(backend.calls().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn when_device_id_cannot_be_saved_then_registration_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "").unwrap();
        let store = DeviceIdStore::new(&blocker.join("device_id"));

        let outcome = register_push_device(
            &FakeBackend::default(),
            &RecordingSink::granted(),
            &store,
            &serde_json::json!({}),
            "",
            None,
        );

        assert!(matches!(
            outcome,
            Err(RegistrationError::DeviceId(
                DeviceIdError::Read { .. } | DeviceIdError::Write { .. }
            ))
        ));
    }
}
