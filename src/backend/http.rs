use crate::backend::error::BackendError;
use crate::backend::wire::{
    ActionStatus, DeviceRegistration, NotificationMetric, PassengerNotification, PaymentDetails,
    RouteDataResponse,
};
use crate::backend::{
    Backend, GENERATE_TICKET, GET_ROUTE_DATA, PROCESS_PAYMENT, REGISTER_DEVICE, SEND_NOTIFICATION,
    SUBSCRIBE_TO_BUS, UNSUBSCRIBE_FROM_BUS, UPDATE_NOTIFICATION_METRICS,
};
use crate::config::BackendConfig;
use crate::types::VehicleId;

/// Backend reached over the framework's `POST /api/method/<name>` endpoints.
pub struct HttpBackend {
    client: reqwest::blocking::Client,
    base_url: String,
    authorization: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;
        let authorization = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) => Some(format!("token {key}:{secret}")),
            _ => None,
        };
        Ok(HttpBackend {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization,
        })
    }

    #[must_use]
    pub fn method_url(&self, method: &str) -> String {
        format!("{0}/api/method/{1}", self.base_url, method)
    }

    /// Posts `body` to `method` and returns the unwrapped `message` value, if
    /// the reply carried one.
    fn call(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, BackendError> {
        log::debug!("Calling backend method {method}");
        let mut request = self.client.post(self.method_url(method)).json(body);
        if let Some(authorization) = &self.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }

        let response = request.send().map_err(|error| BackendError::Transport {
            source: error,
            method: method.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                method: method.to_string(),
            });
        }

        let text = response.text().map_err(|error| BackendError::Transport {
            source: error,
            method: method.to_string(),
        })?;
        unwrap_message(method, &text)
    }

    fn call_for<T>(&self, method: &str, body: &serde_json::Value) -> Result<T, BackendError>
    where
        T: serde::de::DeserializeOwned,
    {
        let message = self
            .call(method, body)?
            .ok_or_else(|| BackendError::MissingMessage {
                method: method.to_string(),
            })?;
        serde_json::from_value(message).map_err(|error| BackendError::Decode {
            source: error,
            method: method.to_string(),
        })
    }
}

fn encode_body<T: serde::Serialize>(
    method: &str,
    body: &T,
) -> Result<serde_json::Value, BackendError> {
    serde_json::to_value(body).map_err(|error| BackendError::Encode {
        source: error,
        method: method.to_string(),
    })
}

fn unwrap_message(method: &str, text: &str) -> Result<Option<serde_json::Value>, BackendError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let mut envelope: serde_json::Value =
        serde_json::from_str(text).map_err(|error| BackendError::Decode {
            source: error,
            method: method.to_string(),
        })?;
    Ok(match envelope.get_mut("message").map(serde_json::Value::take) {
        None | Some(serde_json::Value::Null) => None,
        Some(message) => Some(message),
    })
}

impl Backend for HttpBackend {
    fn fetch_route_data(&self, vehicle_id: &VehicleId) -> Result<RouteDataResponse, BackendError> {
        self.call_for(
            GET_ROUTE_DATA,
            &serde_json::json!({
                "bus_id": vehicle_id.as_str(),
                "include_deviations": true,
            }),
        )
    }

    fn subscribe_to_bus(&self, vehicle_id: &VehicleId) -> Result<(), BackendError> {
        self.call(
            SUBSCRIBE_TO_BUS,
            &serde_json::json!({ "bus_id": vehicle_id.as_str() }),
        )
        .map(|_| ())
    }

    fn unsubscribe_from_bus(&self, vehicle_id: &VehicleId) -> Result<(), BackendError> {
        self.call(
            UNSUBSCRIBE_FROM_BUS,
            &serde_json::json!({ "bus_id": vehicle_id.as_str() }),
        )
        .map(|_| ())
    }

    fn register_device(&self, registration: &DeviceRegistration) -> Result<(), BackendError> {
        let body = encode_body(REGISTER_DEVICE, registration)?;
        self.call(REGISTER_DEVICE, &body).map(|_| ())
    }

    fn report_notification_metric(&self, metric: &NotificationMetric) -> Result<(), BackendError> {
        let body = encode_body(UPDATE_NOTIFICATION_METRICS, metric)?;
        self.call(UPDATE_NOTIFICATION_METRICS, &body).map(|_| ())
    }

    fn generate_ticket(&self, booking_id: &str) -> Result<ActionStatus, BackendError> {
        self.call_for(
            GENERATE_TICKET,
            &serde_json::json!({ "booking_id": booking_id }),
        )
    }

    fn send_notification(
        &self,
        booking_id: &str,
        notification: PassengerNotification,
    ) -> Result<ActionStatus, BackendError> {
        self.call_for(
            SEND_NOTIFICATION,
            &serde_json::json!({
                "booking_id": booking_id,
                "notification_type": notification,
            }),
        )
    }

    fn process_payment(
        &self,
        booking_id: &str,
        details: &PaymentDetails,
    ) -> Result<ActionStatus, BackendError> {
        // the endpoint expects the details as a JSON encoded string argument
        let payment_details =
            serde_json::to_string(details).map_err(|error| BackendError::Encode {
                source: error,
                method: PROCESS_PAYMENT.to_string(),
            })?;
        self.call_for(
            PROCESS_PAYMENT,
            &serde_json::json!({
                "booking_id": booking_id,
                "payment_details": payment_details,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpBackend, encode_body, unwrap_message};
    use crate::backend::error::BackendError;
    use crate::config::BackendConfig;

    fn backend_config(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            api_key: Some(String::from("key")),
            api_secret: Some(String::from("secret")),
            timeout_seconds: 5,
        }
    }

    #[test]
    fn when_base_url_has_trailing_slash_then_method_url_has_single_separator() {
        let backend = HttpBackend::new(&backend_config("https://transit.example.com/"))
            .expect("client builds");
        assert_eq!(
            backend.method_url("ping"),
            "https://transit.example.com/api/method/ping"
        );
        assert_eq!(backend.authorization.as_deref(), Some("token key:secret"));
    }

    #[test]
    fn when_reply_wraps_value_in_message_then_value_is_unwrapped() {
        let message = unwrap_message("m", r#"{"message": {"status": "success"}}"#)
            .expect("valid reply")
            .expect("has message");
        assert_eq!(message["status"], "success");
    }

    #[test]
    fn when_reply_has_no_message_then_none_is_returned() {
        assert_eq!(unwrap_message("m", "{}").expect("valid reply"), None);
        assert_eq!(unwrap_message("m", "").expect("valid reply"), None);
        assert_eq!(
            unwrap_message("m", r#"{"message": null}"#).expect("valid reply"),
            None
        );
    }

    #[test]
    fn when_reply_is_not_json_then_decode_error_names_method() {
        let error = unwrap_message("get_route_data", "<html>").expect_err("not json");
        assert_eq!(error.method(), "get_route_data");
    }

    #[test]
    fn when_body_cannot_be_serialized_then_encode_error_names_method() {
        let mut body = std::collections::BTreeMap::new();
        body.insert((1, 2), "tuple keys are not valid JSON object keys");

        let error = encode_body("register_device", &body).expect_err("not encodable");

        assert!(matches!(error, BackendError::Encode { .. }));
        assert_eq!(error.method(), "register_device");
        assert!(error.to_string().starts_with("Cannot encode request to 'register_device'"));
    }
}
