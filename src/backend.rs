pub mod error;
#[cfg(test)]
pub mod fake;
pub mod http;
pub mod wire;

use crate::types::VehicleId;
use error::BackendError;
use wire::{
    ActionStatus, DeviceRegistration, NotificationMetric, PassengerNotification, PaymentDetails,
    RouteDataResponse,
};

pub const GET_ROUTE_DATA: &str = "public_transport.public_transport.api.get_route_data";
pub const SUBSCRIBE_TO_BUS: &str = "public_transport.public_transport.realtime.subscribe_to_bus";
pub const UNSUBSCRIBE_FROM_BUS: &str =
    "public_transport.public_transport.realtime.unsubscribe_from_bus";
pub const REGISTER_DEVICE: &str = "public_transport.public_transport.api.register_device";
pub const UPDATE_NOTIFICATION_METRICS: &str =
    "public_transport.public_transport.utils.notification_analytics.update_notification_metrics";
pub const GENERATE_TICKET: &str = "public_transport.public_transport.api.generate_ticket";
pub const SEND_NOTIFICATION: &str = "public_transport.public_transport.api.send_notification";
pub const PROCESS_PAYMENT: &str = "public_transport.public_transport.api.process_payment";

/// Remote procedures exposed by the transit backend.
///
/// Every call blocks the calling thread until the backend answers or the
/// transport gives up. Callers that must not stall run calls on a worker.
pub trait Backend: Send + Sync + 'static {
    fn fetch_route_data(&self, vehicle_id: &VehicleId) -> Result<RouteDataResponse, BackendError>;

    fn subscribe_to_bus(&self, vehicle_id: &VehicleId) -> Result<(), BackendError>;

    fn unsubscribe_from_bus(&self, vehicle_id: &VehicleId) -> Result<(), BackendError>;

    fn register_device(&self, registration: &DeviceRegistration) -> Result<(), BackendError>;

    fn report_notification_metric(&self, metric: &NotificationMetric) -> Result<(), BackendError>;

    fn generate_ticket(&self, booking_id: &str) -> Result<ActionStatus, BackendError>;

    fn send_notification(
        &self,
        booking_id: &str,
        notification: PassengerNotification,
    ) -> Result<ActionStatus, BackendError>;

    fn process_payment(
        &self,
        booking_id: &str,
        details: &PaymentDetails,
    ) -> Result<ActionStatus, BackendError>;
}

/// Turns an unsuccessful action reply into an error, keeping the backend's
/// message when it sent one.
pub fn require_success(method: &str, status: ActionStatus) -> Result<ActionStatus, BackendError> {
    if status.is_success() {
        Ok(status)
    } else {
        Err(BackendError::Rejected {
            method: method.to_string(),
            message: status
                .message
                .clone()
                .unwrap_or_else(|| format!("status '{}'", status.status)),
        })
    }
}
