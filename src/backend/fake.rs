use crate::backend::error::BackendError;
use crate::backend::wire::{
    ActionStatus, DeviceRegistration, NotificationMetric, PassengerNotification, PaymentDetails,
    RouteDataResponse,
};
use crate::backend::{Backend, UPDATE_NOTIFICATION_METRICS};
use crate::types::VehicleId;

#[derive(Debug, PartialEq, Clone)]
pub enum RecordedCall {
    FetchRouteData(String),
    Subscribe(String),
    Unsubscribe(String),
    RegisterDevice(DeviceRegistration),
    Metric(NotificationMetric),
    GenerateTicket(String),
    SendNotification(String, PassengerNotification),
    ProcessPayment(String, PaymentDetails),
}

/// In-memory backend that records every call.
#[derive(Default)]
pub struct FakeBackend {
    pub calls: std::sync::Mutex<Vec<RecordedCall>>,
    pub route_data: std::sync::Mutex<Option<RouteDataResponse>>,
    pub fail_metrics: std::sync::atomic::AtomicBool,
}

impl FakeBackend {
    pub fn with_route_json(json: &str) -> Self {
        let backend = FakeBackend::default();
        let response: RouteDataResponse = serde_json::from_str(json).expect("valid route json");
        *backend.route_data.lock().unwrap() = Some(response);
        backend
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn metrics(&self) -> Vec<NotificationMetric> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Metric(metric) => Some(metric),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn success() -> ActionStatus {
        serde_json::from_str(r#"{"status": "success"}"#).unwrap()
    }
}

impl Backend for FakeBackend {
    fn fetch_route_data(&self, vehicle_id: &VehicleId) -> Result<RouteDataResponse, BackendError> {
        self.record(RecordedCall::FetchRouteData(vehicle_id.to_string()));
        self.route_data
            .lock()
            .unwrap()
            .clone()
            .ok_or(BackendError::Status {
                status: 503,
                method: String::from("get_route_data"),
            })
    }

    fn subscribe_to_bus(&self, vehicle_id: &VehicleId) -> Result<(), BackendError> {
        self.record(RecordedCall::Subscribe(vehicle_id.to_string()));
        Ok(())
    }

    fn unsubscribe_from_bus(&self, vehicle_id: &VehicleId) -> Result<(), BackendError> {
        self.record(RecordedCall::Unsubscribe(vehicle_id.to_string()));
        Ok(())
    }

    fn register_device(&self, registration: &DeviceRegistration) -> Result<(), BackendError> {
        self.record(RecordedCall::RegisterDevice(registration.clone()));
        Ok(())
    }

    fn report_notification_metric(&self, metric: &NotificationMetric) -> Result<(), BackendError> {
        self.record(RecordedCall::Metric(metric.clone()));
        if self
            .fail_metrics
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(BackendError::Status {
                status: 502,
                method: UPDATE_NOTIFICATION_METRICS.to_string(),
            });
        }
        Ok(())
    }

    fn generate_ticket(&self, booking_id: &str) -> Result<ActionStatus, BackendError> {
        self.record(RecordedCall::GenerateTicket(booking_id.to_string()));
        Ok(Self::success())
    }

    fn send_notification(
        &self,
        booking_id: &str,
        notification: PassengerNotification,
    ) -> Result<ActionStatus, BackendError> {
        self.record(RecordedCall::SendNotification(
            booking_id.to_string(),
            notification,
        ));
        Ok(Self::success())
    }

    fn process_payment(
        &self,
        booking_id: &str,
        details: &PaymentDetails,
    ) -> Result<ActionStatus, BackendError> {
        self.record(RecordedCall::ProcessPayment(
            booking_id.to_string(),
            details.clone(),
        ));
        Ok(Self::success())
    }
}
