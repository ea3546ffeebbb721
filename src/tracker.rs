pub mod path;
pub mod stops;
pub mod subscribers;

use crate::backend::Backend;
use crate::backend::error::BackendError;
use crate::backend::wire::{
    DeviationRecord, DeviationUpdate, LocationUpdate, RouteDataResponse, RouteRecord, StopRecord,
};
use crate::realtime::channels::{vehicle_deviation_channel, vehicle_location_channel};
use crate::realtime::{ListenerId, RealtimeChannel, RealtimeMessage};
use crate::surface::{
    MarkerId, MarkerStyle, OverlayAnchor, OverlayId, PolylineId, PolylineStyle, RenderSurface,
};
use crate::thread_manager::SteppableTask;
use crate::types::{Bounds, LatLng, VehicleId, VehiclePosition, parse_backend_timestamp};
use path::PathHistory;
use stops::{Stop, StopMarker, deviation_info_content, stop_info_content};
use subscribers::{SubscriberError, SubscriberId, SubscriberSet};

/// Colombo, where the network operates.
pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: 6.9271,
    lng: 79.8612,
};
pub const DEFAULT_ZOOM: u8 = 12;
pub const DEFAULT_PATH_CAPACITY: usize = 1000;

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct TrackerSettings {
    pub default_center: LatLng,
    pub default_zoom: u8,
    pub path_capacity: usize,
    pub path_window: Option<chrono::TimeDelta>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerSettings {
            default_center: DEFAULT_CENTER,
            default_zoom: DEFAULT_ZOOM,
            path_capacity: DEFAULT_PATH_CAPACITY,
            path_window: None,
        }
    }
}

/// Remote collaborators a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub backend: std::sync::Arc<dyn Backend>,
    pub realtime: std::sync::Arc<dyn RealtimeChannel>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Route {
    pub name: Option<String>,
    pub route_number: Option<String>,
    pub coordinates: Vec<LatLng>,
}

struct RenderedRoute {
    route: Route,
    polyline: PolylineId,
}

struct ActiveDeviation {
    record: DeviationRecord,
    polyline: PolylineId,
    info: OverlayId,
    affected_stops: Vec<String>,
}

/// Handle on a fire-and-forget backend call running on a worker thread.
pub struct PendingCall {
    handle: std::thread::JoinHandle<()>,
}

impl PendingCall {
    fn spawn<F>(name: &str, call: F) -> Option<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        match std::thread::Builder::new().name(name.to_string()).spawn(call) {
            Ok(handle) => Some(PendingCall { handle }),
            Err(err) => {
                log::error!("Failed to start {name}: {err}");
                None
            }
        }
    }

    /// Blocks until the call has completed or failed.
    pub fn wait(self) {
        if self.handle.join().is_err() {
            log::error!("Backend call worker panicked");
        }
    }
}

/// Live tracking state for one vehicle drawn on one surface.
///
/// All mutation happens on the thread that owns the session, through
/// [`TrackerSession::process_pending`] or [`TrackerSession::process_next`].
pub struct TrackerSession {
    vehicle_id: VehicleId,
    settings: TrackerSettings,
    surface: Box<dyn RenderSurface>,
    collaborators: Collaborators,
    event_sender: crossbeam_channel::Sender<RealtimeMessage>,
    events: crossbeam_channel::Receiver<RealtimeMessage>,
    load_sender: crossbeam_channel::Sender<Result<RouteDataResponse, BackendError>>,
    loads: crossbeam_channel::Receiver<Result<RouteDataResponse, BackendError>>,
    registrations: Vec<(String, ListenerId)>,
    vehicle_marker: MarkerId,
    path_polyline: PolylineId,
    path: PathHistory,
    position: Option<VehiclePosition>,
    following: bool,
    route: Option<RenderedRoute>,
    stops: std::collections::BTreeMap<String, StopMarker>,
    deviation: Option<ActiveDeviation>,
    subscribers: SubscriberSet,
    pending_calls: Vec<PendingCall>,
    last_load_error: Option<String>,
    torn_down: bool,
}

impl TrackerSession {
    /// Builds the map view, registers on the vehicle's channels, announces
    /// the subscription to the backend and starts loading route data.
    pub fn create(
        vehicle_id: VehicleId,
        mut surface: Box<dyn RenderSurface>,
        collaborators: Collaborators,
        settings: TrackerSettings,
    ) -> Self {
        surface.reset_view(settings.default_center, settings.default_zoom);
        let vehicle_marker =
            surface.add_marker(None, MarkerStyle::Vehicle, Some(vehicle_id.as_str()));
        let path_polyline = surface.add_polyline(&[], PolylineStyle::TravelledPath);

        let (event_sender, events) = crossbeam_channel::unbounded();
        let (load_sender, loads) = crossbeam_channel::unbounded();

        let registrations = [
            vehicle_location_channel(&vehicle_id),
            vehicle_deviation_channel(&vehicle_id),
        ]
        .into_iter()
        .map(|channel| {
            let listener = collaborators
                .realtime
                .on(&channel, event_sender.clone());
            (channel, listener)
        })
        .collect();

        let mut session = TrackerSession {
            path: PathHistory::new(settings.path_capacity, settings.path_window),
            vehicle_id,
            settings,
            surface,
            collaborators,
            event_sender,
            events,
            load_sender,
            loads,
            registrations,
            vehicle_marker,
            path_polyline,
            position: None,
            following: false,
            route: None,
            stops: std::collections::BTreeMap::new(),
            deviation: None,
            subscribers: SubscriberSet::new(),
            pending_calls: Vec::new(),
            last_load_error: None,
            torn_down: false,
        };

        let backend = session.collaborators.backend.clone();
        let vehicle_id = session.vehicle_id.clone();
        if let Some(call) = PendingCall::spawn("subscribe_to_bus", move || {
            if let Err(err) = backend.subscribe_to_bus(&vehicle_id) {
                log::warn!("Failed to subscribe to {vehicle_id}: {err}");
            }
        }) {
            session.pending_calls.push(call);
        }

        session.reload_route_data();
        log::info!("Tracking session for {} created", session.vehicle_id);
        session
    }

    /// Issues a new route data request. The response is applied by the next
    /// `process_*` call that sees it.
    pub fn reload_route_data(&mut self) {
        let backend = self.collaborators.backend.clone();
        let vehicle_id = self.vehicle_id.clone();
        let load_sender = self.load_sender.clone();
        if let Some(call) = PendingCall::spawn("get_route_data", move || {
            let result = backend.fetch_route_data(&vehicle_id);
            if load_sender.send(result).is_err() {
                log::debug!("Route data for {vehicle_id} arrived after the session ended");
            }
        }) {
            self.pending_calls.push(call);
        }
    }

    /// Sender into the session inbox, for hosts that deliver realtime
    /// messages without going through a [`RealtimeChannel`].
    #[must_use]
    pub fn inbox(&self) -> crossbeam_channel::Sender<RealtimeMessage> {
        self.event_sender.clone()
    }

    /// Blocks until every backend call issued so far has finished.
    pub fn wait_for_pending_calls(&mut self) {
        for call in self.pending_calls.drain(..) {
            call.wait();
        }
    }

    /// Applies everything already in the inbox and returns how many messages
    /// were handled.
    pub fn process_pending(&mut self) -> usize {
        self.reap_finished_calls();
        let mut handled = 0;
        while let Ok(result) = self.loads.try_recv() {
            self.apply_route_result(result);
            handled += 1;
        }
        while let Ok(message) = self.events.try_recv() {
            self.handle_message(&message);
            handled += 1;
        }
        handled
    }

    /// Waits up to `timeout` for one inbox message and applies it.
    pub fn process_next(&mut self, timeout: std::time::Duration) -> bool {
        self.reap_finished_calls();
        let loads = self.loads.clone();
        let events = self.events.clone();
        crossbeam_channel::select! {
            recv(loads) -> result => match result {
                Ok(result) => {
                    self.apply_route_result(result);
                    true
                }
                Err(_) => false,
            },
            recv(events) -> message => match message {
                Ok(message) => {
                    self.handle_message(&message);
                    true
                }
                Err(_) => false,
            },
            default(timeout) => false,
        }
    }

    fn reap_finished_calls(&mut self) {
        let (finished, running): (Vec<PendingCall>, Vec<PendingCall>) = self
            .pending_calls
            .drain(..)
            .partition(|call| call.handle.is_finished());
        self.pending_calls = running;
        for call in finished {
            call.wait();
        }
    }

    fn handle_message(&mut self, message: &RealtimeMessage) {
        if message.event == vehicle_location_channel(&self.vehicle_id) {
            self.handle_location_update(&message.payload);
        } else if message.event == vehicle_deviation_channel(&self.vehicle_id) {
            self.handle_deviation_update(&message.payload);
        } else {
            log::debug!("Ignoring unexpected event {}", message.event);
        }
    }

    fn apply_route_result(&mut self, result: Result<RouteDataResponse, BackendError>) {
        match result {
            Ok(response) => self.apply_route_data(response),
            Err(err) => {
                log::warn!("Failed to load route data for {}: {err}", self.vehicle_id);
                self.last_load_error = Some(err.to_string());
            }
        }
    }

    /// Replaces route and stops from a route data response, then applies or
    /// clears the deviation it reports. Unsuccessful responses leave the
    /// current state in place.
    pub fn apply_route_data(&mut self, response: RouteDataResponse) {
        if !response.is_success() {
            let message = response
                .message
                .unwrap_or_else(|| format!("status '{}'", response.status));
            log::warn!("Route data for {} unavailable: {message}", self.vehicle_id);
            self.last_load_error = Some(message);
            return;
        }
        let Some(route) = response.route else {
            log::warn!("Route data for {} has no route", self.vehicle_id);
            self.last_load_error = Some(String::from("response has no route"));
            return;
        };

        self.last_load_error = None;
        // stop styling from the old deviation goes away with the old stops
        self.clear_deviation();
        self.render_route(route);
        self.render_stops(response.stops);
        if let Some(deviation) = response.active_deviation {
            self.apply_deviation(deviation);
        }
    }

    fn render_route(&mut self, record: RouteRecord) {
        if let Some(previous) = self.route.take() {
            self.surface.remove_polyline(previous.polyline);
        }
        let route = Route {
            name: record.name,
            route_number: record.route_number,
            coordinates: record
                .coordinates
                .into_iter()
                .filter(|point| {
                    let valid = point.is_valid();
                    if !valid {
                        log::warn!("Dropping invalid route point {point}");
                    }
                    valid
                })
                .collect(),
        };
        let polyline = self
            .surface
            .add_polyline(&route.coordinates, PolylineStyle::Route);
        if let Some(bounds) = Bounds::enclosing(&route.coordinates) {
            self.surface.fit_bounds(bounds);
        }
        self.route = Some(RenderedRoute { route, polyline });
    }

    fn render_stops(&mut self, records: Vec<StopRecord>) {
        for (_, previous) in std::mem::take(&mut self.stops) {
            self.surface.remove_overlay(previous.info);
            self.surface.remove_marker(previous.marker);
        }

        for record in records {
            let stop = Stop::from(record);
            let marker = self.surface.add_marker(
                Some(stop.coordinates),
                MarkerStyle::Stop,
                Some(&stop.name),
            );
            let info = self
                .surface
                .add_overlay(&stop_info_content(&stop), OverlayAnchor::Marker(marker));
            if let Some(replaced) = self
                .stops
                .insert(stop.id.clone(), StopMarker { stop, marker, info })
            {
                log::warn!("Duplicate stop {} in route data", replaced.stop.id);
                self.surface.remove_overlay(replaced.info);
                self.surface.remove_marker(replaced.marker);
            }
        }
    }

    /// Handles one `bus_location_<vehicle>` payload.
    pub fn handle_location_update(&mut self, payload: &serde_json::Value) {
        let update: LocationUpdate = match serde_json::from_value(payload.clone()) {
            Ok(update) => update,
            Err(err) => {
                log::warn!("Malformed location update for {}: {err}", self.vehicle_id);
                return;
            }
        };
        let coordinates = update.location.coordinates();
        if !coordinates.is_valid() {
            log::warn!(
                "Location {coordinates} for {} is out of range",
                self.vehicle_id
            );
            return;
        }
        let timestamp = update
            .location
            .timestamp
            .as_deref()
            .and_then(parse_backend_timestamp)
            .unwrap_or_else(chrono::Utc::now);
        let position = VehiclePosition {
            coordinates,
            timestamp,
        };

        // a late fix only extends the path, the marker stays on the newest one
        let is_newest = self
            .position
            .is_none_or(|current| current.timestamp <= position.timestamp);
        if is_newest {
            self.position = Some(position);
            self.surface.move_marker(self.vehicle_marker, coordinates);
        } else {
            log::debug!(
                "Late fix from {} for {} added to path only",
                position.timestamp,
                self.vehicle_id
            );
        }

        let evicted = self.path.push(position);
        if evicted > 0 {
            log::trace!("Evicted {evicted} path points for {}", self.vehicle_id);
        }
        self.surface
            .set_polyline_path(self.path_polyline, &self.path.points());

        if self.following && is_newest {
            self.surface.set_center(coordinates);
        }

        for upcoming in update.upcoming_stops {
            if let Some(entry) = self.stops.get_mut(&upcoming.stop) {
                entry.stop.eta = upcoming.eta;
                self.surface
                    .set_overlay_content(entry.info, &stop_info_content(&entry.stop));
            }
        }

        self.subscribers.notify(payload);
    }

    /// Handles one `bus_deviation_<vehicle>` payload: a deviation replaces
    /// the current one, a null deviation clears it.
    pub fn handle_deviation_update(&mut self, payload: &serde_json::Value) {
        match serde_json::from_value::<DeviationUpdate>(payload.clone()) {
            Ok(DeviationUpdate {
                active_deviation: Some(deviation),
            }) => self.apply_deviation(deviation),
            Ok(DeviationUpdate {
                active_deviation: None,
            }) => {
                if self.deviation.is_some() {
                    log::info!("Deviation for {} cleared", self.vehicle_id);
                }
                self.clear_deviation();
            }
            Err(err) => {
                log::warn!("Malformed deviation update for {}: {err}", self.vehicle_id);
            }
        }
    }

    fn apply_deviation(&mut self, record: DeviationRecord) {
        self.clear_deviation();

        let coordinates: Vec<LatLng> = record
            .stops
            .iter()
            .map(|stop| LatLng::new(stop.latitude, stop.longitude))
            .collect();
        let polyline = self
            .surface
            .add_polyline(&coordinates, PolylineStyle::Deviation);
        let info = self.surface.add_overlay(
            &deviation_info_content(&record),
            OverlayAnchor::PolylineClick(polyline),
        );

        let mut affected_stops = Vec::new();
        for deviation_stop in &record.stops {
            if let Some(entry) = self.stops.get_mut(&deviation_stop.name) {
                entry.stop.is_deviation = true;
                self.surface
                    .set_marker_style(entry.marker, MarkerStyle::AlternateStop);
                self.surface
                    .set_overlay_content(entry.info, &stop_info_content(&entry.stop));
                affected_stops.push(deviation_stop.name.clone());
            }
        }
        log::info!(
            "Deviation for {} applied: {} ({} stops affected)",
            self.vehicle_id,
            record.reason,
            affected_stops.len()
        );

        self.deviation = Some(ActiveDeviation {
            record,
            polyline,
            info,
            affected_stops,
        });
    }

    /// Removes the deviation overlay and returns affected stops to normal.
    pub fn clear_deviation(&mut self) {
        let Some(active) = self.deviation.take() else {
            return;
        };
        self.surface.remove_overlay(active.info);
        self.surface.remove_polyline(active.polyline);
        for stop_id in active.affected_stops {
            if let Some(entry) = self.stops.get_mut(&stop_id) {
                entry.stop.is_deviation = false;
                self.surface.set_marker_style(entry.marker, MarkerStyle::Stop);
                self.surface
                    .set_overlay_content(entry.info, &stop_info_content(&entry.stop));
            }
        }
    }

    pub fn start_following(&mut self) {
        self.following = true;
        if let Some(position) = self.position {
            self.surface.set_center(position.coordinates);
        }
    }

    pub fn stop_following(&mut self) {
        self.following = false;
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriberId
    where
        F: FnMut(&serde_json::Value) -> Result<(), SubscriberError> + Send + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    #[must_use]
    pub fn vehicle_id(&self) -> &VehicleId {
        &self.vehicle_id
    }

    #[must_use]
    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    #[must_use]
    pub fn position(&self) -> Option<VehiclePosition> {
        self.position
    }

    #[must_use]
    pub fn is_following(&self) -> bool {
        self.following
    }

    #[must_use]
    pub fn path(&self) -> &PathHistory {
        &self.path
    }

    #[must_use]
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref().map(|rendered| &rendered.route)
    }

    #[must_use]
    pub fn stop(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.get(stop_id).map(|entry| &entry.stop)
    }

    pub fn stops(&self) -> impl Iterator<Item = &Stop> {
        self.stops.values().map(|entry| &entry.stop)
    }

    #[must_use]
    pub fn stop_marker(&self, stop_id: &str) -> Option<MarkerId> {
        self.stops.get(stop_id).map(|entry| entry.marker)
    }

    #[must_use]
    pub fn active_deviation(&self) -> Option<&DeviationRecord> {
        self.deviation.as_ref().map(|active| &active.record)
    }

    #[must_use]
    pub fn deviation_polyline(&self) -> Option<PolylineId> {
        self.deviation.as_ref().map(|active| active.polyline)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn last_load_error(&self) -> Option<&str> {
        self.last_load_error.as_deref()
    }

    /// Unregisters from the channels, tells the backend, and releases every
    /// rendering object and subscriber. The returned call is the backend
    /// unsubscribe, still in flight.
    pub fn destroy(mut self) -> Option<PendingCall> {
        self.teardown()
    }

    fn teardown(&mut self) -> Option<PendingCall> {
        if self.torn_down {
            return None;
        }
        self.torn_down = true;

        for (channel, listener) in self.registrations.drain(..) {
            if !self.collaborators.realtime.off(&channel, listener) {
                log::debug!("Listener on {channel} was already gone");
            }
        }
        // drop anything that was queued before unregistering
        while self.events.try_recv().is_ok() {}

        let backend = self.collaborators.backend.clone();
        let vehicle_id = self.vehicle_id.clone();
        let unsubscribe = PendingCall::spawn("unsubscribe_from_bus", move || {
            if let Err(err) = backend.unsubscribe_from_bus(&vehicle_id) {
                log::warn!("Failed to unsubscribe from {vehicle_id}: {err}");
            }
        });

        self.clear_deviation();
        for (_, entry) in std::mem::take(&mut self.stops) {
            self.surface.remove_overlay(entry.info);
            self.surface.remove_marker(entry.marker);
        }
        if let Some(rendered) = self.route.take() {
            self.surface.remove_polyline(rendered.polyline);
        }
        self.surface.remove_polyline(self.path_polyline);
        self.surface.remove_marker(self.vehicle_marker);
        self.path.clear();
        self.subscribers.clear();

        log::info!("Tracking session for {} destroyed", self.vehicle_id);
        unsubscribe
    }
}

impl Drop for TrackerSession {
    fn drop(&mut self) {
        if let Some(call) = self.teardown() {
            call.wait();
        }
    }
}

/// Drives a session from its own thread.
pub struct TrackerTask {
    session: TrackerSession,
    poll_interval: std::time::Duration,
}

impl TrackerTask {
    #[must_use]
    pub fn new(session: TrackerSession, poll_interval: std::time::Duration) -> Self {
        TrackerTask {
            session,
            poll_interval,
        }
    }
}

impl SteppableTask for TrackerTask {
    fn step(&mut self) -> bool {
        self.session.process_next(self.poll_interval);
        true
    }

    fn name(&self) -> String {
        format!("tracker-{}", self.session.vehicle_id())
    }
}
