use crate::realtime::{ListenerId, RealtimeChannel, RealtimeMessage};

#[derive(Default)]
struct Registry {
    next_listener_id: ListenerId,
    listeners: std::collections::HashMap<
        String,
        Vec<(ListenerId, crossbeam_channel::Sender<RealtimeMessage>)>,
    >,
}

/// In-process realtime channel. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: std::sync::Arc<std::sync::RwLock<Registry>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Delivers `payload` to every listener of `event` and returns how many
    /// received it. Listeners whose receiving side is gone are dropped.
    pub fn publish(&self, event: &str, payload: serde_json::Value) -> usize {
        let mut registry = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(listeners) = registry.listeners.get_mut(event) else {
            log::trace!("No listeners for {event}");
            return 0;
        };

        let message = RealtimeMessage {
            event: event.to_string(),
            payload,
        };
        let mut delivered = 0;
        listeners.retain(|(listener_id, sender)| {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                log::debug!("Dropping disconnected listener {listener_id} of {event}");
                false
            }
        });
        if listeners.is_empty() {
            registry.listeners.remove(event);
        }
        delivered
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        let registry = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.listeners.get(event).map_or(0, Vec::len)
    }
}

impl RealtimeChannel for EventBus {
    fn on(&self, event: &str, sink: crossbeam_channel::Sender<RealtimeMessage>) -> ListenerId {
        let mut registry = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let listener_id = registry.next_listener_id;
        registry.next_listener_id += 1;
        registry
            .listeners
            .entry(event.to_string())
            .or_default()
            .push((listener_id, sink));
        listener_id
    }

    fn off(&self, event: &str, listener: ListenerId) -> bool {
        let mut registry = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(listeners) = registry.listeners.get_mut(event) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != listener);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            registry.listeners.remove(event);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use crate::realtime::RealtimeChannel;

    #[test]
    fn when_two_listeners_share_an_event_then_both_receive_it() {
        let bus = EventBus::new();
        let (first_sender, first_receiver) = crossbeam_channel::unbounded();
        let (second_sender, second_receiver) = crossbeam_channel::unbounded();
        bus.on("gps_update", first_sender);
        bus.on("gps_update", second_sender);

        let delivered = bus.publish("gps_update", serde_json::json!({"bus": "BUS-7"}));

        assert_eq!(delivered, 2);
        assert_eq!(first_receiver.try_recv().unwrap().payload["bus"], "BUS-7");
        assert_eq!(second_receiver.try_recv().unwrap().event, "gps_update");
    }

    #[test]
    fn when_listener_is_removed_then_off_reports_it_once() {
        let bus = EventBus::new();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let listener = bus.on("service_alert", sender);

        assert!(bus.off("service_alert", listener));
        assert!(!bus.off("service_alert", listener));
        assert!(!bus.off("never_registered", 42));
        assert_eq!(bus.publish("service_alert", serde_json::json!({})), 0);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn when_receiver_is_dropped_then_listener_is_pruned_on_publish() {
        let bus = EventBus::new();
        let (sender, receiver) = crossbeam_channel::unbounded();
        bus.on("sms_status_update", sender);
        drop(receiver);

        assert_eq!(bus.publish("sms_status_update", serde_json::json!({})), 0);
        assert_eq!(bus.listener_count("sms_status_update"), 0);
    }
}
