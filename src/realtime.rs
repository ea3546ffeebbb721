pub mod channels;
pub mod event_bus;
pub mod feed;

use crate::thread_manager::SteppableTask;

pub type ListenerId = u64;

#[derive(Debug, PartialEq, Clone)]
pub struct RealtimeMessage {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Named publish/subscribe channel provided by the realtime server.
///
/// `on` registers a sink for one event name; `off` removes exactly that
/// registration and reports whether it existed.
pub trait RealtimeChannel: Send + Sync + 'static {
    fn on(&self, event: &str, sink: crossbeam_channel::Sender<RealtimeMessage>) -> ListenerId;

    fn off(&self, event: &str, listener: ListenerId) -> bool;
}

/// Consumer of realtime messages, driven by a [`ListenerTask`].
pub trait RealtimeHandler: Send + 'static {
    fn handle(&mut self, message: &RealtimeMessage);
}

/// Registers a handler on a set of events and feeds it on its own thread.
pub struct ListenerTask<H: RealtimeHandler> {
    handler: H,
    inbox: crossbeam_channel::Receiver<RealtimeMessage>,
    registrations: Vec<(String, ListenerId)>,
    channel: std::sync::Arc<dyn RealtimeChannel>,
    name: String,
}

impl<H: RealtimeHandler> ListenerTask<H> {
    pub fn new(
        name: &str,
        handler: H,
        channel: std::sync::Arc<dyn RealtimeChannel>,
        events: &[&str],
    ) -> Self {
        let (sender, inbox) = crossbeam_channel::unbounded();
        let registrations = events
            .iter()
            .map(|event| ((*event).to_string(), channel.on(event, sender.clone())))
            .collect();
        ListenerTask {
            handler,
            inbox,
            registrations,
            channel,
            name: name.to_string(),
        }
    }

    /// Handles every message already queued, without waiting.
    pub fn drain(&mut self) -> usize {
        let messages: Vec<RealtimeMessage> = self.inbox.try_iter().collect();
        for message in &messages {
            self.handler.handle(message);
        }
        messages.len()
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: RealtimeHandler> SteppableTask for ListenerTask<H> {
    fn step(&mut self) -> bool {
        match self
            .inbox
            .recv_timeout(std::time::Duration::from_millis(100))
        {
            Ok(message) => {
                self.handler.handle(&message);
                true
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => true,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                log::error!("{} inbox disconnected", self.name);
                false
            }
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl<H: RealtimeHandler> Drop for ListenerTask<H> {
    fn drop(&mut self) {
        for (event, listener) in self.registrations.drain(..) {
            self.channel.off(&event, listener);
        }
    }
}
