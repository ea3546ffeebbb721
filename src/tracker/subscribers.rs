pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;
pub type SubscriberCallback =
    Box<dyn FnMut(&serde_json::Value) -> Result<(), SubscriberError> + Send>;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Callbacks observing raw location payloads, invoked in registration order.
#[derive(Default)]
pub struct SubscriberSet {
    next_id: u64,
    callbacks: std::collections::BTreeMap<SubscriberId, SubscriberCallback>,
}

impl SubscriberSet {
    #[must_use]
    pub fn new() -> Self {
        SubscriberSet::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriberId
    where
        F: FnMut(&serde_json::Value) -> Result<(), SubscriberError> + Send + 'static,
    {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.callbacks.insert(id, Box::new(callback));
        id
    }

    /// Returns whether `id` was registered. Unknown ids are a no-op.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.callbacks.remove(&id).is_some()
    }

    /// Calls every subscriber with `payload` and returns how many failed.
    ///
    /// A subscriber that errors or panics is logged and skipped; the rest
    /// still run.
    pub fn notify(&mut self, payload: &serde_json::Value) -> usize {
        let mut failures = 0;
        for (id, callback) in &mut self.callbacks {
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(payload)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failures += 1;
                    log::error!("Subscriber {id:?} callback failed: {err}");
                }
                Err(panic) => {
                    failures += 1;
                    log::error!(
                        "Subscriber {id:?} callback panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        failures
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
