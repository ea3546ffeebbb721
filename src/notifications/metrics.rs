use crate::backend::Backend;
use crate::backend::wire::{MetricEvent, NotificationMetric};
use crate::thread_manager::SteppableTask;

/// Producer side of the metrics reporter. Reports are queued and never block.
#[derive(Clone)]
pub struct MetricsQueue {
    sender: crossbeam_channel::Sender<NotificationMetric>,
}

impl MetricsQueue {
    pub fn report(&self, notification_type: &str, event_type: MetricEvent) {
        let metric = NotificationMetric::app(notification_type, event_type);
        if self.sender.send(metric).is_err() {
            log::warn!("Metrics reporter stopped, dropping {notification_type} {event_type}");
        }
    }
}

/// Sends queued metrics to the backend, each exactly once at most.
/// A failed send is logged and the metric discarded.
pub struct MetricsReporter {
    backend: std::sync::Arc<dyn Backend>,
    inbox: crossbeam_channel::Receiver<NotificationMetric>,
    reported: u64,
    dropped: u64,
}

#[must_use]
pub fn metrics_channel(backend: std::sync::Arc<dyn Backend>) -> (MetricsQueue, MetricsReporter) {
    let (sender, inbox) = crossbeam_channel::unbounded();
    (
        MetricsQueue { sender },
        MetricsReporter {
            backend,
            inbox,
            reported: 0,
            dropped: 0,
        },
    )
}

impl MetricsReporter {
    fn send(&mut self, metric: &NotificationMetric) {
        match self.backend.report_notification_metric(metric) {
            Ok(()) => {
                self.reported += 1;
                log::debug!(
                    "Reported {} {} metric",
                    metric.notification_type,
                    metric.event_type
                );
            }
            Err(err) => {
                self.dropped += 1;
                log::warn!(
                    "Dropping {} {} metric: {err}",
                    metric.notification_type,
                    metric.event_type
                );
            }
        }
    }

    /// Sends everything already queued.
    pub fn flush(&mut self) -> usize {
        let queued: Vec<NotificationMetric> = self.inbox.try_iter().collect();
        for metric in &queued {
            self.send(metric);
        }
        queued.len()
    }

    #[must_use]
    pub fn reported(&self) -> u64 {
        self.reported
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl SteppableTask for MetricsReporter {
    fn step(&mut self) -> bool {
        match self
            .inbox
            .recv_timeout(std::time::Duration::from_millis(100))
        {
            Ok(metric) => {
                self.send(&metric);
                true
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => true,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                log::info!(
                    "Metrics queue closed after {} reported, {} dropped",
                    self.reported,
                    self.dropped
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::metrics_channel;
    use crate::backend::fake::FakeBackend;
    use crate::backend::wire::{MetricEvent, NotificationMetric};
    use crate::thread_manager::SteppableTask;

    #[test]
    fn when_metrics_are_queued_then_flush_sends_each_once() {
        let backend = std::sync::Arc::new(FakeBackend::default());
        let (queue, mut reporter) = metrics_channel(backend.clone());

        queue.report("service_alert", MetricEvent::Sent);
        queue.report("service_alert", MetricEvent::Delivered);

        assert_eq!(reporter.flush(), 2);
        assert_eq!(reporter.flush(), 0);
        assert_eq!(
            backend.metrics(),
            vec![
                NotificationMetric::app("service_alert", MetricEvent::Sent),
                NotificationMetric::app("service_alert", MetricEvent::Delivered),
            ]
        );
    }

    #[test]
    fn when_backend_rejects_metric_then_it_is_not_retried() {
        let backend = std::sync::Arc::new(FakeBackend::default());
        backend
            .fail_metrics
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let (queue, mut reporter) = metrics_channel(backend.clone());

        queue.report("route_deviation", MetricEvent::Opened);
        reporter.flush();
        backend
            .fail_metrics
            .store(false, std::sync::atomic::Ordering::SeqCst);
        reporter.flush();

        assert_eq!(reporter.dropped(), 1);
        assert_eq!(reporter.reported(), 0);
        assert_eq!(backend.metrics().len(), 1);
    }

    #[test]
    fn when_queue_is_dropped_then_reporter_task_finishes() {
        let backend = std::sync::Arc::new(FakeBackend::default());
        let (queue, mut reporter) = metrics_channel(backend);
        queue.report("service_alert", MetricEvent::Sent);
        drop(queue);

        assert!(reporter.step());
        assert!(!reporter.step());
        assert_eq!(reporter.reported(), 1);
    }
}
