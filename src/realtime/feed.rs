use crate::config::RealtimeConfig;
use crate::realtime::channels::parse_vehicle_channel;
use crate::realtime::event_bus::EventBus;
use crate::thread_manager::SteppableTask;

use std::io::{BufRead, Write};

/// One line of the relay stream.
#[derive(Debug, PartialEq, serde::Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default, alias = "data")]
    pub message: serde_json::Value,
}

/// Reads newline-delimited JSON envelopes from a realtime relay (or from a
/// recorded stream) and publishes them on the event bus.
pub struct RealtimeFeed {
    reader: Box<dyn BufRead + Send>,
    bus: EventBus,
    source: String,
}

impl RealtimeFeed {
    pub fn connect(config: &RealtimeConfig, bus: EventBus) -> Result<Self, FeedError> {
        let endpoint = format!("{0}:{1}", config.host, config.port);
        log::info!("Connecting to realtime relay at {endpoint}.");
        let mut stream =
            std::net::TcpStream::connect(&endpoint).map_err(|error| FeedError::Connect {
                source: error,
                endpoint: endpoint.clone(),
            })?;
        if let Some(handshake) = &config.handshake {
            stream
                .write_all(format!("{handshake}\r\n").as_bytes())
                .map_err(|error| FeedError::Connect {
                    source: error,
                    endpoint: endpoint.clone(),
                })?;
        }
        log::info!("Connection successful.");
        Ok(RealtimeFeed {
            reader: Box::new(std::io::BufReader::new(stream)),
            bus,
            source: endpoint,
        })
    }

    pub fn from_file(path: &std::path::Path, bus: EventBus) -> Result<Self, FeedError> {
        let file = std::fs::File::open(path).map_err(|error| FeedError::Open {
            source: error,
            path: path.to_path_buf(),
        })?;
        Ok(RealtimeFeed {
            reader: Box::new(std::io::BufReader::new(file)),
            bus,
            source: path.display().to_string(),
        })
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R, bus: EventBus) -> Self {
        RealtimeFeed {
            reader: Box::new(reader),
            bus,
            source: String::from("reader"),
        }
    }
}

/// Parses one relay line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Envelope>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

impl SteppableTask for RealtimeFeed {
    fn step(&mut self) -> bool {
        let mut line_buffer = String::new();

        let bytes_read = match self.reader.read_line(&mut line_buffer) {
            Ok(bytes_read) => bytes_read,
            Err(err) => {
                log::error!("Failed to read line from {}: {err}", self.source);
                return true;
            }
        };

        if bytes_read == 0 {
            log::info!("End of realtime stream from {}", self.source);
            return false;
        }

        match parse_line(&line_buffer) {
            Ok(Some(envelope)) => {
                if let Some((kind, vehicle_id)) = parse_vehicle_channel(&envelope.event) {
                    log::debug!("{kind:?} event for vehicle {vehicle_id}");
                }
                let delivered = self.bus.publish(&envelope.event, envelope.message);
                log::trace!("{} delivered to {delivered} listeners", envelope.event);
            }
            Ok(None) => {}
            Err(err) => log::debug!("Discarding malformed realtime line: {err}"),
        }
        true
    }
}

#[derive(Debug)]
pub enum FeedError {
    Connect {
        source: std::io::Error,
        endpoint: String,
    },
    Open {
        source: std::io::Error,
        path: std::path::PathBuf,
    },
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Connect {
                source: error,
                endpoint,
            } => write!(f, "Failed to connect to realtime relay '{endpoint}': {error}"),
            FeedError::Open {
                source: error,
                path,
            } => write!(
                f,
                "Failed to open realtime recording '{}': {error}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for FeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FeedError::Connect { source: error, .. } | FeedError::Open { source: error, .. } => {
                Some(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RealtimeFeed, parse_line};
    use crate::realtime::RealtimeChannel;
    use crate::realtime::event_bus::EventBus;
    use crate::thread_manager::SteppableTask;

    #[test]
    fn when_line_is_comment_or_blank_then_it_is_skipped() {
        assert!(parse_line("# recorded 2024-03-01").unwrap().is_none());
        assert!(parse_line("   \r\n").unwrap().is_none());
        assert!(parse_line("not json").is_err());
    }

    #[test]
    fn when_envelope_uses_data_key_then_it_is_read_as_message() {
        let envelope = parse_line(r#"{"event": "gps_update", "data": {"bus": "BUS-7"}}"#)
            .unwrap()
            .expect("envelope");
        assert_eq!(envelope.event, "gps_update");
        assert_eq!(envelope.message["bus"], "BUS-7");
    }

    #[test]
    fn when_recording_is_replayed_then_events_are_published_until_end_of_stream() {
        let recording = concat!(
            "# replay\n",
            "{\"event\": \"bus_location_BUS-7\", \"message\": {\"location\": {\"lat\": 6.9, \"lng\": 79.8}}}\n",
            "garbage\n",
            "{\"event\": \"bus_location_BUS-7\", \"message\": {\"location\": {\"lat\": 6.91, \"lng\": 79.81}}}\n",
        );
        let bus = EventBus::new();
        let (sender, receiver) = crossbeam_channel::unbounded();
        bus.on("bus_location_BUS-7", sender);
        let mut feed = RealtimeFeed::from_reader(std::io::Cursor::new(recording), bus);

        let mut steps = 0;
        while feed.step() {
            steps += 1;
        }

        assert_eq!(steps, 4);
        let messages: Vec<_> = receiver.try_iter().collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].payload["location"]["lat"], 6.91);
    }
}
