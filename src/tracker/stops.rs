use crate::backend::wire::{DeviationRecord, FacilityRecord, StopRecord};
use crate::surface::{MarkerId, OverlayId};
use crate::types::LatLng;

const WORKING_STATUS: &str = "Working";

#[derive(Debug, PartialEq, Clone)]
pub struct Facility {
    pub facility_type: String,
    pub status: String,
}

impl Facility {
    #[must_use]
    pub fn is_working(&self) -> bool {
        self.status == WORKING_STATUS
    }
}

impl From<FacilityRecord> for Facility {
    fn from(record: FacilityRecord) -> Self {
        Facility {
            facility_type: record.facility_type,
            status: record.status,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub coordinates: LatLng,
    pub sequence: Option<u32>,
    pub facilities: Vec<Facility>,
    pub eta: Option<String>,
    pub is_deviation: bool,
}

impl From<StopRecord> for Stop {
    fn from(record: StopRecord) -> Self {
        Stop {
            name: record.display_name().to_string(),
            id: record.name,
            address: record.address,
            coordinates: LatLng::new(record.latitude, record.longitude),
            sequence: record.sequence,
            facilities: record.facilities.into_iter().map(Facility::from).collect(),
            eta: record.eta,
            is_deviation: false,
        }
    }
}

/// A stop together with the rendering objects drawn for it.
#[derive(Debug)]
pub struct StopMarker {
    pub stop: Stop,
    pub marker: MarkerId,
    pub info: OverlayId,
}

#[must_use]
pub fn stop_info_content(stop: &Stop) -> String {
    let mut lines = vec![stop.name.clone()];
    if let Some(address) = &stop.address {
        lines.push(address.clone());
    }
    if stop.is_deviation {
        lines.push(String::from("Alternate Stop"));
    }
    if let Some(eta) = &stop.eta {
        lines.push(format!("ETA: {eta}"));
    }
    if !stop.facilities.is_empty() {
        let facilities: Vec<String> = stop
            .facilities
            .iter()
            .map(|facility| {
                if facility.is_working() {
                    facility.facility_type.clone()
                } else {
                    format!("{} ({})", facility.facility_type, facility.status)
                }
            })
            .collect();
        lines.push(format!("Facilities: {}", facilities.join(", ")));
    }
    lines.join("\n")
}

#[must_use]
pub fn deviation_info_content(deviation: &DeviationRecord) -> String {
    let mut lines = vec![
        String::from("Route Deviation"),
        format!("Reason: {}", deviation.reason),
        format!("Description: {}", deviation.description),
    ];
    if let Some(end_time) = &deviation.end_time {
        lines.push(format!("Active until: {end_time}"));
    }
    if let Some(delay_minutes) = deviation.delay_minutes {
        lines.push(format!("Expected delay: {delay_minutes} minutes"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{Facility, Stop, deviation_info_content, stop_info_content};
    use crate::backend::wire::DeviationRecord;
    use crate::types::LatLng;

    fn fort_stop() -> Stop {
        Stop {
            id: String::from("S1"),
            name: String::from("Fort"),
            address: Some(String::from("Olcott Mawatha")),
            coordinates: LatLng::new(6.9339, 79.8500),
            sequence: Some(1),
            facilities: vec![
                Facility {
                    facility_type: String::from("Shelter"),
                    status: String::from("Working"),
                },
                Facility {
                    facility_type: String::from("Display Board"),
                    status: String::from("Out of Order"),
                },
            ],
            eta: None,
            is_deviation: false,
        }
    }

    #[test]
    fn when_stop_has_no_eta_then_info_omits_eta_line() {
        let content = stop_info_content(&fort_stop());
        assert_eq!(
            content,
            "Fort\nOlcott Mawatha\nFacilities: Shelter, Display Board (Out of Order)"
        );
    }

    #[test]
    fn when_stop_is_deviated_with_eta_then_info_shows_badge_and_eta() {
        let mut stop = fort_stop();
        stop.is_deviation = true;
        stop.eta = Some(String::from("5 min"));
        stop.facilities.clear();

        let content = stop_info_content(&stop);

        assert_eq!(content, "Fort\nOlcott Mawatha\nAlternate Stop\nETA: 5 min");
    }

    #[test]
    fn when_deviation_has_delay_then_info_lists_all_details() {
        let deviation = DeviationRecord {
            reason: String::from("Road works"),
            description: String::from("Galle Road closed"),
            end_time: Some(String::from("2024-03-01 18:00:00")),
            delay_minutes: Some(15),
            stops: Vec::new(),
        };
        let content = deviation_info_content(&deviation);
        assert!(content.starts_with("Route Deviation\nReason: Road works"));
        assert!(content.ends_with("Active until: 2024-03-01 18:00:00\nExpected delay: 15 minutes"));
    }
}
