use crate::types::{LatLng, VehiclePosition};

/// Travelled path of one vehicle, ordered by fix time and bounded both in
/// point count and, optionally, in age relative to the newest fix.
#[derive(Debug)]
pub struct PathHistory {
    capacity: usize,
    window: Option<chrono::TimeDelta>,
    positions: std::collections::VecDeque<VehiclePosition>,
}

impl PathHistory {
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize, window: Option<chrono::TimeDelta>) -> Self {
        let capacity = capacity.max(1);
        PathHistory {
            capacity,
            window,
            positions: std::collections::VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    /// Records a fix and returns how many old fixes were evicted.
    pub fn push(&mut self, position: VehiclePosition) -> usize {
        if let Some(cutoff_time) = self.cutoff_time() {
            if position.timestamp < cutoff_time {
                log::debug!("Ignoring fix from {} outside path window", position.timestamp);
                return 0;
            }
        }

        // fixes normally arrive in order, so try the back first
        match self.positions.back() {
            Some(last) if position.timestamp < last.timestamp => {
                let idx = self
                    .positions
                    .partition_point(|existing| existing.timestamp <= position.timestamp);
                self.positions.insert(idx, position);
            }
            _ => self.positions.push_back(position),
        }

        self.prune()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn latest(&self) -> Option<&VehiclePosition> {
        self.positions.back()
    }

    #[must_use]
    pub fn points(&self) -> Vec<LatLng> {
        self.positions
            .iter()
            .map(|position| position.coordinates)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VehiclePosition> {
        self.positions.iter()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    fn cutoff_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let window = self.window?;
        self.positions.back().map(|last| last.timestamp - window)
    }

    fn prune(&mut self) -> usize {
        let mut evicted = 0;
        while self.positions.len() > self.capacity {
            self.positions.pop_front();
            evicted += 1;
        }
        if let Some(cutoff_time) = self.cutoff_time() {
            while let Some(oldest) = self.positions.front() {
                if oldest.timestamp < cutoff_time {
                    self.positions.pop_front();
                    evicted += 1;
                } else {
                    break;
                }
            }
        }
        evicted
    }
}
