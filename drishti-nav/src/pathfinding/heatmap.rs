//! Per-sector visit history.

use std::time::{Duration, Instant};

use super::sector::{SECTOR_COUNT, Sector};

/// Last time each sector was chosen as a destination.
#[derive(Clone, Debug, Default)]
pub struct SectorHeatmap {
    visits: [Option<Instant>; SECTOR_COUNT],
}

impl SectorHeatmap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visit(&mut self, sector: Sector, at: Instant) {
        self.visits[sector.index()] = Some(at);
    }

    pub fn last_visit(&self, sector: Sector) -> Option<Instant> {
        self.visits[sector.index()]
    }

    /// Time since the last visit, `None` if never visited.
    pub fn age(&self, sector: Sector, now: Instant) -> Option<Duration> {
        self.last_visit(sector)
            .map(|t| now.saturating_duration_since(t))
    }

    /// Number of sectors visited at least once since the last reset.
    pub fn visited_count(&self) -> usize {
        self.visits.iter().filter(|v| v.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.visits = [None; SECTOR_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_and_clear() {
        let start = Instant::now();
        let mut heatmap = SectorHeatmap::new();
        let s2 = Sector::ALL[2];

        assert_eq!(heatmap.age(s2, start), None);
        heatmap.visit(s2, start);
        assert_eq!(
            heatmap.age(s2, start + Duration::from_secs(4)),
            Some(Duration::from_secs(4))
        );
        assert_eq!(heatmap.visited_count(), 1);

        heatmap.clear();
        assert_eq!(heatmap.visited_count(), 0);
        assert_eq!(heatmap.last_visit(s2), None);
    }
}
