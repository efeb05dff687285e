//! Per-region emergency statistics.
//!
//! Each reported location with emergency details is resolved to a region
//! name through a reverse geocoder, then tallied: people affected,
//! emergency count, and breakdowns by type and severity.

use std::collections::BTreeMap;

use tokio::sync::watch;
use tracing::{debug, warn};

use beacon_shared::types::{Location, Severity};

use crate::error::Result;

/// Bucket for locations the geocoder cannot place.
pub const UNKNOWN_REGION: &str = "Unknown";

/// Resolve a coordinate to a human region name. `Ok(None)` means the
/// coordinate resolved to nothing useful; `Err` means the lookup itself
/// failed.
pub trait ReverseGeocoder {
    async fn region(&self, lat: f64, lng: f64) -> Result<Option<String>>;
}

/// Totals for one region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionTally {
    pub total_people: u64,
    pub emergencies: u64,
    pub types: BTreeMap<String, u64>,
    pub severities: BTreeMap<Severity, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionStats {
    pub region: String,
    pub tally: RegionTally,
}

/// Aggregate locations into per-region statistics.
///
/// Locations without emergency details are skipped outright. A geocoder
/// error skips that one location; an empty resolution lands it in the
/// [`UNKNOWN_REGION`] bucket. Results are sorted by people affected,
/// descending, with the region name breaking ties.
pub async fn aggregate<G: ReverseGeocoder>(
    geocoder: &G,
    locations: &[Location],
) -> Vec<RegionStats> {
    let mut regions: BTreeMap<String, RegionTally> = BTreeMap::new();

    for location in locations {
        let Some(ref info) = location.emergency_info else {
            continue;
        };
        let region = match geocoder.region(location.lat, location.lng).await {
            Ok(Some(region)) => region,
            Ok(None) => UNKNOWN_REGION.to_string(),
            Err(e) => {
                warn!(
                    lat = location.lat,
                    lng = location.lng,
                    error = %e,
                    "Skipping location: reverse geocoding failed"
                );
                continue;
            }
        };

        let tally = regions.entry(region).or_default();
        tally.total_people += info.people_count();
        tally.emergencies += 1;
        *tally.types.entry(info.emergency_type.clone()).or_default() += 1;
        *tally.severities.entry(info.severity).or_default() += 1;
    }

    let mut stats: Vec<RegionStats> = regions
        .into_iter()
        .map(|(region, tally)| RegionStats { region, tally })
        .collect();
    stats.sort_by(|a, b| {
        b.tally
            .total_people
            .cmp(&a.tally.total_people)
            .then_with(|| a.region.cmp(&b.region))
    });
    stats
}

/// Sum of people and emergencies across all regions.
pub fn grand_totals(stats: &[RegionStats]) -> (u64, u64) {
    stats.iter().fold((0, 0), |(people, emergencies), s| {
        (
            people + s.tally.total_people,
            emergencies + s.tally.emergencies,
        )
    })
}

/// One-shot readiness gate. Statistics wait for the location mirror's first
/// load instead of polling for it.
#[derive(Clone)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Latch to ready. Idempotent.
    pub fn set_ready(&self) {
        let _ = self.tx.send(true);
    }

    /// Resolve immediately if already ready, otherwise wait for the latch.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes region statistics once the underlying data is ready.
pub struct StatsAggregator<G> {
    geocoder: G,
    ready: ReadySignal,
}

impl<G: ReverseGeocoder> StatsAggregator<G> {
    pub fn new(geocoder: G) -> Self {
        Self {
            geocoder,
            ready: ReadySignal::new(),
        }
    }

    pub fn ready_signal(&self) -> ReadySignal {
        self.ready.clone()
    }

    /// Signal that the location data has finished its initial load.
    pub fn mark_ready(&self) {
        self.ready.set_ready();
    }

    /// Wait for readiness, then aggregate.
    pub async fn compute(&self, locations: &[Location]) -> Vec<RegionStats> {
        self.ready.wait().await;
        debug!(count = locations.len(), "Computing region statistics");
        aggregate(&self.geocoder, locations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::StaticGeocoder;
    use beacon_shared::types::{EmergencyInfo, WalletAddress};

    fn report(lat: f64, lng: f64, kind: &str, severity: Severity, people: &str) -> Location {
        Location {
            wallet_address: WalletAddress::from_pubkey(&[1u8; 32]),
            lat,
            lng,
            emergency_info: Some(EmergencyInfo {
                emergency_type: kind.into(),
                description: "d".into(),
                severity,
                people_affected: people.into(),
                contact_info: "c".into(),
            }),
        }
    }

    fn geocoder() -> StaticGeocoder {
        StaticGeocoder::new(vec![
            (37.77, -122.41, 1.0, "California".to_string()),
            (48.85, 2.35, 1.0, "Île-de-France".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_aggregate_tallies_by_region() {
        let locations = vec![
            report(37.77, -122.41, "Fire", Severity::High, "10"),
            report(37.78, -122.40, "Flood", Severity::Critical, "5-10"),
            report(48.85, 2.35, "Fire", Severity::Low, "2"),
        ];
        let stats = aggregate(&geocoder(), &locations).await;

        assert_eq!(stats.len(), 2);
        // California first: 10 + 5 people beats 2.
        assert_eq!(stats[0].region, "California");
        assert_eq!(stats[0].tally.total_people, 15);
        assert_eq!(stats[0].tally.emergencies, 2);
        assert_eq!(stats[0].tally.types["Fire"], 1);
        assert_eq!(stats[0].tally.types["Flood"], 1);
        assert_eq!(stats[0].tally.severities[&Severity::High], 1);

        assert_eq!(stats[1].region, "Île-de-France");
        assert_eq!(stats[1].tally.total_people, 2);

        assert_eq!(grand_totals(&stats), (17, 3));
    }

    #[tokio::test]
    async fn test_unplaceable_locations_bucket_as_unknown() {
        let locations = vec![report(0.0, 0.0, "Fire", Severity::Medium, "3")];
        let stats = aggregate(&geocoder(), &locations).await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].region, UNKNOWN_REGION);
        assert_eq!(stats[0].tally.total_people, 3);
    }

    #[tokio::test]
    async fn test_plain_locations_are_skipped() {
        let locations = vec![Location {
            wallet_address: WalletAddress::from_pubkey(&[1u8; 32]),
            lat: 37.77,
            lng: -122.41,
            emergency_info: None,
        }];
        let stats = aggregate(&geocoder(), &locations).await;
        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn test_ready_signal_gates_compute() {
        let aggregator = StatsAggregator::new(geocoder());
        let signal = aggregator.ready_signal();
        assert!(!signal.is_ready());

        let waiter = tokio::spawn(async move { signal.wait().await });
        aggregator.mark_ready();
        waiter.await.unwrap();

        // Idempotent latch.
        aggregator.mark_ready();
        let stats = aggregator.compute(&[]).await;
        assert!(stats.is_empty());
    }
}
