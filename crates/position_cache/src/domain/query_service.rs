use chrono::Utc;
use common::domain::{
    canonicalize_vehicle_key, CachedVehiclePosition, DomainError, DomainResult,
    VehiclePositionRepository,
};
use common::geo;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Which lookup found the position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "exact"),
            MatchKind::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionLookup {
    pub position: CachedVehiclePosition,
    pub matched_by: MatchKind,
    /// Age of [`CachedVehiclePosition::observed_at`] at lookup time
    pub age: Duration,
    pub stale: bool,
}

impl PositionLookup {
    /// Great-circle distance from `origin` to the vehicle, plus the time to
    /// cover it at the vehicle's last reported speed.
    pub fn proximity_to(&self, origin: (f64, f64)) -> Proximity {
        let position = &self.position.position;
        let distance_km = geo::haversine_km(origin, (position.lat, position.lng));
        Proximity {
            distance_km,
            distance_miles: geo::km_to_miles(distance_km),
            eta: position
                .speed_kph
                .and_then(|speed| geo::travel_time(distance_km, speed)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    pub distance_km: f64,
    pub distance_miles: f64,
    /// `None` when the vehicle reported no speed or is stationary
    pub eta: Option<Duration>,
}

/// Point reads against the current-state store. Never calls the provider.
pub struct QueryService {
    repository: Arc<dyn VehiclePositionRepository>,
    stale_after: Duration,
}

impl QueryService {
    pub fn new(repository: Arc<dyn VehiclePositionRepository>, stale_after: Duration) -> Self {
        Self {
            repository,
            stale_after,
        }
    }

    /// Exact key first, then the smallest key containing the query.
    ///
    /// Returns `InvalidQuery` when the query canonicalizes to nothing and
    /// `VehicleNotFound` (carrying the canonical query) when neither lookup matches.
    #[instrument(skip(self))]
    pub async fn find_vehicle(&self, query: &str) -> DomainResult<PositionLookup> {
        let normalized = canonicalize_vehicle_key(query);
        if normalized.is_empty() {
            return Err(DomainError::InvalidQuery(
                "vehicle query must not be empty".to_string(),
            ));
        }

        let (position, matched_by) = match self.repository.get_position(&normalized).await? {
            Some(position) => (position, MatchKind::Exact),
            None => match self.repository.find_position_containing(&normalized).await? {
                Some(position) => (position, MatchKind::Fuzzy),
                None => {
                    debug!(query = %normalized, "no exact or fuzzy match");
                    return Err(DomainError::VehicleNotFound { query: normalized });
                }
            },
        };

        debug!(
            query = %normalized,
            vehicle_key = %position.vehicle_key(),
            %matched_by,
            "vehicle position found"
        );

        let now = Utc::now();
        let observed_at = position.observed_at();
        Ok(PositionLookup {
            age: geo::position_age(observed_at, now),
            stale: geo::is_stale(observed_at, now, self.stale_after),
            position,
            matched_by,
        })
    }
}
