//! Client-side mirror of the reported-locations table.

use tracing::{info, warn};

use beacon_shared::types::{EmergencyInfo, Location};

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::events::{self, NoticeSender};
use crate::session::Session;

/// Locations as the client sees them: a fetched mirror of the server's set.
/// The mirror mutates only after the server confirms a write, and grows
/// from realtime insert events.
pub struct LocationStore {
    api: ApiClient,
    session: Option<Session>,
    locations: Vec<Location>,
    notices: Option<NoticeSender>,
}

impl LocationStore {
    pub fn new(api: ApiClient, session: Option<Session>) -> Self {
        let api = match &session {
            Some(session) => api.with_token(&session.token),
            None => api,
        };
        Self {
            api,
            session,
            locations: Vec::new(),
            notices: None,
        }
    }

    pub fn with_notices(mut self, notices: NoticeSender) -> Self {
        self.notices = Some(notices);
        self
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Fetch the full location set. On failure the mirror is left empty
    /// rather than stale.
    pub async fn load(&mut self) -> Result<()> {
        match self.api.list_locations().await {
            Ok(locations) => {
                info!(count = locations.len(), "Loaded locations");
                self.locations = locations;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load locations");
                events::error(&self.notices, "Error loading locations");
                self.locations.clear();
                Err(e)
            }
        }
    }

    /// Report a location, optionally carrying emergency details. Validates
    /// locally before anything touches the network; the stored row comes back
    /// from the server with the session's address stamped as owner.
    pub async fn add(
        &mut self,
        lat: f64,
        lng: f64,
        emergency_info: Option<EmergencyInfo>,
    ) -> Result<Location> {
        let session = self.session.as_ref().ok_or(ClientError::NotAuthenticated)?;

        let candidate = Location {
            wallet_address: session.address.clone(),
            lat,
            lng,
            emergency_info,
        };
        candidate.validate()?;

        match self
            .api
            .add_location(lat, lng, candidate.emergency_info.as_ref())
            .await
        {
            Ok(stored) => {
                self.locations.push(stored.clone());
                let notice = if stored.emergency_info.is_some() {
                    "Emergency location saved!"
                } else {
                    "Location saved!"
                };
                events::success(&self.notices, notice);
                Ok(stored)
            }
            Err(e) => {
                warn!(error = %e, "Failed to save location");
                events::error(&self.notices, "Error saving location");
                Err(e)
            }
        }
    }

    /// Remove every location owned by the signed-in wallet. Other users'
    /// reports are untouched. The mirror is pruned only after the server
    /// confirms.
    pub async fn clear(&mut self) -> Result<usize> {
        let session = self.session.as_ref().ok_or(ClientError::NotAuthenticated)?;

        match self.api.clear_locations().await {
            Ok(deleted) => {
                let owner = session.address.clone();
                self.locations.retain(|l| l.wallet_address != owner);
                events::success(&self.notices, "All locations cleared!");
                Ok(deleted)
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear locations");
                events::error(&self.notices, "Error clearing locations");
                Err(e)
            }
        }
    }

    /// Fold a realtime insert into the mirror.
    pub fn ingest(&mut self, location: Location) {
        if !self.locations.contains(&location) {
            self.locations.push(location);
        }
    }
}
