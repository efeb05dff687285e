//! The emergency-report intake flow.
//!
//! Picking a point on the map opens a form pre-bound to that coordinate.
//! Submission goes through the location store; on failure the form stays
//! open with the coordinate intact so nothing typed is lost.

use beacon_shared::types::{EmergencyInfo, Location, Severity};

use crate::error::{ClientError, Result};
use crate::locations::LocationStore;
use crate::session::Session;

/// Form fields for one emergency report. Severity defaults to medium, as
/// the middle of the scale.
#[derive(Debug, Clone, Default)]
pub struct EmergencyForm {
    pub emergency_type: String,
    pub description: String,
    pub severity: Severity,
    pub people_affected: String,
    pub contact_info: String,
}

impl EmergencyForm {
    pub fn into_info(self) -> EmergencyInfo {
        EmergencyInfo {
            emergency_type: self.emergency_type,
            description: self.description,
            severity: self.severity,
            people_affected: self.people_affected,
            contact_info: self.contact_info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntakeState {
    Closed,
    /// Form is open for the picked coordinate.
    Open { lat: f64, lng: f64 },
    /// Submission in flight; input is locked.
    Submitting { lat: f64, lng: f64 },
}

/// Drives the pick-a-point, fill-the-form, submit sequence.
pub struct IntakeFlow {
    state: IntakeState,
}

impl IntakeFlow {
    pub fn new() -> Self {
        Self {
            state: IntakeState::Closed,
        }
    }

    pub fn state(&self) -> IntakeState {
        self.state
    }

    /// Open the form for a picked coordinate. Requires a session; an
    /// anonymous user cannot start a report.
    pub fn open(&mut self, session: Option<&Session>, lat: f64, lng: f64) -> Result<()> {
        if session.is_none() {
            return Err(ClientError::NotAuthenticated);
        }
        self.state = IntakeState::Open { lat, lng };
        Ok(())
    }

    /// Abandon the form. The picked coordinate is discarded with it.
    pub fn cancel(&mut self) {
        self.state = IntakeState::Closed;
    }

    /// Submit the filled form through the location store. On success the
    /// flow closes; on failure it reopens at the same coordinate.
    pub async fn submit(
        &mut self,
        store: &mut LocationStore,
        form: EmergencyForm,
    ) -> Result<Location> {
        let (lat, lng) = match self.state {
            IntakeState::Open { lat, lng } => (lat, lng),
            _ => return Err(ClientError::NoPendingLocation),
        };
        self.state = IntakeState::Submitting { lat, lng };

        match store.add(lat, lng, Some(form.into_info())).await {
            Ok(stored) => {
                self.state = IntakeState::Closed;
                Ok(stored)
            }
            Err(e) => {
                self.state = IntakeState::Open { lat, lng };
                Err(e)
            }
        }
    }
}

impl Default for IntakeFlow {
    fn default() -> Self {
        Self::new()
    }
}
