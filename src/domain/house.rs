use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WattHours;

/// Internal row identifier of a house.
pub type HouseId = i64;

/// External identifier callers and meters use to address a house.
pub type HouseNumber = i64;

/// One dwelling's prepaid metering account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct House {
    pub id: HouseId,
    pub house_number: HouseNumber,
    /// Remaining energy in Wh; may go negative through a device-reported update
    pub remaining_energy_wh: WattHours,
    /// Set on every balance mutation
    pub last_update: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl House {
    pub fn is_depleted(&self) -> bool {
        self.remaining_energy_wh <= 0
    }
}
