use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{HouseId, WattHours};

pub type RechargeId = Uuid;

/// Audit entry for one recharge. Records are append-only: never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RechargeRecord {
    pub id: RechargeId,
    pub house_id: HouseId,
    /// Energy added in Wh (always positive)
    pub amount_wh: WattHours,
    pub created_at: DateTime<Utc>,
}

impl RechargeRecord {
    pub fn new(house_id: HouseId, amount_wh: WattHours, created_at: DateTime<Utc>) -> Self {
        assert!(amount_wh > 0, "Recharge amount must be positive");
        Self {
            id: Uuid::new_v4(),
            house_id,
            amount_wh,
            created_at,
        }
    }
}
