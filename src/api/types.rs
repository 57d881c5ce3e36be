//! Request and response bodies.
//!
//! Field names are kept byte-compatible with the metering devices already in the field.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::application::{EnergyBalance, EnergyUpdate, RechargeReceipt};
use crate::domain::{HouseNumber, wh_to_kwh};

/// `POST /api/house/{house_number}/energy/update` body.
#[derive(Debug, Deserialize)]
pub struct EnergyUpdateRequest {
    /// New absolute balance in kWh
    #[serde(deserialize_with = "deserialize_kwh")]
    pub remaining_energy: f64,
}

/// `POST /api/house/{house_number}/energy/recharge` body.
#[derive(Debug, Deserialize)]
pub struct RechargeRequest {
    /// Energy to add in kWh
    #[serde(deserialize_with = "deserialize_kwh")]
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct EnergyResponse {
    pub house_number: HouseNumber,
    pub remaining_energy: f64,
}

impl From<EnergyBalance> for EnergyResponse {
    fn from(balance: EnergyBalance) -> Self {
        Self {
            house_number: balance.house_number,
            remaining_energy: wh_to_kwh(balance.remaining_energy_wh),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnergyUpdateResponse {
    pub house_number: HouseNumber,
    pub remaining_energy: f64,
    pub last_update: DateTime<Utc>,
}

impl From<EnergyUpdate> for EnergyUpdateResponse {
    fn from(update: EnergyUpdate) -> Self {
        Self {
            house_number: update.house_number,
            remaining_energy: wh_to_kwh(update.remaining_energy_wh),
            last_update: update.last_update,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RechargeResponse {
    pub house_number: HouseNumber,
    pub remaining_energy: f64,
    pub recharged_amount: f64,
    pub last_update: DateTime<Utc>,
}

impl From<RechargeReceipt> for RechargeResponse {
    fn from(receipt: RechargeReceipt) -> Self {
        Self {
            house_number: receipt.house_number,
            remaining_energy: wh_to_kwh(receipt.remaining_energy_wh),
            recharged_amount: wh_to_kwh(receipt.recharged_wh),
            last_update: receipt.last_update,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

/// Devices send either a JSON number or a numeric string.
fn deserialize_kwh<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(value) => Ok(value),
        NumberOrText::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("`{text}` is not a number"))),
    }
}
