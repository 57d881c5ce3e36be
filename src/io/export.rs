use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::BalanceService;
use crate::domain::{House, HouseId, HouseNumber, RechargeRecord, format_kwh};

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub houses: Vec<House>,
    pub recharges: Vec<RechargeRecord>,
}

/// Exporter for writing ledger data as CSV or JSON
pub struct Exporter<'a> {
    service: &'a BalanceService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a BalanceService) -> Self {
        Self { service }
    }

    /// Export the recharge audit log to CSV
    pub async fn export_recharges_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let house_numbers: HashMap<HouseId, HouseNumber> = self
            .service
            .list_houses()
            .await?
            .into_iter()
            .map(|house| (house.id, house.house_number))
            .collect();
        let recharges = self.service.list_all_recharges().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "house_number", "amount_kwh", "created_at"])?;

        let mut count = 0;
        for recharge in &recharges {
            let house_number = house_numbers
                .get(&recharge.house_id)
                .with_context(|| format!("Recharge {} references unknown house", recharge.id))?;
            csv_writer.write_record([
                recharge.id.to_string(),
                house_number.to_string(),
                format_kwh(recharge.amount_wh),
                recharge.created_at.to_rfc3339(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export current balances to CSV
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let houses = self.service.list_houses().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["house_number", "remaining_energy_kwh", "last_update"])?;

        for house in &houses {
            csv_writer.write_record([
                house.house_number.to_string(),
                format_kwh(house.remaining_energy_wh),
                house.last_update.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(houses.len())
    }

    /// Export houses and the full audit log as one JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            houses: self.service.list_houses().await?,
            recharges: self.service.list_all_recharges().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
