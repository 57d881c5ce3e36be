use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::domain::{House, HouseNumber, RechargeRecord, WattHours, format_kwh};
use crate::storage::{LedgerTx, Repository};

use super::AppError;

/// Application service providing the balance operations on the house ledger.
/// This is the primary interface for any client (HTTP API, CLI).
#[derive(Clone)]
pub struct BalanceService {
    repo: Repository,
}

/// Current balance of a house
#[derive(Debug, Clone)]
pub struct EnergyBalance {
    pub house_number: HouseNumber,
    pub remaining_energy_wh: WattHours,
}

/// Result of a device-reported consumption update
#[derive(Debug, Clone)]
pub struct EnergyUpdate {
    pub house_number: HouseNumber,
    pub remaining_energy_wh: WattHours,
    pub last_update: DateTime<Utc>,
}

/// Result of a committed recharge
#[derive(Debug, Clone)]
pub struct RechargeReceipt {
    pub house_number: HouseNumber,
    /// Cumulative balance after the recharge
    pub remaining_energy_wh: WattHours,
    pub recharged_wh: WattHours,
    pub last_update: DateTime<Utc>,
    pub record: RechargeRecord,
}

/// Detailed house information
pub struct HouseInfo {
    pub house: House,
    pub recharges: Vec<RechargeRecord>,
}

impl BalanceService {
    /// Create a new balance service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Connect to the store and apply migrations.
    pub async fn init(config: &StoreConfig) -> Result<Self, AppError> {
        let repo = Repository::init(config).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing store.
    pub async fn connect(config: &StoreConfig) -> Result<Self, AppError> {
        let repo = Repository::connect(config).await?;
        Ok(Self::new(repo))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Close the underlying pool once in-flight work has returned its connections.
    pub async fn close(&self) {
        self.repo.close().await;
    }

    // ========================
    // Provisioning
    // ========================

    /// Provision a new house with an initial balance.
    pub async fn create_house(
        &self,
        house_number: HouseNumber,
        initial_energy_wh: WattHours,
    ) -> Result<House, AppError> {
        let house = self
            .repo
            .insert_house(house_number, initial_energy_wh, Utc::now())
            .await?
            .ok_or(AppError::HouseAlreadyExists(house_number))?;
        info!(
            house_number,
            remaining_energy = %format_kwh(house.remaining_energy_wh),
            "house provisioned"
        );
        Ok(house)
    }

    /// Get a house by number.
    pub async fn get_house(&self, house_number: HouseNumber) -> Result<House, AppError> {
        self.repo
            .get_house_by_number(house_number)
            .await?
            .ok_or(AppError::HouseNotFound(house_number))
    }

    /// Get a house together with its recharge history.
    pub async fn get_house_info(&self, house_number: HouseNumber) -> Result<HouseInfo, AppError> {
        let house = self.get_house(house_number).await?;
        let recharges = self.repo.list_recharges_for_house(house.id).await?;
        Ok(HouseInfo { house, recharges })
    }

    /// List all houses.
    pub async fn list_houses(&self) -> Result<Vec<House>, AppError> {
        Ok(self.repo.list_houses().await?)
    }

    // ========================
    // Balance operations
    // ========================

    /// Read the remaining energy of a house.
    pub async fn get_balance(&self, house_number: HouseNumber) -> Result<EnergyBalance, AppError> {
        let house = self.get_house(house_number).await?;
        Ok(EnergyBalance {
            house_number: house.house_number,
            remaining_energy_wh: house.remaining_energy_wh,
        })
    }

    /// Replace a house's remaining energy with a device-reported value.
    ///
    /// This is an absolute overwrite, not a delta. The value is not bounds-checked:
    /// the metering device is trusted to report its own balance.
    pub async fn apply_consumption_update(
        &self,
        house_number: HouseNumber,
        remaining_energy_wh: WattHours,
    ) -> Result<EnergyUpdate, AppError> {
        let house = self
            .repo
            .set_remaining_energy(house_number, remaining_energy_wh, Utc::now())
            .await?
            .ok_or(AppError::HouseNotFound(house_number))?;

        debug!(
            house_number,
            remaining_energy = %format_kwh(house.remaining_energy_wh),
            "consumption update applied"
        );
        Ok(EnergyUpdate {
            house_number: house.house_number,
            remaining_energy_wh: house.remaining_energy_wh,
            last_update: house.last_update,
        })
    }

    /// Add `amount_wh` to a house's balance and append an audit record, atomically.
    ///
    /// Both writes share one transaction: either both are committed or neither is.
    /// A missing house rolls back and returns `HouseNotFound`; any store error
    /// rolls back and returns `TransactionFailed`.
    pub async fn apply_recharge(
        &self,
        house_number: HouseNumber,
        amount_wh: WattHours,
    ) -> Result<RechargeReceipt, AppError> {
        if amount_wh <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let mut tx = self.repo.begin().await.map_err(AppError::TransactionFailed)?;

        match Self::recharge_in(&mut *tx, house_number, amount_wh, Utc::now()).await {
            Ok(Some((house, record))) => {
                tx.commit()
                    .await
                    .context("Failed to commit recharge")
                    .map_err(AppError::TransactionFailed)?;

                info!(
                    house_number,
                    recharged = %format_kwh(amount_wh),
                    remaining_energy = %format_kwh(house.remaining_energy_wh),
                    recharge_id = %record.id,
                    "recharge committed"
                );
                Ok(RechargeReceipt {
                    house_number: house.house_number,
                    remaining_energy_wh: house.remaining_energy_wh,
                    recharged_wh: amount_wh,
                    last_update: house.last_update,
                    record,
                })
            }
            Ok(None) => {
                rollback(tx, house_number).await;
                Err(AppError::HouseNotFound(house_number))
            }
            Err(e) => {
                warn!(house_number, error = %format!("{e:#}"), "recharge failed, rolling back");
                rollback(tx, house_number).await;
                Err(AppError::TransactionFailed(e))
            }
        }
    }

    /// The statements of a recharge, run on the transaction's connection.
    async fn recharge_in(
        conn: &mut SqliteConnection,
        house_number: HouseNumber,
        amount_wh: WattHours,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<(House, RechargeRecord)>> {
        let Some(house) =
            Repository::increment_remaining_energy(conn, house_number, amount_wh, now).await?
        else {
            return Ok(None);
        };

        let record = RechargeRecord::new(house.id, amount_wh, now);
        Repository::insert_recharge(conn, &record).await?;
        Ok(Some((house, record)))
    }

    // ========================
    // Audit log
    // ========================

    /// List the recharge history of a house, oldest first.
    pub async fn list_recharges(
        &self,
        house_number: HouseNumber,
    ) -> Result<Vec<RechargeRecord>, AppError> {
        let house = self.get_house(house_number).await?;
        Ok(self.repo.list_recharges_for_house(house.id).await?)
    }

    /// Count the recharge records of a house.
    pub async fn count_recharges(&self, house_number: HouseNumber) -> Result<i64, AppError> {
        let house = self.get_house(house_number).await?;
        Ok(self.repo.count_recharges_for_house(house.id).await?)
    }

    /// List every recharge in the audit log.
    pub async fn list_all_recharges(&self) -> Result<Vec<RechargeRecord>, AppError> {
        Ok(self.repo.list_recharges().await?)
    }
}

async fn rollback(tx: LedgerTx, house_number: HouseNumber) {
    if let Err(e) = tx.rollback().await {
        // The connection is discarded by the pool; the store never saw a commit.
        warn!(house_number, error = %e, "rollback failed");
    }
}
