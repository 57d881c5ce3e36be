// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use cenerg::application::BalanceService;
use cenerg::config::StoreConfig;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(BalanceService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = StoreConfig::new(format!("sqlite:{}", db_path.display()));
    let service = BalanceService::init(&config).await?;
    Ok((service, temp_dir))
}

/// Test fixture: houses as they are typically provisioned
pub struct StandardHouses;

impl StandardHouses {
    /// House 12 with 50 kWh, house 7 with nothing left
    pub async fn create_basic(service: &BalanceService) -> Result<()> {
        service.create_house(12, 50_000).await?;
        service.create_house(7, 0).await?;
        Ok(())
    }
}

/// Count rows in a table, bypassing the service
pub async fn count_rows(service: &BalanceService, table: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(service.repository().pool())
        .await?;
    Ok(count)
}
