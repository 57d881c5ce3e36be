//! Request handlers for the API endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};

use crate::domain::{HouseNumber, kwh_to_wh};

use super::AppState;
use super::error::ApiError;
use super::types::{
    EnergyResponse, EnergyUpdateRequest, EnergyUpdateResponse, HealthResponse, RechargeRequest,
    RechargeResponse,
};

/// `GET /` and `GET /health` → service banner with the endpoint list.
pub async fn health() -> Json<HealthResponse> {
    let endpoints = BTreeMap::from([
        (
            "GET /api/house/{house_number}/energy",
            "Get house remaining energy",
        ),
        (
            "POST /api/house/{house_number}/energy/update",
            "Report remaining energy (meter)",
        ),
        (
            "POST /api/house/{house_number}/energy/recharge",
            "Recharge house energy (owner)",
        ),
    ]);

    Json(HealthResponse {
        message: "CenErg API is running",
        endpoints,
    })
}

/// `GET /api/house/{house_number}/energy` → 200 + `EnergyResponse`, 404 if unknown.
pub async fn get_energy(
    State(state): State<Arc<AppState>>,
    Path(house_number): Path<String>,
) -> Result<Json<EnergyResponse>, ApiError> {
    let house_number = parse_house_number(&house_number)?;
    let balance = state.service.get_balance(house_number).await?;
    Ok(Json(balance.into()))
}

/// `POST /api/house/{house_number}/energy/update` with `{remaining_energy}`.
/// Replaces the balance with the device-reported value.
pub async fn update_energy(
    State(state): State<Arc<AppState>>,
    Path(house_number): Path<String>,
    body: Result<Json<EnergyUpdateRequest>, JsonRejection>,
) -> Result<Json<EnergyUpdateResponse>, ApiError> {
    let house_number = parse_house_number(&house_number)?;
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let remaining_energy_wh = kwh_to_wh(request.remaining_energy)
        .map_err(|e| ApiError::BadRequest(format!("remaining_energy: {e}")))?;

    let update = state
        .service
        .apply_consumption_update(house_number, remaining_energy_wh)
        .await?;
    Ok(Json(update.into()))
}

/// `POST /api/house/{house_number}/energy/recharge` with `{amount}`.
/// Adds to the balance and records the recharge in one transaction.
pub async fn recharge_energy(
    State(state): State<Arc<AppState>>,
    Path(house_number): Path<String>,
    body: Result<Json<RechargeRequest>, JsonRejection>,
) -> Result<Json<RechargeResponse>, ApiError> {
    let house_number = parse_house_number(&house_number)?;
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let amount_wh =
        kwh_to_wh(request.amount).map_err(|e| ApiError::BadRequest(format!("amount: {e}")))?;

    let receipt = state.service.apply_recharge(house_number, amount_wh).await?;
    Ok(Json(receipt.into()))
}

/// House numbers are integers; anything else cannot match a house.
fn parse_house_number(raw: &str) -> Result<HouseNumber, ApiError> {
    raw.trim()
        .parse::<HouseNumber>()
        .map_err(|_| ApiError::UnknownHouse(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_house_numbers() {
        assert_eq!(parse_house_number("12").unwrap(), 12);
        assert!(matches!(
            parse_house_number("twelve"),
            Err(ApiError::UnknownHouse(_))
        ));
        assert!(matches!(
            parse_house_number("1.5"),
            Err(ApiError::UnknownHouse(_))
        ));
    }
}
