use std::fmt;

/// Energy is stored as integer watt-hours so the store can add to it exactly.
/// On the wire and in the CLI it is expressed in kWh: 1 kWh = 1000 Wh, so 50.5 kWh = 50500 Wh.
pub type WattHours = i64;

pub const WH_PER_KWH: i64 = 1000;

/// Largest magnitude (in Wh) that survives a round trip through an f64 unchanged.
const MAX_SAFE_WH: f64 = 9_007_199_254_740_991.0;

/// Convert watt-hours to a kWh number for JSON responses.
pub fn wh_to_kwh(wh: WattHours) -> f64 {
    wh as f64 / WH_PER_KWH as f64
}

/// Convert a kWh number from a JSON body into watt-hours.
/// The value must be a whole number of Wh (at most three decimals in kWh).
pub fn kwh_to_wh(kwh: f64) -> Result<WattHours, ParseEnergyError> {
    if !kwh.is_finite() {
        return Err(ParseEnergyError::NotFinite);
    }
    let scaled = kwh * WH_PER_KWH as f64;
    let wh = scaled.round();
    if wh.abs() > MAX_SAFE_WH {
        return Err(ParseEnergyError::OutOfRange);
    }
    // Tolerates the representation error of decimals like 12.345
    let tolerance = (scaled.abs() * f64::EPSILON * 4.0).max(1e-6);
    if (scaled - wh).abs() > tolerance {
        return Err(ParseEnergyError::TooPrecise);
    }
    Ok(wh as WattHours)
}

/// Format watt-hours as a kWh string with three decimals.
/// Example: 75500 -> "75.500", -1 -> "-0.001"
pub fn format_kwh(wh: WattHours) -> String {
    let sign = if wh < 0 { "-" } else { "" };
    let abs_wh = wh.abs();
    format!(
        "{}{}.{:03}",
        sign,
        abs_wh / WH_PER_KWH,
        abs_wh % WH_PER_KWH
    )
}

/// Parse a decimal kWh string into watt-hours.
/// Example: "25.5" -> 25500, "10" -> 10000, "0.0015" -> TooPrecise
pub fn parse_kwh(input: &str) -> Result<WattHours, ParseEnergyError> {
    let input = input.trim();
    let (negative, input) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };
    if units_str.is_empty() && decimal_str.is_empty() {
        return Err(ParseEnergyError::InvalidFormat);
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !decimal_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseEnergyError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseEnergyError::InvalidFormat)?
    };

    // Trailing zeros past the Wh digit carry no precision
    let digits = decimal_str.trim_end_matches('0');
    if digits.len() > 3 {
        return Err(ParseEnergyError::TooPrecise);
    }
    let fraction: i64 = if digits.is_empty() {
        0
    } else {
        // Right-pad so "5" means 500 Wh
        format!("{:0<3}", digits)
            .parse()
            .map_err(|_| ParseEnergyError::InvalidFormat)?
    };

    let wh = units
        .checked_mul(WH_PER_KWH)
        .and_then(|wh| wh.checked_add(fraction))
        .ok_or(ParseEnergyError::OutOfRange)?;
    Ok(if negative { -wh } else { wh })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEnergyError {
    InvalidFormat,
    NotFinite,
    OutOfRange,
    TooPrecise,
}

impl fmt::Display for ParseEnergyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseEnergyError::InvalidFormat => write!(f, "invalid energy format"),
            ParseEnergyError::NotFinite => write!(f, "energy must be a finite number"),
            ParseEnergyError::OutOfRange => write!(f, "energy value out of range"),
            ParseEnergyError::TooPrecise => {
                write!(f, "energy has more than 3 decimals (1 Wh resolution)")
            }
        }
    }
}

impl std::error::Error for ParseEnergyError {}
