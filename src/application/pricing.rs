use crate::domain::equipment::EquipmentId;
use crate::domain::money::{Money, Quantity, UnitPrice};
use crate::domain::reservation::RentalPeriod;
use crate::error::{RentalError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Requested quantity of one piece of equipment, as received from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    pub equipment_id: EquipmentId,
    pub quantity: u32,
}

/// Total price of a booking.
///
/// `total = Σ quantity × unit_price × days`, where `days` is the elapsed time
/// in hours divided by 24 with no rounding. Bad quantities or prices are
/// rejected before anything is persisted.
pub fn compute_cost(
    lines: &[LineRequest],
    prices: &HashMap<EquipmentId, Decimal>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Money> {
    let period = RentalPeriod::new(start, end)?;
    let days = period.duration_in_days();

    let mut total = Decimal::ZERO;
    for line in lines {
        let quantity = Quantity::new(line.quantity)?;
        let price = prices.get(&line.equipment_id).copied().ok_or_else(|| {
            RentalError::Validation(format!("No price known for equipment {}", line.equipment_id))
        })?;
        let price = UnitPrice::new(price)?;
        total = Decimal::from(quantity.value())
            .checked_mul(price.value())
            .and_then(|cost| cost.checked_mul(days))
            .and_then(|cost| total.checked_add(cost))
            .ok_or_else(|| {
                RentalError::Validation(format!(
                    "cost overflow pricing {} x {} of equipment {}",
                    quantity.value(),
                    price.value(),
                    line.equipment_id
                ))
            })?;
    }

    Money::new(total)
}
