use crate::domain::equipment::EquipmentId;
use crate::domain::ports::ReservationStoreRef;
use crate::domain::reservation::RentalPeriod;
use crate::error::Result;
use chrono::{DateTime, Utc};

/// Answers whether equipment is already held by a confirmed reservation.
///
/// Storage failures propagate unchanged. Callers must treat an error as
/// "not available" and refuse to book.
#[derive(Clone)]
pub struct AvailabilityOracle {
    reservations: ReservationStoreRef,
}

impl AvailabilityOracle {
    pub fn new(reservations: ReservationStoreRef) -> Self {
        Self { reservations }
    }

    /// Returns true iff a PAID or COMPLETED reservation line for `equipment_id`
    /// intersects `[start, end)`. Fails with a validation error unless `start < end`.
    pub async fn has_conflict(
        &self,
        equipment_id: EquipmentId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool> {
        let period = RentalPeriod::new(start, end)?;
        self.has_conflict_in(equipment_id, &period).await
    }

    pub async fn has_conflict_in(
        &self,
        equipment_id: EquipmentId,
        period: &RentalPeriod,
    ) -> Result<bool> {
        self.reservations
            .has_confirmed_overlap(equipment_id, period)
            .await
    }

    /// First equipment id among `equipment` that is already held, if any.
    pub async fn first_conflict<I>(
        &self,
        equipment: I,
        period: &RentalPeriod,
    ) -> Result<Option<EquipmentId>>
    where
        I: IntoIterator<Item = EquipmentId> + Send,
        I::IntoIter: Send,
    {
        for equipment_id in equipment {
            if self.has_conflict_in(equipment_id, period).await? {
                return Ok(Some(equipment_id));
            }
        }
        Ok(None)
    }
}
