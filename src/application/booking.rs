use super::availability::AvailabilityOracle;
use super::pricing::{LineRequest, compute_cost};
use crate::domain::access::{Capability, Principal};
use crate::domain::equipment::{Equipment, EquipmentId};
use crate::domain::money::Quantity;
use crate::domain::ports::{EquipmentCatalogRef, ReservationStoreRef};
use crate::domain::reservation::{
    RentalPeriod, Reservation, ReservationId, ReservationLine, ReservationLineId,
    ReservationStatus, UserId,
};
use crate::error::{RentalError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{info, warn};

/// A renter's booking request, before any equipment has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub renter_id: UserId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub lines: Vec<LineRequest>,
}

/// Creates reservations: resolves equipment, rejects conflicts, prices the
/// booking and hands header plus lines to the store as one unit.
#[derive(Clone)]
pub struct BookingService {
    catalog: EquipmentCatalogRef,
    reservations: ReservationStoreRef,
    availability: AvailabilityOracle,
}

impl BookingService {
    pub fn new(catalog: EquipmentCatalogRef, reservations: ReservationStoreRef) -> Self {
        let availability = AvailabilityOracle::new(reservations.clone());
        Self {
            catalog,
            reservations,
            availability,
        }
    }

    /// Books every requested line or nothing.
    ///
    /// The store re-checks conflicts inside its own exclusive section, so a
    /// concurrent booking that slips past the pre-check here is still refused.
    pub async fn create_reservation(&self, request: BookingRequest) -> Result<Reservation> {
        let period = RentalPeriod::new(request.start, request.end)?;
        if request.lines.is_empty() {
            return Err(RentalError::Validation(
                "A reservation needs at least one line".to_string(),
            ));
        }
        let quantities = request
            .lines
            .iter()
            .map(|line| Quantity::new(line.quantity))
            .collect::<Result<Vec<_>>>()?;

        // 1. Resolve and snapshot
        let mut snapshots: HashMap<EquipmentId, Equipment> = HashMap::new();
        for line in &request.lines {
            if snapshots.contains_key(&line.equipment_id) {
                continue;
            }
            let equipment = self
                .catalog
                .get_by_id(line.equipment_id)
                .await?
                .ok_or_else(|| {
                    RentalError::NotFound(format!("Equipment {} not found", line.equipment_id))
                })?;
            if !equipment.available {
                return Err(RentalError::Validation(format!(
                    "Equipment {} ({}) is not available for rental",
                    equipment.id, equipment.name
                )));
            }
            snapshots.insert(equipment.id, equipment);
        }

        // 2. Availability
        let requested: Vec<EquipmentId> = request.lines.iter().map(|line| line.equipment_id).collect();
        if let Some(equipment_id) = self.availability.first_conflict(requested, &period).await? {
            warn!(%equipment_id, renter_id = %request.renter_id, "Booking rejected: equipment already reserved");
            return Err(RentalError::Conflict(format!(
                "Equipment {equipment_id} is already reserved between {} and {}",
                period.start(),
                period.end()
            )));
        }

        // 3. Price from the snapshot
        let prices = snapshots
            .iter()
            .map(|(id, equipment)| (*id, equipment.unit_price.value()))
            .collect::<HashMap<_, _>>();
        let total_cost = compute_cost(&request.lines, &prices, period.start(), period.end())?;

        // 4. Header and lines go to the store together
        let reservation_id = ReservationId::new();
        let lines = request
            .lines
            .iter()
            .zip(quantities)
            .map(|(line, quantity)| ReservationLine {
                id: ReservationLineId::new(),
                reservation_id,
                equipment_id: line.equipment_id,
                quantity,
                equipment_name: snapshots[&line.equipment_id].name.clone(),
            })
            .collect();
        let reservation = Reservation {
            id: reservation_id,
            renter_id: request.renter_id,
            period,
            total_cost,
            status: ReservationStatus::Pending,
            lines,
            created_at: Utc::now(),
        };

        self.reservations.insert(reservation.clone()).await?;
        info!(
            %reservation_id,
            renter_id = %reservation.renter_id,
            total_cost = %reservation.total_cost,
            lines = reservation.lines.len(),
            "Reservation created"
        );
        Ok(reservation)
    }

    pub async fn get_reservation(&self, id: ReservationId) -> Result<Reservation> {
        self.reservations
            .get(id)
            .await?
            .ok_or_else(|| RentalError::NotFound(format!("Reservation {id} not found")))
    }

    /// Everything for principals that may view all reservations, otherwise only their own.
    pub async fn list_reservations(&self, principal: &Principal) -> Result<Vec<Reservation>> {
        let mut all = self.all_reservations().await?;
        if !principal.can(Capability::ViewAllReservations) {
            all.retain(|reservation| reservation.renter_id == principal.user_id);
        }
        Ok(all)
    }

    /// Every stored reservation ordered by start, then id. No access scoping;
    /// for trusted callers such as the batch report.
    pub async fn all_reservations(&self) -> Result<Vec<Reservation>> {
        let mut all = self.reservations.get_all().await?;
        all.sort_by(|a, b| {
            a.period
                .start()
                .cmp(&b.period.start())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(all)
    }

    /// Administrative override outside the status lifecycle.
    pub async fn delete_reservation(&self, principal: &Principal, id: ReservationId) -> Result<()> {
        principal.require(Capability::AdministerReservations)?;
        if self.reservations.delete(id).await? {
            warn!(reservation_id = %id, admin_id = %principal.user_id, "Reservation deleted by administrator");
            Ok(())
        } else {
            Err(RentalError::NotFound(format!("Reservation {id} not found")))
        }
    }
}
