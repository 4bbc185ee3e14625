use crate::domain::equipment::{Equipment, EquipmentId};
use crate::domain::payment::{ExternalRef, PaymentId, PaymentRecord};
use crate::domain::ports::{EquipmentCatalog, PaymentStore, ReservationStore};
use crate::domain::reservation::{RentalPeriod, Reservation, ReservationId, ReservationStatus};
use crate::error::{RentalError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory equipment catalog.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    items: Arc<RwLock<HashMap<EquipmentId, Equipment>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = Equipment>) -> Self {
        let items = items.into_iter().map(|e| (e.id, e)).collect();
        Self {
            items: Arc::new(RwLock::new(items)),
        }
    }

    /// Adds or replaces a catalog entry. Existing reservations keep their snapshots.
    pub async fn upsert(&self, equipment: Equipment) {
        self.items.write().await.insert(equipment.id, equipment);
    }
}

#[async_trait]
impl EquipmentCatalog for InMemoryCatalog {
    async fn get_by_id(&self, id: EquipmentId) -> Result<Option<Equipment>> {
        Ok(self.items.read().await.get(&id).cloned())
    }
}

/// A thread-safe in-memory reservation store.
///
/// Every mutation runs under the single write guard, so the conflict
/// re-check and the write it protects are serialized against all other
/// writers.
#[derive(Default, Clone)]
pub struct InMemoryReservationStore {
    reservations: Arc<RwLock<HashMap<ReservationId, Reservation>>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn confirmed_overlap<'a>(
    mut existing: impl Iterator<Item = &'a Reservation>,
    equipment_id: EquipmentId,
    period: &RentalPeriod,
) -> bool {
    existing.any(|r| {
        r.status.is_confirmed()
            && r.period.overlaps(period)
            && r.equipment_ids().any(|id| id == equipment_id)
    })
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn has_confirmed_overlap(
        &self,
        equipment_id: EquipmentId,
        period: &RentalPeriod,
    ) -> Result<bool> {
        let reservations = self.reservations.read().await;
        Ok(confirmed_overlap(reservations.values(), equipment_id, period))
    }

    async fn insert(&self, reservation: Reservation) -> Result<()> {
        let mut reservations = self.reservations.write().await;
        if reservations.contains_key(&reservation.id) {
            return Err(RentalError::Conflict(format!(
                "Reservation {} already exists",
                reservation.id
            )));
        }
        for equipment_id in reservation.equipment_ids() {
            if confirmed_overlap(reservations.values(), equipment_id, &reservation.period) {
                return Err(RentalError::Conflict(format!(
                    "Equipment {equipment_id} is already reserved for an overlapping period"
                )));
            }
        }
        reservations.insert(reservation.id, reservation);
        Ok(())
    }

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.reservations.read().await.get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Reservation>> {
        Ok(self.reservations.read().await.values().cloned().collect())
    }

    async fn update_status(
        &self,
        id: ReservationId,
        expected: ReservationStatus,
        next: ReservationStatus,
    ) -> Result<Reservation> {
        let mut reservations = self.reservations.write().await;
        let current = reservations
            .get(&id)
            .ok_or_else(|| RentalError::NotFound(format!("Reservation {id} not found")))?;
        if current.status != expected {
            return Err(RentalError::Conflict(format!(
                "Reservation {id} is {} but {expected} was expected",
                current.status
            )));
        }
        if next.is_confirmed() && !current.status.is_confirmed() {
            let collides = reservations
                .values()
                .any(|other| other.status.is_confirmed() && current.collides_with(other));
            if collides {
                return Err(RentalError::Conflict(format!(
                    "Reservation {id} overlaps a confirmed reservation"
                )));
            }
        }

        let mut updated = current.clone();
        updated.transition(next)?;
        reservations.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: ReservationId) -> Result<bool> {
        Ok(self.reservations.write().await.remove(&id).is_some())
    }
}

#[derive(Default)]
struct PaymentTables {
    records: HashMap<PaymentId, PaymentRecord>,
    by_reservation: HashMap<ReservationId, PaymentId>,
}

/// A thread-safe in-memory payment store enforcing one record per reservation.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    tables: Arc<RwLock<PaymentTables>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, record: PaymentRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.by_reservation.get(&record.reservation_id) {
            return Err(RentalError::Conflict(format!(
                "Reservation {} already has payment {existing}",
                record.reservation_id
            )));
        }
        if tables.records.contains_key(&record.id) {
            return Err(RentalError::Conflict(format!(
                "Payment {} already exists",
                record.id
            )));
        }
        tables.by_reservation.insert(record.reservation_id, record.id);
        tables.records.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, record: PaymentRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.records.get_mut(&record.id) {
            Some(slot) if slot.reservation_id == record.reservation_id => {
                *slot = record;
                Ok(())
            }
            Some(_) => Err(RentalError::Conflict(format!(
                "Payment {} cannot be moved to another reservation",
                record.id
            ))),
            None => Err(RentalError::NotFound(format!(
                "Payment {} not found",
                record.id
            ))),
        }
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>> {
        Ok(self.tables.read().await.records.get(&id).cloned())
    }

    async fn find_by_reservation(&self, id: ReservationId) -> Result<Option<PaymentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_reservation
            .get(&id)
            .and_then(|payment_id| tables.records.get(payment_id))
            .cloned())
    }

    async fn find_by_external_ref(
        &self,
        external_ref: &ExternalRef,
    ) -> Result<Option<PaymentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .values()
            .find(|record| &record.external_ref == external_ref)
            .cloned())
    }
}
