use super::equipment::{Equipment, EquipmentId};
use super::money::Money;
use super::payment::{
    ExternalRef, PaymentConfirmation, PaymentId, PaymentInstrument, PaymentRecord,
};
use super::reservation::{RentalPeriod, Reservation, ReservationId, ReservationStatus, UserId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Read-only view of the equipment catalog.
#[async_trait]
pub trait EquipmentCatalog: Send + Sync {
    async fn get_by_id(&self, id: EquipmentId) -> Result<Option<Equipment>>;
}

/// Persistence for reservations and their lines.
///
/// Implementations are the only shared mutation point of the engine and must
/// enforce the overlap invariant themselves: no two confirmed reservations
/// may hold the same equipment over intersecting periods.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// True iff a confirmed reservation holding `equipment_id` overlaps `period`.
    async fn has_confirmed_overlap(
        &self,
        equipment_id: EquipmentId,
        period: &RentalPeriod,
    ) -> Result<bool>;

    /// Persists header and lines as one unit. Nothing is written on error.
    async fn insert(&self, reservation: Reservation) -> Result<()>;

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>>;

    async fn get_all(&self) -> Result<Vec<Reservation>>;

    /// Compare-and-set status change. Moving into a confirmed status fails
    /// with `Conflict` if another confirmed reservation overlaps.
    async fn update_status(
        &self,
        id: ReservationId,
        expected: ReservationStatus,
        next: ReservationStatus,
    ) -> Result<Reservation>;

    /// Administrative removal. Returns false when nothing was stored.
    async fn delete(&self, id: ReservationId) -> Result<bool>;
}

/// Persistence for payment records. Records are never deleted.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Fails with `Conflict` when the reservation already has a record.
    async fn insert(&self, record: PaymentRecord) -> Result<()>;

    /// Replaces an existing record. Fails with `NotFound` otherwise.
    async fn update(&self, record: PaymentRecord) -> Result<()>;

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>>;

    async fn find_by_reservation(&self, id: ReservationId) -> Result<Option<PaymentRecord>>;

    async fn find_by_external_ref(&self, external_ref: &ExternalRef)
    -> Result<Option<PaymentRecord>>;
}

/// External payment gateway. Replies are validated into typed results at
/// the adapter boundary.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Safe to retry: `external_ref` is the idempotency key.
    async fn open_instrument(
        &self,
        external_ref: &ExternalRef,
        channel: &str,
    ) -> Result<PaymentInstrument>;

    /// Must not be retried blindly after an ambiguous failure.
    async fn confirm_payment(
        &self,
        external_ref: &ExternalRef,
        amount: Money,
    ) -> Result<PaymentConfirmation>;
}

/// Fire-and-forget notifications to users.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: UserId, subject: &str, body: &str) -> Result<()>;
}

pub type EquipmentCatalogRef = Arc<dyn EquipmentCatalog>;
pub type ReservationStoreRef = Arc<dyn ReservationStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type NotifierRef = Arc<dyn Notifier>;
