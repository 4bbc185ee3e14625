use crate::config::StorageConfig;
use crate::domain::equipment::EquipmentId;
use crate::domain::money::Money;
use crate::domain::payment::{ExternalRef, PaymentId, PaymentRecord};
use crate::domain::ports::{PaymentStore, ReservationStore};
use crate::domain::reservation::{
    RentalPeriod, Reservation, ReservationId, ReservationLine, ReservationStatus, UserId,
};
use crate::error::{RentalError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for reservation headers.
pub const CF_RESERVATIONS: &str = "reservations";
/// Column Family for reservation lines, keyed by reservation id + position.
pub const CF_RESERVATION_LINES: &str = "reservation_lines";
/// Column Family for payment records.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping a reservation id to its payment id.
pub const CF_PAYMENTS_BY_RESERVATION: &str = "payments_by_reservation";

const COLUMN_FAMILIES: [&str; 4] = [
    CF_RESERVATIONS,
    CF_RESERVATION_LINES,
    CF_PAYMENTS,
    CF_PAYMENTS_BY_RESERVATION,
];

/// Header row. Lines live in their own column family.
#[derive(Serialize, Deserialize)]
struct StoredReservation {
    id: ReservationId,
    renter_id: UserId,
    period: RentalPeriod,
    total_cost: Money,
    status: ReservationStatus,
    created_at: DateTime<Utc>,
}

impl StoredReservation {
    fn from_reservation(reservation: &Reservation) -> Self {
        Self {
            id: reservation.id,
            renter_id: reservation.renter_id,
            period: reservation.period,
            total_cost: reservation.total_cost,
            status: reservation.status,
            created_at: reservation.created_at,
        }
    }

    fn with_lines(self, lines: Vec<ReservationLine>) -> Reservation {
        Reservation {
            id: self.id,
            renter_id: self.renter_id,
            period: self.period,
            total_cost: self.total_cost,
            status: self.status,
            lines,
            created_at: self.created_at,
        }
    }
}

fn line_key(reservation_id: ReservationId, position: u32) -> Vec<u8> {
    let mut key = reservation_id.0.as_bytes().to_vec();
    key.extend_from_slice(&position.to_be_bytes());
    key
}

/// A persistent store implementation using RocksDB.
///
/// Reservations, lines and payments live in separate column families whose
/// names are prefixed with the configured namespace. Multi-row writes go
/// through a single `WriteBatch`; writes that must re-check an invariant also
/// hold the store-wide write lock, which makes check and commit one step.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    namespace: String,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path in the default namespace.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_namespace(path, &StorageConfig::default().namespace)
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let path = config
            .db_path
            .as_ref()
            .ok_or_else(|| RentalError::persistence("No database path configured"))?;
        Self::open_with_namespace(path, &config.namespace)
    }

    /// Ensures every namespaced column family exists.
    pub fn open_with_namespace<P: AsRef<Path>>(path: P, namespace: &str) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(format!("{namespace}.{name}"), Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            namespace: namespace.to_string(),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(&format!("{}.{name}", self.namespace))
            .ok_or_else(|| RentalError::persistence(format!("{name} column family not found")))
    }

    fn read_header(&self, id: ReservationId) -> Result<Option<StoredReservation>> {
        let cf = self.cf(CF_RESERVATIONS)?;
        match self.db.get_pinned_cf(cf, id.0.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_headers(&self) -> Result<Vec<StoredReservation>> {
        let cf = self.cf(CF_RESERVATIONS)?;
        let mut headers = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            headers.push(serde_json::from_slice(&value)?);
        }
        Ok(headers)
    }

    fn line_keys(&self, id: ReservationId) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf(CF_RESERVATION_LINES)?;
        let prefix = id.0.as_bytes();
        let mut keys = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, _value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key);
        }
        Ok(keys)
    }

    fn read_lines(&self, id: ReservationId) -> Result<Vec<ReservationLine>> {
        let cf = self.cf(CF_RESERVATION_LINES)?;
        let prefix = id.0.as_bytes();
        let mut lines = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            lines.push(serde_json::from_slice(&value)?);
        }
        Ok(lines)
    }

    fn read_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        match self.read_header(id)? {
            Some(header) => {
                let lines = self.read_lines(id)?;
                Ok(Some(header.with_lines(lines)))
            }
            None => Ok(None),
        }
    }

    fn confirmed_overlap(
        &self,
        equipment_id: EquipmentId,
        period: &RentalPeriod,
        exclude: Option<ReservationId>,
    ) -> Result<bool> {
        for header in self.read_headers()? {
            if Some(header.id) == exclude
                || !header.status.is_confirmed()
                || !header.period.overlaps(period)
            {
                continue;
            }
            if self
                .read_lines(header.id)?
                .iter()
                .any(|line| line.equipment_id == equipment_id)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_payment(&self, id: PaymentId) -> Result<Option<PaymentRecord>> {
        let cf = self.cf(CF_PAYMENTS)?;
        match self.db.get_pinned_cf(cf, id.0.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn payment_id_for(&self, reservation_id: ReservationId) -> Result<Option<PaymentId>> {
        let cf = self.cf(CF_PAYMENTS_BY_RESERVATION)?;
        match self.db.get_pinned_cf(cf, reservation_id.0.as_bytes())? {
            Some(bytes) => {
                let uuid = uuid::Uuid::from_slice(&bytes)
                    .map_err(|e| RentalError::persistence(format!("Corrupt payment index: {e}")))?;
                Ok(Some(PaymentId(uuid)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ReservationStore for RocksDBStore {
    async fn has_confirmed_overlap(
        &self,
        equipment_id: EquipmentId,
        period: &RentalPeriod,
    ) -> Result<bool> {
        self.confirmed_overlap(equipment_id, period, None)
    }

    async fn insert(&self, reservation: Reservation) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if self.read_header(reservation.id)?.is_some() {
            return Err(RentalError::Conflict(format!(
                "Reservation {} already exists",
                reservation.id
            )));
        }
        for equipment_id in reservation.equipment_ids() {
            if self.confirmed_overlap(equipment_id, &reservation.period, None)? {
                return Err(RentalError::Conflict(format!(
                    "Equipment {equipment_id} is already reserved for an overlapping period"
                )));
            }
        }

        let headers = self.cf(CF_RESERVATIONS)?;
        let lines = self.cf(CF_RESERVATION_LINES)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(
            headers,
            reservation.id.0.as_bytes(),
            serde_json::to_vec(&StoredReservation::from_reservation(&reservation))?,
        );
        for (position, line) in (0u32..).zip(&reservation.lines) {
            batch.put_cf(
                lines,
                line_key(reservation.id, position),
                serde_json::to_vec(line)?,
            );
        }
        self.db.write(batch)?;

        Ok(())
    }

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>> {
        self.read_reservation(id)
    }

    async fn get_all(&self) -> Result<Vec<Reservation>> {
        self.read_headers()?
            .into_iter()
            .map(|header| {
                let lines = self.read_lines(header.id)?;
                Ok(header.with_lines(lines))
            })
            .collect()
    }

    async fn update_status(
        &self,
        id: ReservationId,
        expected: ReservationStatus,
        next: ReservationStatus,
    ) -> Result<Reservation> {
        let _guard = self.write_lock.lock().await;

        let mut reservation = self
            .read_reservation(id)?
            .ok_or_else(|| RentalError::NotFound(format!("Reservation {id} not found")))?;
        if reservation.status != expected {
            return Err(RentalError::Conflict(format!(
                "Reservation {id} is {} but {expected} was expected",
                reservation.status
            )));
        }
        if next.is_confirmed() && !reservation.status.is_confirmed() {
            for equipment_id in reservation.equipment_ids() {
                if self.confirmed_overlap(equipment_id, &reservation.period, Some(id))? {
                    return Err(RentalError::Conflict(format!(
                        "Reservation {id} overlaps a confirmed reservation"
                    )));
                }
            }
        }

        reservation.transition(next)?;
        let cf = self.cf(CF_RESERVATIONS)?;
        self.db.put_cf(
            cf,
            id.0.as_bytes(),
            serde_json::to_vec(&StoredReservation::from_reservation(&reservation))?,
        )?;
        Ok(reservation)
    }

    async fn delete(&self, id: ReservationId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        if self.read_header(id)?.is_none() {
            return Ok(false);
        }
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_RESERVATIONS)?, id.0.as_bytes());
        let lines = self.cf(CF_RESERVATION_LINES)?;
        for key in self.line_keys(id)? {
            batch.delete_cf(lines, key);
        }
        self.db.write(batch)?;
        Ok(true)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, record: PaymentRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.payment_id_for(record.reservation_id)? {
            return Err(RentalError::Conflict(format!(
                "Reservation {} already has payment {existing}",
                record.reservation_id
            )));
        }
        if self.read_payment(record.id)?.is_some() {
            return Err(RentalError::Conflict(format!(
                "Payment {} already exists",
                record.id
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_PAYMENTS)?,
            record.id.0.as_bytes(),
            serde_json::to_vec(&record)?,
        );
        batch.put_cf(
            self.cf(CF_PAYMENTS_BY_RESERVATION)?,
            record.reservation_id.0.as_bytes(),
            record.id.0.as_bytes(),
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn update(&self, record: PaymentRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let existing = self
            .read_payment(record.id)?
            .ok_or_else(|| RentalError::NotFound(format!("Payment {} not found", record.id)))?;
        if existing.reservation_id != record.reservation_id {
            return Err(RentalError::Conflict(format!(
                "Payment {} cannot be moved to another reservation",
                record.id
            )));
        }
        self.db.put_cf(
            self.cf(CF_PAYMENTS)?,
            record.id.0.as_bytes(),
            serde_json::to_vec(&record)?,
        )?;
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<PaymentRecord>> {
        self.read_payment(id)
    }

    async fn find_by_reservation(&self, id: ReservationId) -> Result<Option<PaymentRecord>> {
        match self.payment_id_for(id)? {
            Some(payment_id) => self.read_payment(payment_id),
            None => Ok(None),
        }
    }

    async fn find_by_external_ref(
        &self,
        external_ref: &ExternalRef,
    ) -> Result<Option<PaymentRecord>> {
        let cf = self.cf(CF_PAYMENTS)?;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let record: PaymentRecord = serde_json::from_slice(&value)?;
            if &record.external_ref == external_ref {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Quantity;
    use crate::domain::payment::{PaymentMethod, PaymentStatus};
    use crate::domain::reservation::ReservationLineId;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn reservation(equipment: &[EquipmentId], start: u32, end: u32, status: ReservationStatus) -> Reservation {
        let id = ReservationId::new();
        Reservation {
            id,
            renter_id: UserId::new(),
            period: RentalPeriod::new(day(start), day(end)).unwrap(),
            total_cost: Money::new(dec!(75.5)).unwrap(),
            status,
            lines: equipment
                .iter()
                .enumerate()
                .map(|(i, equipment_id)| ReservationLine {
                    id: ReservationLineId::new(),
                    reservation_id: id,
                    equipment_id: *equipment_id,
                    quantity: Quantity::new(i as u32 + 1).unwrap(),
                    equipment_name: format!("item-{i}"),
                })
                .collect(),
            created_at: day(1),
        }
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open_with_namespace(dir.path(), "rentals").expect("Failed to open RocksDB");

        for name in COLUMN_FAMILIES {
            assert!(store.db.cf_handle(&format!("rentals.{name}")).is_some());
        }
        assert!(store.db.cf_handle(CF_RESERVATIONS).is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_reservation_round_trip_keeps_line_order() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let equipment: Vec<EquipmentId> = (0..12).map(|_| EquipmentId::new()).collect();
        let r = reservation(&equipment, 1, 3, ReservationStatus::Pending);

        ReservationStore::insert(&store, r.clone()).await.unwrap();
        let loaded = ReservationStore::get(&store, r.id).await.unwrap().unwrap();
        assert_eq!(loaded, r);
        assert_eq!(ReservationStore::get_all(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rocksdb_overlap_and_status() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let tent = EquipmentId::new();

        let first = reservation(&[tent], 1, 5, ReservationStatus::Pending);
        let second = reservation(&[tent], 4, 8, ReservationStatus::Pending);
        ReservationStore::insert(&store, first.clone()).await.unwrap();
        ReservationStore::insert(&store, second.clone()).await.unwrap();

        let period = RentalPeriod::new(day(2), day(3)).unwrap();
        assert!(!store.has_confirmed_overlap(tent, &period).await.unwrap());

        store
            .update_status(first.id, ReservationStatus::Pending, ReservationStatus::Completed)
            .await
            .unwrap();
        assert!(store.has_confirmed_overlap(tent, &period).await.unwrap());

        let result = store
            .update_status(second.id, ReservationStatus::Pending, ReservationStatus::Completed)
            .await;
        assert!(matches!(result, Err(RentalError::Conflict(_))));

        let late = reservation(&[tent], 3, 4, ReservationStatus::Pending);
        assert!(matches!(
            ReservationStore::insert(&store, late).await,
            Err(RentalError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_rocksdb_delete_removes_lines() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let r = reservation(&[EquipmentId::new(), EquipmentId::new()], 1, 2, ReservationStatus::Pending);
        ReservationStore::insert(&store, r.clone()).await.unwrap();

        assert!(store.delete(r.id).await.unwrap());
        assert!(ReservationStore::get(&store, r.id).await.unwrap().is_none());
        assert!(store.line_keys(r.id).unwrap().is_empty());
        assert!(!store.delete(r.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_rocksdb_payment_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let reservation_id = ReservationId::new();
        let mut record = PaymentRecord {
            id: PaymentId::new(),
            reservation_id,
            payer_id: UserId::new(),
            amount: Money::new(dec!(200)).unwrap(),
            method: PaymentMethod::VirtualAccount,
            channel: "BCA".to_string(),
            external_ref: ExternalRef::for_reservation(reservation_id),
            gateway_id: "va-1".to_string(),
            account_number: "8808".to_string(),
            status: PaymentStatus::Pending,
            created_at: day(1),
            updated_at: day(1),
            paid_at: None,
        };

        PaymentStore::insert(&store, record.clone()).await.unwrap();
        let mut duplicate = record.clone();
        duplicate.id = PaymentId::new();
        assert!(matches!(
            PaymentStore::insert(&store, duplicate).await,
            Err(RentalError::Conflict(_))
        ));

        record.status = PaymentStatus::Completed;
        store.update(record.clone()).await.unwrap();
        assert_eq!(
            store.find_by_reservation(reservation_id).await.unwrap(),
            Some(record.clone())
        );
        assert_eq!(
            store.find_by_external_ref(&record.external_ref).await.unwrap(),
            Some(record.clone())
        );
        assert_eq!(PaymentStore::get(&store, record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_rocksdb_survives_reopen() {
        let dir = tempdir().unwrap();
        let r = reservation(&[EquipmentId::new()], 1, 2, ReservationStatus::Pending);
        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            ReservationStore::insert(&store, r.clone()).await.unwrap();
        }
        let store = RocksDBStore::open(dir.path()).unwrap();
        assert_eq!(ReservationStore::get(&store, r.id).await.unwrap(), Some(r));
    }
}
