#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use gearbook::application::booking::{BookingRequest, BookingService};
use gearbook::application::pricing::LineRequest;
use gearbook::application::settlement::{SettlementRequest, SettlementService};
use gearbook::config::SettlementConfig;
use gearbook::domain::equipment::{Equipment, EquipmentId};
use gearbook::domain::money::{Money, UnitPrice};
use gearbook::domain::payment::{
    ExternalRef, PaymentConfirmation, PaymentInstrument, PaymentMethod, PaymentStatus,
};
use gearbook::domain::ports::{Notifier, PaymentGateway};
use gearbook::domain::reservation::{ReservationId, UserId};
use gearbook::error::{RentalError, Result};
use gearbook::infrastructure::in_memory::{
    InMemoryCatalog, InMemoryPaymentStore, InMemoryReservationStore,
};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

pub fn equipment(name: &str, price: Decimal) -> Equipment {
    Equipment {
        id: EquipmentId::new(),
        name: name.to_string(),
        unit_price: UnitPrice::new(price).unwrap(),
        available: true,
    }
}

pub fn booking(renter: UserId, start: u32, end: u32, lines: &[(EquipmentId, u32)]) -> BookingRequest {
    BookingRequest {
        renter_id: renter,
        start: day(start),
        end: day(end),
        lines: lines
            .iter()
            .map(|(equipment_id, quantity)| LineRequest {
                equipment_id: *equipment_id,
                quantity: *quantity,
            })
            .collect(),
    }
}

pub fn settle(reservation_id: ReservationId, payer: UserId) -> SettlementRequest {
    SettlementRequest {
        reservation_id,
        payer_id: payer,
        method: PaymentMethod::VirtualAccount,
        channel: "BCA".to_string(),
    }
}

/// Gateway double replaying queued replies. Once a queue is empty it
/// succeeds: instruments echo the reference, confirmations are COMPLETED.
#[derive(Default)]
pub struct ScriptedGateway {
    open_replies: Mutex<VecDeque<Result<PaymentInstrument>>>,
    confirm_replies: Mutex<VecDeque<Result<PaymentConfirmation>>>,
    open_keys: Mutex<Vec<ExternalRef>>,
    confirmed_amounts: Mutex<Vec<Money>>,
    open_calls: AtomicUsize,
    confirm_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_open(&self, reply: Result<PaymentInstrument>) {
        self.open_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_confirm(&self, reply: Result<PaymentConfirmation>) {
        self.confirm_replies.lock().unwrap().push_back(reply);
    }

    pub fn confirm_with(&self, status: &str) {
        self.push_confirm(Ok(PaymentConfirmation {
            status: PaymentStatus::from(status),
        }));
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn open_keys(&self) -> Vec<ExternalRef> {
        self.open_keys.lock().unwrap().clone()
    }

    pub fn confirmed_amounts(&self) -> Vec<Money> {
        self.confirmed_amounts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn open_instrument(
        &self,
        external_ref: &ExternalRef,
        _channel: &str,
    ) -> Result<PaymentInstrument> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.open_keys.lock().unwrap().push(external_ref.clone());
        let scripted = self.open_replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(PaymentInstrument {
                external_ref: external_ref.clone(),
                account_number: "880812345678".to_string(),
                gateway_id: "va-test".to_string(),
            })
        })
    }

    async fn confirm_payment(
        &self,
        _external_ref: &ExternalRef,
        amount: Money,
    ) -> Result<PaymentConfirmation> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.confirmed_amounts.lock().unwrap().push(amount);
        let scripted = self.confirm_replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(PaymentConfirmation {
                status: PaymentStatus::Completed,
            })
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(UserId, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: UserId, subject: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient, subject.to_string(), body.to_string()));
        if self.fail {
            Err(RentalError::UpstreamTransport("smtp unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Booking and settlement services over shared in-memory stores.
pub struct Harness {
    pub booking: BookingService,
    pub settlement: SettlementService,
    pub catalog: Arc<InMemoryCatalog>,
    pub reservations: Arc<InMemoryReservationStore>,
    pub payments: Arc<InMemoryPaymentStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(items: Vec<Equipment>) -> Self {
        Self::with_notifier(items, RecordingNotifier::default())
    }

    pub fn with_notifier(items: Vec<Equipment>, notifier: RecordingNotifier) -> Self {
        let catalog = Arc::new(InMemoryCatalog::with_items(items));
        let reservations = Arc::new(InMemoryReservationStore::new());
        let payments = Arc::new(InMemoryPaymentStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let notifier = Arc::new(notifier);

        let booking = BookingService::new(catalog.clone(), reservations.clone());
        let settlement = SettlementService::new(
            reservations.clone(),
            payments.clone(),
            gateway.clone(),
            notifier.clone(),
            SettlementConfig {
                max_open_attempts: 3,
                retry_backoff: Duration::from_millis(1),
            },
        );

        Self {
            booking,
            settlement,
            catalog,
            reservations,
            payments,
            gateway,
            notifier,
        }
    }
}
