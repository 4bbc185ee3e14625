use super::booking::{BookingRequest, BookingService};
use super::settlement::{SettlementRequest, SettlementService};
use crate::domain::payment::PaymentMethod;
use crate::domain::reservation::{Reservation, ReservationId, UserId};
use crate::error::{RentalError, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One instruction from a batch of rental commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RentalCommand {
    /// Create a reservation and remember it under `label`.
    Book {
        label: String,
        request: BookingRequest,
    },
    /// Settle the reservation named by `target`: a label from an earlier
    /// `Book`, or a reservation id.
    Settle {
        target: String,
        payer_id: UserId,
        method: PaymentMethod,
        channel: String,
    },
}

/// Entry point for batch processing.
///
/// `RentalEngine` owns the booking and settlement services and resolves the
/// caller-chosen labels that tie settle commands to earlier bookings.
pub struct RentalEngine {
    booking: BookingService,
    settlement: SettlementService,
    labels: RwLock<HashMap<String, ReservationId>>,
}

impl RentalEngine {
    pub fn new(booking: BookingService, settlement: SettlementService) -> Self {
        Self {
            booking,
            settlement,
            labels: RwLock::new(HashMap::new()),
        }
    }

    pub fn booking(&self) -> &BookingService {
        &self.booking
    }

    pub fn settlement(&self) -> &SettlementService {
        &self.settlement
    }

    pub async fn process_command(&self, command: RentalCommand) -> Result<()> {
        match command {
            RentalCommand::Book { label, request } => {
                // Held across the booking so a label is claimed exactly once.
                let mut labels = self.labels.write().await;
                let slot = match labels.entry(label) {
                    Entry::Occupied(taken) => {
                        return Err(RentalError::Validation(format!(
                            "Booking label '{}' is already in use",
                            taken.key()
                        )));
                    }
                    Entry::Vacant(slot) => slot,
                };
                let reservation = self.booking.create_reservation(request).await?;
                slot.insert(reservation.id);
                Ok(())
            }
            RentalCommand::Settle {
                target,
                payer_id,
                method,
                channel,
            } => {
                let reservation_id = self.resolve(&target).await?;
                self.settlement
                    .settle_payment(SettlementRequest {
                        reservation_id,
                        payer_id,
                        method,
                        channel,
                    })
                    .await?;
                Ok(())
            }
        }
    }

    async fn resolve(&self, target: &str) -> Result<ReservationId> {
        if let Some(id) = self.labels.read().await.get(target) {
            return Ok(*id);
        }
        Uuid::parse_str(target)
            .map(ReservationId)
            .map_err(|_| RentalError::NotFound(format!("Unknown reservation '{target}'")))
    }

    /// Consumes the engine and returns every stored reservation, ordered by start.
    pub async fn into_results(self) -> Result<Vec<Reservation>> {
        self.booking.all_reservations().await
    }
}
