use super::availability::AvailabilityOracle;
use crate::config::SettlementConfig;
use crate::domain::money::Money;
use crate::domain::payment::{
    ExternalRef, PaymentId, PaymentInstrument, PaymentMethod, PaymentRecord, PaymentStatus,
};
use crate::domain::ports::{NotifierRef, PaymentGatewayRef, PaymentStoreRef, ReservationStoreRef};
use crate::domain::reservation::{Reservation, ReservationId, ReservationStatus, UserId};
use crate::error::{RentalError, Result};
use chrono::Utc;
use tracing::{error, info, warn};

/// Request to pay for a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRequest {
    pub reservation_id: ReservationId,
    pub payer_id: UserId,
    pub method: PaymentMethod,
    /// Gateway channel, e.g. a bank code for virtual accounts.
    pub channel: String,
}

/// Outcome of a settlement or reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub payment: PaymentRecord,
    pub reservation: Reservation,
}

/// Drives a reservation through payment with the external gateway.
///
/// The payment record is written before the gateway is asked to confirm,
/// which makes it the claim on the reservation: a concurrent or repeated
/// settlement fails on insert instead of charging twice. If the confirmation
/// outcome is lost the record is left INDETERMINATE (or PENDING when the task
/// itself is dropped) and only [`SettlementService::reconcile_payment`] can
/// move it on.
#[derive(Clone)]
pub struct SettlementService {
    reservations: ReservationStoreRef,
    payments: PaymentStoreRef,
    gateway: PaymentGatewayRef,
    notifier: NotifierRef,
    availability: AvailabilityOracle,
    config: SettlementConfig,
}

impl SettlementService {
    pub fn new(
        reservations: ReservationStoreRef,
        payments: PaymentStoreRef,
        gateway: PaymentGatewayRef,
        notifier: NotifierRef,
        config: SettlementConfig,
    ) -> Self {
        let availability = AvailabilityOracle::new(reservations.clone());
        Self {
            reservations,
            payments,
            gateway,
            notifier,
            availability,
            config,
        }
    }

    pub async fn settle_payment(&self, request: SettlementRequest) -> Result<Settlement> {
        let reservation = self.load(request.reservation_id).await?;

        if reservation.renter_id != request.payer_id {
            return Err(RentalError::Forbidden(format!(
                "User {} is not allowed to pay for reservation {}",
                request.payer_id, reservation.id
            )));
        }
        if reservation.status == ReservationStatus::Completed {
            return Err(RentalError::Conflict(format!(
                "Reservation {} is already settled",
                reservation.id
            )));
        }
        if let Some(existing) = self.payments.find_by_reservation(reservation.id).await? {
            return Err(RentalError::Conflict(format!(
                "Reservation {} already has payment {} in status {}",
                reservation.id, existing.id, existing.status
            )));
        }
        // A PAID reservation already holds its slot and would collide with itself.
        if !reservation.status.is_confirmed()
            && let Some(equipment_id) = self
                .availability
                .first_conflict(reservation.equipment_ids().collect::<Vec<_>>(), &reservation.period)
                .await?
        {
            return Err(RentalError::Conflict(format!(
                "Equipment {equipment_id} was confirmed for another reservation in the meantime"
            )));
        }

        let external_ref = ExternalRef::for_reservation(reservation.id);
        let instrument = self
            .open_instrument_with_retry(&external_ref, &request.channel)
            .await?;

        let now = Utc::now();
        let mut payment = PaymentRecord {
            id: PaymentId::new(),
            reservation_id: reservation.id,
            payer_id: request.payer_id,
            amount: reservation.total_cost,
            method: request.method,
            channel: request.channel,
            external_ref: external_ref.clone(),
            gateway_id: instrument.gateway_id,
            account_number: instrument.account_number,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        self.payments.insert(payment.clone()).await?;

        let confirmation = match self
            .gateway
            .confirm_payment(&payment.external_ref, reservation.total_cost)
            .await
        {
            Ok(confirmation) => confirmation,
            Err(err) => {
                warn!(
                    reservation_id = %reservation.id,
                    payment_id = %payment.id,
                    error = %err,
                    "Payment confirmation outcome unknown, marking for reconciliation"
                );
                self.mark_indeterminate(payment).await;
                return Err(err);
            }
        };

        payment.reconcile(confirmation.status, Utc::now())?;
        self.payments.update(payment.clone()).await?;
        info!(
            reservation_id = %reservation.id,
            payment_id = %payment.id,
            status = %payment.status,
            amount = %payment.amount,
            "Payment recorded"
        );

        self.finish(payment, reservation).await
    }

    /// Applies a gateway status observed out of band to a record that is not
    /// yet completed, completing the reservation when payment went through.
    pub async fn reconcile_payment(
        &self,
        reservation_id: ReservationId,
        observed: PaymentStatus,
    ) -> Result<Settlement> {
        let reservation = self.load(reservation_id).await?;
        let mut payment = self
            .payments
            .find_by_reservation(reservation_id)
            .await?
            .ok_or_else(|| {
                RentalError::NotFound(format!("No payment recorded for reservation {reservation_id}"))
            })?;

        payment.reconcile(observed, Utc::now())?;
        self.payments.update(payment.clone()).await?;
        info!(
            %reservation_id,
            payment_id = %payment.id,
            status = %payment.status,
            "Payment reconciled"
        );

        self.finish(payment, reservation).await
    }

    async fn finish(&self, payment: PaymentRecord, reservation: Reservation) -> Result<Settlement> {
        if !payment.status.is_completed() {
            return Ok(Settlement {
                payment,
                reservation,
            });
        }

        let reservation = match self
            .reservations
            .update_status(reservation.id, reservation.status, ReservationStatus::Completed)
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                error!(
                    reservation_id = %reservation.id,
                    payment_id = %payment.id,
                    error = %err,
                    "Payment completed but reservation could not be completed"
                );
                return Err(err);
            }
        };
        info!(reservation_id = %reservation.id, "Reservation completed");

        let body = order_confirmation_body(reservation.id, reservation.total_cost);
        if let Err(err) = self
            .notifier
            .notify(reservation.renter_id, "Payment Completed", &body)
            .await
        {
            warn!(reservation_id = %reservation.id, error = %err, "Failed to send payment notification");
        }

        Ok(Settlement {
            payment,
            reservation,
        })
    }

    async fn load(&self, id: ReservationId) -> Result<Reservation> {
        self.reservations
            .get(id)
            .await?
            .ok_or_else(|| RentalError::NotFound(format!("Reservation {id} not found")))
    }

    async fn open_instrument_with_retry(
        &self,
        external_ref: &ExternalRef,
        channel: &str,
    ) -> Result<PaymentInstrument> {
        let max_attempts = self.config.max_open_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.gateway.open_instrument(external_ref, channel).await {
                Ok(instrument) if instrument.external_ref == *external_ref => return Ok(instrument),
                Ok(instrument) => {
                    return Err(RentalError::UpstreamContractViolation(format!(
                        "gateway opened instrument {} for '{}' instead of '{external_ref}'",
                        instrument.gateway_id, instrument.external_ref
                    )));
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(%external_ref, attempt, error = %err, "Opening payment instrument failed, retrying");
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn mark_indeterminate(&self, mut payment: PaymentRecord) {
        if payment.reconcile(PaymentStatus::Indeterminate, Utc::now()).is_err() {
            return;
        }
        if let Err(err) = self.payments.update(payment.clone()).await {
            // The record is still PENDING, which reconciliation also accepts.
            error!(payment_id = %payment.id, error = %err, "Could not mark payment indeterminate");
        }
    }
}

fn order_confirmation_body(reservation_id: ReservationId, total: Money) -> String {
    format!(
        "Your payment for reservation {reservation_id} has been received. Total paid: {:.2}",
        total.value()
    )
}
