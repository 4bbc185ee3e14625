use super::money::Money;
use super::reservation::{ReservationId, UserId};
use crate::error::RentalError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

uuid_id!(PaymentId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    QrCode,
    VirtualAccount,
    Ewallet,
}

impl FromStr for PaymentMethod {
    type Err = RentalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QR_CODE" => Ok(PaymentMethod::QrCode),
            "VIRTUAL_ACCOUNT" => Ok(PaymentMethod::VirtualAccount),
            "EWALLET" => Ok(PaymentMethod::Ewallet),
            other => Err(RentalError::Validation(format!(
                "Unsupported payment method: {other}"
            ))),
        }
    }
}

/// Status reported by the gateway, mirrored onto the payment record.
///
/// `Indeterminate` is local: the confirmation call was sent but its outcome is
/// unknown and must be reconciled. Unrecognised gateway values pass through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Indeterminate,
    Other(String),
}

impl PaymentStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Indeterminate => "INDETERMINATE",
            PaymentStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "PENDING" => PaymentStatus::Pending,
            "COMPLETED" => PaymentStatus::Completed,
            "INDETERMINATE" => PaymentStatus::Indeterminate,
            _ => PaymentStatus::Other(raw),
        }
    }
}

impl From<&str> for PaymentStatus {
    fn from(raw: &str) -> Self {
        PaymentStatus::from(raw.to_string())
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference shared with the gateway. Doubles as the idempotency key for
/// instrument creation, so it is derived from the reservation, never from a clock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalRef(String);

impl ExternalRef {
    pub fn for_reservation(reservation_id: ReservationId) -> Self {
        Self(format!("RSV-{reservation_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ExternalRef {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated reply to opening a payment instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInstrument {
    pub external_ref: ExternalRef,
    pub account_number: String,
    pub gateway_id: String,
}

/// Validated reply to a payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub reservation_id: ReservationId,
    pub payer_id: UserId,
    /// Always the reservation's total cost.
    pub amount: Money,
    pub method: PaymentMethod,
    pub channel: String,
    pub external_ref: ExternalRef,
    pub gateway_id: String,
    pub account_number: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    /// Applies a status observed at the gateway. A completed record is final.
    pub fn reconcile(&mut self, status: PaymentStatus, now: DateTime<Utc>) -> Result<(), RentalError> {
        if self.status.is_completed() {
            return Err(RentalError::Conflict(format!(
                "Payment {} is already completed",
                self.id
            )));
        }
        if status.is_completed() {
            self.paid_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }
}
