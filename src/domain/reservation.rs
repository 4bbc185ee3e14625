use super::equipment::EquipmentId;
use super::money::{Money, Quantity};
use crate::error::RentalError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_HOUR: i64 = 3_600;
const HOURS_PER_DAY: i64 = 24;

uuid_id!(ReservationId);
uuid_id!(ReservationLineId);
uuid_id!(UserId);

/// Half-open rental interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl RentalPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RentalError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(RentalError::Validation(format!(
                "Rental period must end after it starts ({start} >= {end})"
            )))
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// `[a, b)` and `[c, d)` intersect iff `a < d && c < b`.
    pub fn overlaps(&self, other: &RentalPeriod) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Length in days, fractional and unrounded: elapsed hours divided by 24.
    pub fn duration_in_days(&self) -> Decimal {
        let elapsed = self.end - self.start;
        let mut seconds = Decimal::from(elapsed.num_seconds());
        let nanos = elapsed.subsec_nanos();
        if nanos != 0 {
            seconds += Decimal::new(i64::from(nanos), 9);
        }
        let hours = seconds / Decimal::from(SECONDS_PER_HOUR);
        hours / Decimal::from(HOURS_PER_DAY)
    }
}

/// Reservation lifecycle. Moves only forward: PENDING -> (PAID ->) COMPLETED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Paid,
    Completed,
}

impl ReservationStatus {
    /// Confirmed reservations hold their equipment exclusively.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ReservationStatus::Paid | ReservationStatus::Completed)
    }

    fn rank(&self) -> u8 {
        match self {
            ReservationStatus::Pending => 0,
            ReservationStatus::Paid => 1,
            ReservationStatus::Completed => 2,
        }
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Paid => "PAID",
            ReservationStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = RentalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ReservationStatus::Pending),
            "PAID" => Ok(ReservationStatus::Paid),
            "COMPLETED" => Ok(ReservationStatus::Completed),
            other => Err(RentalError::Validation(format!(
                "Unknown reservation status: {other}"
            ))),
        }
    }
}

/// One equipment item on a reservation. The name is a snapshot taken at
/// booking time and is never refreshed from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub id: ReservationLineId,
    pub reservation_id: ReservationId,
    pub equipment_id: EquipmentId,
    pub quantity: Quantity,
    pub equipment_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub renter_id: UserId,
    pub period: RentalPeriod,
    pub total_cost: Money,
    pub status: ReservationStatus,
    pub lines: Vec<ReservationLine>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Advances the lifecycle, rejecting any move that is not strictly forward.
    pub fn transition(&mut self, next: ReservationStatus) -> Result<(), RentalError> {
        if !self.status.can_transition_to(next) {
            return Err(RentalError::Conflict(format!(
                "Reservation {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn equipment_ids(&self) -> impl Iterator<Item = EquipmentId> + '_ {
        self.lines.iter().map(|line| line.equipment_id)
    }

    /// True if this reservation would collide with `other` once both are confirmed.
    pub fn collides_with(&self, other: &Reservation) -> bool {
        self.id != other.id
            && self.period.overlaps(&other.period)
            && self
                .equipment_ids()
                .any(|id| other.equipment_ids().any(|o| o == id))
    }
}
