use crate::domain::reservation::Reservation;
use crate::error::Result;
use chrono::SecondsFormat;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ReservationRow {
    reservation: String,
    renter: String,
    start: String,
    end: String,
    total_cost: String,
    status: &'static str,
}

impl From<&Reservation> for ReservationRow {
    fn from(reservation: &Reservation) -> Self {
        Self {
            reservation: reservation.id.to_string(),
            renter: reservation.renter_id.to_string(),
            start: reservation.period.start().to_rfc3339_opts(SecondsFormat::Secs, true),
            end: reservation.period.end().to_rfc3339_opts(SecondsFormat::Secs, true),
            total_cost: reservation.total_cost.to_string(),
            status: reservation.status.as_str(),
        }
    }
}

/// Writes the final reservation report as CSV.
pub struct ReservationWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReservationWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_reservations(&mut self, reservations: &[Reservation]) -> Result<()> {
        if reservations.is_empty() {
            self.writer.write_record([
                "reservation",
                "renter",
                "start",
                "end",
                "total_cost",
                "status",
            ])?;
        }
        for reservation in reservations {
            self.writer.serialize(ReservationRow::from(reservation))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
