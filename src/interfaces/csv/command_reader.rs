use crate::application::booking::BookingRequest;
use crate::application::engine::RentalCommand;
use crate::application::pricing::LineRequest;
use crate::domain::equipment::EquipmentId;
use crate::domain::reservation::UserId;
use crate::error::{RentalError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum CommandKind {
    Book,
    Settle,
}

#[derive(Debug, Deserialize)]
struct CommandRecord {
    command: CommandKind,
    r#ref: String,
    user: Uuid,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    lines: Option<String>,
    method: Option<String>,
    channel: Option<String>,
}

fn field<T>(value: Option<T>, name: &str, kind: CommandKind) -> Result<T> {
    value.ok_or_else(|| {
        RentalError::Validation(format!("'{name}' is required for {kind:?} commands"))
    })
}

/// Parses `equipment_uuid*quantity` items separated by `;`.
fn parse_lines(raw: &str) -> Result<Vec<LineRequest>> {
    raw.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (id, quantity) = item.split_once('*').ok_or_else(|| {
                RentalError::Validation(format!("Line '{item}' must look like <equipment>*<quantity>"))
            })?;
            let equipment_id = Uuid::parse_str(id.trim()).map_err(|e| {
                RentalError::Validation(format!("Invalid equipment id '{id}': {e}"))
            })?;
            let quantity = quantity.trim().parse::<u32>().map_err(|e| {
                RentalError::Validation(format!("Invalid quantity '{quantity}': {e}"))
            })?;
            Ok(LineRequest {
                equipment_id: EquipmentId(equipment_id),
                quantity,
            })
        })
        .collect()
}

impl TryFrom<CommandRecord> for RentalCommand {
    type Error = RentalError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let kind = record.command;
        match kind {
            CommandKind::Book => Ok(RentalCommand::Book {
                label: record.r#ref,
                request: BookingRequest {
                    renter_id: UserId(record.user),
                    start: field(record.start, "start", kind)?,
                    end: field(record.end, "end", kind)?,
                    lines: parse_lines(&field(record.lines, "lines", kind)?)?,
                },
            }),
            CommandKind::Settle => Ok(RentalCommand::Settle {
                target: record.r#ref,
                payer_id: UserId(record.user),
                method: field(record.method, "method", kind)?.parse()?,
                channel: field(record.channel, "channel", kind)?,
            }),
        }
    }
}

/// Reads rental commands from a CSV source.
///
/// Columns: `command, ref, user, start, end, lines, method, channel`.
/// Rows are deserialized lazily so large batches stream.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<RentalCommand>> {
        self.reader
            .into_deserialize::<CommandRecord>()
            .map(|row| row.map_err(RentalError::from).and_then(RentalCommand::try_from))
    }
}
