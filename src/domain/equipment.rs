use super::money::UnitPrice;
use serde::{Deserialize, Serialize};

uuid_id!(EquipmentId);

/// Catalog entry as seen by the rental core. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: EquipmentId,
    pub name: String,
    /// Price per unit per day.
    pub unit_price: UnitPrice,
    pub available: bool,
}
