use crate::domain::equipment::{Equipment, EquipmentId};
use crate::domain::money::UnitPrice;
use crate::error::{RentalError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    id: Uuid,
    name: String,
    price: Decimal,
    available: bool,
}

impl TryFrom<CatalogRecord> for Equipment {
    type Error = RentalError;

    fn try_from(record: CatalogRecord) -> Result<Self> {
        Ok(Equipment {
            id: EquipmentId(record.id),
            name: record.name,
            unit_price: UnitPrice::new(record.price)?,
            available: record.available,
        })
    }
}

/// Reads equipment catalog rows (`id, name, price, available`) from CSV.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    pub fn equipment(self) -> impl Iterator<Item = Result<Equipment>> {
        self.reader
            .into_deserialize::<CatalogRecord>()
            .map(|row| row.map_err(RentalError::from).and_then(Equipment::try_from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reads_catalog() {
        let data = "id, name, price, available\n\
                    6f1c1a8e-9a3e-4c55-9a43-3d1f0f6d3a01, Tent, 50, true\n\
                    6f1c1a8e-9a3e-4c55-9a43-3d1f0f6d3a02, Stove, 12.5, false";
        let items: Vec<_> = CatalogReader::new(data.as_bytes()).equipment().collect();
        assert_eq!(items.len(), 2);
        let tent = items[0].as_ref().unwrap();
        assert_eq!(tent.name, "Tent");
        assert_eq!(tent.unit_price.value(), dec!(50));
        assert!(tent.available);
        assert!(!items[1].as_ref().unwrap().available);
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let data = "id,name,price,available\n6f1c1a8e-9a3e-4c55-9a43-3d1f0f6d3a01,Tent,-5,true";
        let items: Vec<_> = CatalogReader::new(data.as_bytes()).equipment().collect();
        assert!(matches!(items[0], Err(RentalError::Validation(_))));
    }
}
