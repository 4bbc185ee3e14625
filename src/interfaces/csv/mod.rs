//! CSV adapters used by the `gearbook` binary.

pub mod catalog_reader;
pub mod command_reader;
pub mod reservation_writer;
