#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod clock;
mod commands;
pub mod dump;
mod error;
pub mod flash;
pub mod hal;
pub mod locator;
pub mod profile;
pub mod progress;
pub mod ram;
pub mod region;
pub mod trampoline;
pub mod transport;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use commands::REPORT_LEN;
pub use dump::CodeDumper;
pub use error::Error;
pub use flash::FlashRegion;
pub use hal::{Hal, StockHal, dump_rom};
pub use locator::{DeviceDescriptor, HidBus, InterfaceMatch, SearchCriteria};
pub use profile::{ChipVariant, DeviceProfile};
pub use progress::ProgressCallbacks;
pub use ram::RamRegion;
pub use region::{MemoryRegion, Operation, RegionKind, SubRegion};
pub use transport::FeatureReport;
