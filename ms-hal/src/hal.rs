//! Device abstraction consumed by the code dumper.
//!
//! The dumper only needs to know which chip it is talking to and where the RAM
//! and user configuration regions are. How that is worked out (firmware probing,
//! EEPROM patching) is up to the [`Hal`] implementation.

use crate::Error;
use crate::clock::Clock;
use crate::dump::CodeDumper;
use crate::profile::ChipVariant;
use crate::progress::ProgressCallbacks;
use crate::region::{MemoryRegion, RegionKind, SubRegion};

/// Access to an identified device and its memory regions.
pub trait Hal {
    /// Free-form device type, such as `"MS2109"`.
    fn device_type(&self) -> String;

    /// The region of the given kind, if this device exposes one.
    fn memory_region(&self, kind: RegionKind) -> Option<&dyn MemoryRegion>;

    /// Like [`Hal::memory_region`], failing with [`Error::RegionUnavailable`].
    fn require_region(&self, kind: RegionKind) -> Result<&dyn MemoryRegion, Error> {
        self.memory_region(kind).ok_or(Error::RegionUnavailable(kind))
    }
}

/// Dump the 64KiB code space of the device behind `hal`.
///
/// See [`CodeDumper::dump`] for the protocol and for what happens on failure.
///
/// # Errors
///
/// [`Error::UnknownDeviceVariant`] if the device type names no supported chip,
/// [`Error::RegionUnavailable`] if RAM or the user configuration is missing, and
/// any error from the dump itself.
pub fn dump_rom(
    hal: &dyn Hal,
    clock: &mut dyn Clock,
    progress: Option<&mut dyn ProgressCallbacks>,
) -> Result<Vec<u8>, Error> {
    let variant = ChipVariant::from_device_type(&hal.device_type())?;
    let ram = hal.require_region(RegionKind::Ram)?;
    let config = hal.require_region(RegionKind::UserConfig)?;
    log::info!("dumping code memory of {variant}");
    CodeDumper::new(ram, config, variant.profile()).dump(clock, progress)
}

/// [`Hal`] for a device running its stock firmware.
///
/// The device type is supplied by the caller rather than probed, and the user
/// configuration block is a window into RAM at a caller-given location.
#[derive(Debug)]
pub struct StockHal<'a> {
    device_type: String,
    ram: &'a dyn MemoryRegion,
    config: SubRegion<'a>,
    flash: Option<&'a dyn MemoryRegion>,
}

impl<'a> StockHal<'a> {
    /// Create a HAL over `ram`, with the user configuration at
    /// `config_addr..config_addr + config_len`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if the configuration window does not fit in RAM.
    pub fn new(
        device_type: impl Into<String>,
        ram: &'a dyn MemoryRegion,
        config_addr: usize,
        config_len: usize,
    ) -> Result<Self, Error> {
        let config = SubRegion::new("USERCONFIG", ram, config_addr, config_len)?;
        Ok(Self {
            device_type: device_type.into(),
            ram,
            config,
            flash: None,
        })
    }

    /// Also expose `flash` as [`RegionKind::Flash`].
    pub fn with_flash(mut self, flash: &'a dyn MemoryRegion) -> Self {
        self.flash = Some(flash);
        self
    }

    /// Every region this HAL exposes, in [`RegionKind`] order.
    pub fn regions(&self) -> Vec<(RegionKind, &dyn MemoryRegion)> {
        [RegionKind::Ram, RegionKind::UserConfig, RegionKind::Flash]
            .into_iter()
            .filter_map(|kind| self.memory_region(kind).map(|region| (kind, region)))
            .collect()
    }
}

impl Hal for StockHal<'_> {
    fn device_type(&self) -> String {
        self.device_type.clone()
    }

    fn memory_region(&self, kind: RegionKind) -> Option<&dyn MemoryRegion> {
        match kind {
            RegionKind::Ram => Some(self.ram),
            RegionKind::UserConfig => Some(&self.config),
            RegionKind::Flash => self.flash,
        }
    }
}
