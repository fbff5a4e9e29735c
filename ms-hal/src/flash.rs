//! Paged read access to the external SPI flash.
//!
//! The firmware reads flash a page at a time into an internal scratch buffer,
//! and the host then pulls bytes out of that buffer. The SPI pins are shared
//! with GPIO, so the pin-mux has to be switched over before the first read.

use std::cell::Cell;

use crate::Error;
use crate::commands::{MsCommand, REPORT_LEN, Report, pin_mask};
use crate::region::{MemoryRegion, Operation, check_bounds};
use crate::transport::FeatureReport;

/// Size of the flash address space reachable through the scratch buffer.
pub const FLASH_LEN: usize = 0x10000;

/// Bytes loaded into the scratch buffer per page.
pub const PAGE_LEN: usize = 0x100;

/// Pin-mux register that routes the shared pins to the SPI controller.
const PIN_MUX_ADDR: u16 = 0xF01F;
const PIN_MUX_SPI: u8 = 0x10;
const PIN_MUX_GPIO: u8 = 0x00;

/// GPIOs driven by the SPI controller (clock, chip select, MOSI).
const SPI_OUTPUT_PINS: [usize; 3] = [2, 3, 4];
/// GPIO sampled by the SPI controller (MISO).
const SPI_INPUT_PINS: [usize; 1] = [5];

/// Last pin-mux state written to the device by this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiState {
    /// Nothing written yet; the device may be in either state.
    Unknown,
    /// Pins routed to SPI.
    Enabled,
    /// Pins routed to GPIO.
    Disabled,
}

/// Read-only view of the SPI flash.
///
/// Writing is not supported and fails with [`Error::Unsupported`].
#[derive(Debug)]
pub struct FlashRegion<'a, T> {
    transport: &'a T,
    spi: Cell<SpiState>,
}

impl<'a, T: FeatureReport> FlashRegion<'a, T> {
    /// Create a flash view over `transport`. The pin-mux is left untouched until
    /// the first read.
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            spi: Cell::new(SpiState::Unknown),
        }
    }

    /// Current cached pin-mux state.
    pub fn spi_state(&self) -> SpiState {
        self.spi.get()
    }

    /// Route the shared pins to SPI (`true`) or back to GPIO (`false`).
    ///
    /// Calls matching the cached state do nothing. The GPIO direction setup is only
    /// sent the first time SPI is enabled on this handle.
    pub fn set_spi_enabled(&self, enable: bool) -> Result<(), Error> {
        let state = self.spi.get();
        let value = if enable {
            if state == SpiState::Enabled {
                return Ok(());
            }
            if state == SpiState::Unknown {
                let output = pin_mask(&SPI_OUTPUT_PINS);
                let input = pin_mask(&SPI_INPUT_PINS);
                let report = Report::new(MsCommand::ConfigureGpio { output, input });
                self.transport.send_feature_report(&report.buffer)?;
            }
            PIN_MUX_SPI
        } else {
            if state == SpiState::Disabled {
                return Ok(());
            }
            PIN_MUX_GPIO
        };

        log::debug!("SPI pin-mux {state:?} -> enabled={enable}");
        let report = Report::new(MsCommand::WriteXdata {
            addr: PIN_MUX_ADDR,
            value,
        });
        self.transport.send_feature_report(&report.buffer)?;
        self.spi.set(if enable {
            SpiState::Enabled
        } else {
            SpiState::Disabled
        });
        Ok(())
    }

    /// Read from flash page `page` starting at `offset` within the page.
    ///
    /// Returns the number of bytes copied into `buf`, which is limited by the
    /// response payload size and never runs past the end of the page.
    pub fn read_page(&self, page: u16, offset: u8, buf: &mut [u8]) -> Result<usize, Error> {
        self.set_spi_enabled(true)?;

        let load = Report::new(MsCommand::FlashLoadPage {
            page,
            len: PAGE_LEN as u16,
        });
        self.transport.send_feature_report(&load.buffer)?;

        let scratch = Report::new(MsCommand::FlashReadScratch {
            offset: offset.into(),
        });
        self.transport.send_feature_report(&scratch.buffer)?;

        let mut response = [0u8; REPORT_LEN];
        self.transport.get_feature_report(&mut response)?;

        let len = buf.len().min(PAGE_LEN - usize::from(offset));
        let payload = &response[1..];
        let copied = len.min(payload.len());
        buf[..copied].copy_from_slice(&payload[..copied]);
        Ok(copied)
    }
}

impl<T: FeatureReport> MemoryRegion for FlashRegion<'_, T> {
    fn name(&self) -> &str {
        "FLASH"
    }

    fn length(&self) -> usize {
        FLASH_LEN
    }

    fn access(&self, addr: usize, op: Operation<'_>) -> Result<usize, Error> {
        check_bounds(self, addr)?;
        let buf = match op {
            Operation::Read(buf) => buf,
            Operation::Write(_) => return Err(Error::Unsupported("flash write")),
        };

        let len = buf.len().min(FLASH_LEN - addr);
        let mut total = 0;
        while total < len {
            let cursor = addr + total;
            let page = (cursor >> 8) as u16;
            let offset = (cursor & 0xFF) as u8;
            let read = self.read_page(page, offset, &mut buf[total..len])?;
            if read == 0 {
                break;
            }
            total += read;
        }
        Ok(total)
    }
}
