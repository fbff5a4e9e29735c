//! Byte access to the XDATA space through the stock firmware.

use crate::Error;
use crate::commands::{MsCommand, REPORT_LEN, Report};
use crate::region::{MemoryRegion, Operation, check_bounds};
use crate::transport::FeatureReport;

/// Size of the 8051 XDATA address space.
pub const XDATA_LEN: usize = 0x10000;

/// The XDATA space (RAM and memory-mapped registers), one byte per report.
#[derive(Debug)]
pub struct RamRegion<'a, T> {
    transport: &'a T,
}

impl<'a, T: FeatureReport> RamRegion<'a, T> {
    /// Expose the XDATA space of the device behind `transport`.
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    fn read_xdata(&self, addr: u16) -> Result<u8, Error> {
        let report = Report::new(MsCommand::ReadXdata { addr });
        self.transport.send_feature_report(&report.buffer)?;
        let mut response = [0u8; REPORT_LEN];
        self.transport.get_feature_report(&mut response)?;
        Ok(response[4])
    }

    fn write_xdata(&self, addr: u16, value: u8) -> Result<(), Error> {
        let report = Report::new(MsCommand::WriteXdata { addr, value });
        self.transport.send_feature_report(&report.buffer)
    }
}

impl<T: FeatureReport> MemoryRegion for RamRegion<'_, T> {
    fn name(&self) -> &str {
        "RAM"
    }

    fn length(&self) -> usize {
        XDATA_LEN
    }

    fn access(&self, addr: usize, op: Operation<'_>) -> Result<usize, Error> {
        check_bounds(self, addr)?;
        let available = XDATA_LEN - addr;
        match op {
            Operation::Read(buf) => {
                let len = buf.len().min(available);
                for (i, byte) in buf[..len].iter_mut().enumerate() {
                    *byte = self.read_xdata((addr + i) as u16)?;
                }
                Ok(len)
            }
            Operation::Write(buf) => {
                let len = buf.len().min(available);
                for (i, &byte) in buf[..len].iter().enumerate() {
                    self.write_xdata((addr + i) as u16, byte)?;
                }
                Ok(len)
            }
        }
    }
}
