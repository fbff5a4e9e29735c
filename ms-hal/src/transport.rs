//! Raw feature-report exchange with the chip.

use hidapi::HidDevice;

use crate::Error;
use crate::commands::REPORT_LEN;

/// Raw feature-report primitive every higher layer is built on.
///
/// One handle has exactly one caller: each call is a blocking request/response
/// exchange on the control channel and must not be interleaved with another.
/// Methods take `&self` so that several memory regions can share one handle.
pub trait FeatureReport {
    /// Send an 8-byte feature report to the device.
    fn send_feature_report(&self, report: &[u8; REPORT_LEN]) -> Result<(), Error>;

    /// Read an 8-byte feature report from the device into `report`.
    fn get_feature_report(&self, report: &mut [u8; REPORT_LEN]) -> Result<(), Error>;
}

impl FeatureReport for HidDevice {
    fn send_feature_report(&self, report: &[u8; REPORT_LEN]) -> Result<(), Error> {
        // hidapi wants the report ID in front of the data. The chips use ID 0.
        let mut out = [0u8; REPORT_LEN + 1];
        out[1..].copy_from_slice(report);
        HidDevice::send_feature_report(self, &out)?;
        Ok(())
    }

    fn get_feature_report(&self, report: &mut [u8; REPORT_LEN]) -> Result<(), Error> {
        let mut buf = [0u8; REPORT_LEN + 1];
        let read = HidDevice::get_feature_report(self, &mut buf)?;
        log::trace!("feature report in ({read} bytes): {:02x?}", &buf[..read]);
        report.copy_from_slice(&buf[1..]);
        Ok(())
    }
}
