use crate::region::RegionKind;

/// Wrapper for problems when communicating with a MacroSilicon chip.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device type reported by the HAL does not name a supported chip family.
    ///
    /// The enclosed string is the identifier as reported.
    #[error("unknown device variant {0:?}")]
    UnknownDeviceVariant(String),
    /// Every enumeration attempt, across both vendor IDs, failed.
    ///
    /// The enclosed error is the last one seen.
    #[error("device enumeration failed")]
    Enumeration(#[source] Box<Error>),
    /// No device matched the search criteria, or none of the matches could be used.
    #[error("no matching device found")]
    NotFound,
    /// An access started outside the bounds of a memory region.
    #[error("address {addr:#06x} out of range for region {region} of length {length:#x}")]
    OutOfRange {
        /// Name of the region that was accessed.
        region: String,
        /// Requested start address.
        addr: usize,
        /// Length of the region.
        length: usize,
    },
    /// The region does not support the requested kind of access.
    ///
    /// This occurs when writing to the SPI flash.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// The injected trampoline did not acknowledge a mailbox command in time.
    #[error("timed out waiting for the mailbox acknowledgement")]
    PatchTimeout,
    /// A region stopped making progress before the whole buffer was transferred.
    #[error("short transfer: expected {expected} bytes, transferred {actual}")]
    ShortTransfer {
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes actually transferred.
        actual: usize,
    },
    /// The HAL does not expose the requested memory region.
    #[error("memory region {0:?} is not available")]
    RegionUnavailable(RegionKind),
    /// A device path contained an interior NUL byte.
    #[error("invalid device path")]
    InvalidPath(#[from] std::ffi::NulError),
    /// An error occurred in the underlying USB HID transport.
    #[error(transparent)]
    HidApi(#[from] hidapi::HidError),
}
