//! Finding and opening the HID interface of a chip.
//!
//! Enumeration and opening are both flaky on some hosts, so each is retried a
//! few times with a short backoff. Devices that answer to an alternate vendor ID
//! are found by repeating the enumeration with that ID when the primary one
//! turns up nothing.

use std::convert::Infallible;
use std::ffi::CString;
use std::fmt;

use hidapi::{DeviceInfo, HidApi, HidDevice};

use crate::Error;
use crate::clock::Clock;

/// Default MacroSilicon vendor ID.
pub const DEFAULT_VENDOR_ID: u16 = 0x534D;
/// Vendor ID used by some rebranded devices.
pub const ALTERNATE_VENDOR_ID: u16 = 0x345F;
/// Default product ID.
pub const DEFAULT_PRODUCT_ID: u16 = 0x2109;

const ATTEMPTS: usize = 3;
const BACKOFF_MS: u32 = 100;

/// One HID interface found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// USB vendor ID.
    pub vendor_id: u16,
    /// USB product ID.
    pub product_id: u16,
    /// Platform-specific device path, used to open the interface.
    pub path: String,
    /// Serial number string, if the device reports one.
    pub serial: Option<String>,
    /// USB interface number, or -1 if the platform does not know it.
    pub interface_number: i32,
    /// HID usage page of the interface's top-level collection.
    pub usage_page: u16,
    /// HID usage of the interface's top-level collection.
    pub usage: u16,
    /// Manufacturer string, if any.
    pub manufacturer: Option<String>,
    /// Product string, if any.
    pub product: Option<String>,
}

impl From<&DeviceInfo> for DeviceDescriptor {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            path: info.path().to_string_lossy().into_owned(),
            serial: info.serial_number().map(str::to_owned),
            interface_number: info.interface_number(),
            usage_page: info.usage_page(),
            usage: info.usage(),
            manufacturer: info.manufacturer_string().map(str::to_owned),
            product: info.product_string().map(str::to_owned),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: ID {:04x}:{:04x} (interface {}, usage {:04x}:{:04x})",
            self.path,
            self.vendor_id,
            self.product_id,
            self.interface_number,
            self.usage_page,
            self.usage
        )
    }
}

/// Rule for picking the right HID interface among those one device exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InterfaceMatch {
    /// Accept every interface.
    #[default]
    Any,
    /// Accept only the given USB interface number.
    Interface(i32),
    /// Accept only interfaces whose top-level collection has this usage page.
    UsagePage(u16),
}

impl InterfaceMatch {
    fn matches(self, descriptor: &DeviceDescriptor) -> bool {
        match self {
            InterfaceMatch::Any => true,
            InterfaceMatch::Interface(n) => descriptor.interface_number == n,
            InterfaceMatch::UsagePage(page) => descriptor.usage_page == page,
        }
    }
}

/// What to look for when searching for a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Vendor ID tried first.
    pub vendor_id: u16,
    /// Vendor ID tried when the first one finds nothing.
    pub alternate_vendor_id: Option<u16>,
    /// Product ID, shared by both vendor IDs.
    pub product_id: u16,
    /// Exact serial number to match.
    pub serial: Option<String>,
    /// Exact device path to match.
    pub path: Option<String>,
    /// Interface selection rule.
    pub interface: InterfaceMatch,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
            alternate_vendor_id: Some(ALTERNATE_VENDOR_ID),
            product_id: DEFAULT_PRODUCT_ID,
            serial: None,
            path: None,
            interface: InterfaceMatch::Any,
        }
    }
}

impl SearchCriteria {
    fn accepts(&self, descriptor: &DeviceDescriptor) -> bool {
        if let Some(serial) = &self.serial {
            if descriptor.serial.as_ref() != Some(serial) {
                log::debug!("skipping {descriptor}: serial number mismatch (want {serial})");
                return false;
            }
        }
        if let Some(path) = &self.path {
            if descriptor.path != *path {
                log::debug!("skipping {descriptor}: path mismatch (want {path})");
                return false;
            }
        }
        if !self.interface.matches(descriptor) {
            log::debug!("skipping {descriptor}: wrong interface");
            return false;
        }
        true
    }
}

/// Host-side HID enumeration and open.
pub trait HidBus {
    /// Handle to an opened interface.
    type Device;

    /// List the interfaces with the given vendor and product ID.
    fn enumerate(&mut self, vendor_id: u16, product_id: u16)
    -> Result<Vec<DeviceDescriptor>, Error>;

    /// Open the interface described by `descriptor`.
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Self::Device, Error>;
}

impl HidBus for HidApi {
    type Device = HidDevice;

    fn enumerate(
        &mut self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Vec<DeviceDescriptor>, Error> {
        self.refresh_devices()?;
        let found = self
            .device_list()
            .filter(|info| info.vendor_id() == vendor_id && info.product_id() == product_id)
            .map(DeviceDescriptor::from)
            .collect();
        Ok(found)
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<HidDevice, Error> {
        let path = CString::new(descriptor.path.as_str())?;
        Ok(self.open_path(&path)?)
    }
}

/// Visitor verdict for [`search`].
#[derive(Debug)]
pub enum Visit<T> {
    /// Move on to the next descriptor.
    Continue,
    /// Stop searching and return this value.
    Found(T),
}

/// Enumerate one vendor ID, retrying on errors and on empty results.
///
/// Succeeds with an empty list if at least one attempt succeeded but none found
/// anything. Fails with the last error if every attempt failed.
fn enumerate_with_retry<B: HidBus>(
    bus: &mut B,
    clock: &mut dyn Clock,
    vendor_id: u16,
    product_id: u16,
) -> Result<Vec<DeviceDescriptor>, Error> {
    let mut last_err = None;
    let mut succeeded = false;
    for attempt in 1..=ATTEMPTS {
        if attempt > 1 {
            clock.delay_ms(BACKOFF_MS);
        }
        log::debug!("enumerating {vendor_id:04x}:{product_id:04x}, attempt {attempt}");
        match bus.enumerate(vendor_id, product_id) {
            Ok(found) if !found.is_empty() => {
                log::debug!("found {} interfaces", found.len());
                return Ok(found);
            }
            Ok(_) => succeeded = true,
            Err(err) => {
                log::warn!("enumeration of {vendor_id:04x}:{product_id:04x} failed: {err}");
                last_err = Some(err);
            }
        }
    }
    match last_err {
        Some(err) if !succeeded => Err(err),
        _ => Ok(Vec::new()),
    }
}

/// Enumerate with the primary and then the alternate vendor ID, and apply the
/// filters in `criteria`.
///
/// # Errors
///
/// [`Error::Enumeration`] if every attempt failed for every vendor ID tried.
/// [`Error::NotFound`] if no interface passed the filters.
pub fn discover<B: HidBus>(
    bus: &mut B,
    clock: &mut dyn Clock,
    criteria: &SearchCriteria,
) -> Result<Vec<DeviceDescriptor>, Error> {
    let pid = criteria.product_id;
    let primary = enumerate_with_retry(bus, clock, criteria.vendor_id, pid);
    let found = match (primary, criteria.alternate_vendor_id) {
        (Ok(found), _) if !found.is_empty() => found,
        (primary, Some(alternate)) => {
            log::info!("trying alternate vendor ID {alternate:04x}");
            match (primary, enumerate_with_retry(bus, clock, alternate, pid)) {
                (_, Ok(found)) | (Ok(found), Err(_)) => found,
                (Err(_), Err(err)) => return Err(Error::Enumeration(Box::new(err))),
            }
        }
        (Ok(found), None) => found,
        (Err(err), None) => return Err(Error::Enumeration(Box::new(err))),
    };

    let accepted: Vec<_> = found
        .into_iter()
        .filter(|descriptor| criteria.accepts(descriptor))
        .collect();
    if accepted.is_empty() {
        return Err(Error::NotFound);
    }
    Ok(accepted)
}

/// Visit every interface matching `criteria` in enumeration order until the
/// visitor returns [`Visit::Found`].
///
/// An error from the visitor aborts the search and is returned as is.
///
/// # Errors
///
/// As for [`discover`]. [`Error::NotFound`] is also returned when the visitor
/// never returns [`Visit::Found`].
pub fn search<B, T, F>(
    bus: &mut B,
    clock: &mut dyn Clock,
    criteria: &SearchCriteria,
    mut visit: F,
) -> Result<T, Error>
where
    B: HidBus,
    F: FnMut(&B, &mut dyn Clock, &DeviceDescriptor) -> Result<Visit<T>, Error>,
{
    for descriptor in discover(bus, clock, criteria)? {
        if let Visit::Found(found) = visit(&*bus, clock, &descriptor)? {
            return Ok(found);
        }
    }
    Err(Error::NotFound)
}

/// All interfaces matching `criteria`. Finding none is not an error.
pub fn list<B: HidBus>(
    bus: &mut B,
    clock: &mut dyn Clock,
    criteria: &SearchCriteria,
) -> Result<Vec<DeviceDescriptor>, Error> {
    let mut seen = Vec::new();
    let result = search(bus, clock, criteria, |_, _, descriptor| {
        seen.push(descriptor.clone());
        Ok(Visit::<Infallible>::Continue)
    });
    match result {
        Ok(never) => match never {},
        Err(Error::NotFound) => Ok(seen),
        Err(err) => Err(err),
    }
}

/// Open the interface described by `descriptor`, trying three times with a
/// 100ms pause between attempts.
///
/// # Errors
///
/// The error from the last attempt.
pub fn open<B: HidBus>(
    bus: &B,
    clock: &mut dyn Clock,
    descriptor: &DeviceDescriptor,
) -> Result<B::Device, Error> {
    let mut attempt = 1;
    loop {
        match bus.open(descriptor) {
            Ok(device) => {
                log::info!("opened {descriptor}");
                return Ok(device);
            }
            Err(err) if attempt < ATTEMPTS => {
                log::warn!("failed to open {} (attempt {attempt}): {err}", descriptor.path);
                clock.delay_ms(BACKOFF_MS);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Open the first interface that matches `criteria`.
///
/// # Errors
///
/// As for [`discover`]. If the first matching interface cannot be [`open`]ed,
/// the search stops with that error.
pub fn open_first<B: HidBus>(
    bus: &mut B,
    clock: &mut dyn Clock,
    criteria: &SearchCriteria,
) -> Result<B::Device, Error> {
    search(bus, clock, criteria, |bus, clock, descriptor| {
        open(bus, clock, descriptor).map(Visit::Found)
    })
}
