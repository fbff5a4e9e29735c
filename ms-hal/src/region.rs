//! Uniform addressable-memory abstraction.
//!
//! Every kind of device memory (XDATA RAM, the user configuration block, SPI
//! flash) is exposed as a [`MemoryRegion`]. Addresses are absolute within the
//! region, and accesses never run concurrently against the same device.

use crate::Error;

/// Kinds of memory region a HAL can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// The 64KiB XDATA space: RAM and memory-mapped registers.
    Ram,
    /// The firmware's user configuration block, which holds the hook enables.
    UserConfig,
    /// External SPI flash.
    Flash,
}

/// A single transfer against a region.
#[derive(Debug)]
pub enum Operation<'a> {
    /// Read into the buffer.
    Read(&'a mut [u8]),
    /// Write the buffer.
    Write(&'a [u8]),
}

impl Operation<'_> {
    /// Number of bytes the caller asked for.
    pub fn len(&self) -> usize {
        match self {
            Operation::Read(buf) => buf.len(),
            Operation::Write(buf) => buf.len(),
        }
    }

    /// Returns true for a zero-length transfer.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Addressable range of device memory.
///
/// Implementations iterate internally until the caller's buffer is satisfied or
/// no further progress can be made. In the latter case they return the partial
/// count without an error, so callers must compare the returned count with the
/// requested length. [`read_exact`] and [`write_all`] do that comparison.
pub trait MemoryRegion {
    /// Human-readable region name.
    fn name(&self) -> &str;

    /// Number of addressable bytes.
    fn length(&self) -> usize;

    /// Access granularity as seen by callers.
    fn alignment(&self) -> usize {
        1
    }

    /// The region this one is a window into, with the window's offset.
    fn parent(&self) -> Option<(&dyn MemoryRegion, usize)> {
        None
    }

    /// Transfer bytes at `addr`, returning how many were transferred.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if `addr` is not below [`MemoryRegion::length`],
    /// or any transport error.
    fn access(&self, addr: usize, op: Operation<'_>) -> Result<usize, Error>;
}

/// Fail with [`Error::OutOfRange`] unless `addr` lies inside `region`.
pub(crate) fn check_bounds(region: &dyn MemoryRegion, addr: usize) -> Result<(), Error> {
    if addr >= region.length() {
        return Err(Error::OutOfRange {
            region: region.name().to_owned(),
            addr,
            length: region.length(),
        });
    }
    Ok(())
}

/// Fill `buf` from `addr`, failing if the region stops short.
pub fn read_exact(region: &dyn MemoryRegion, addr: usize, buf: &mut [u8]) -> Result<(), Error> {
    let expected = buf.len();
    let actual = region.access(addr, Operation::Read(buf))?;
    if actual != expected {
        return Err(Error::ShortTransfer { expected, actual });
    }
    Ok(())
}

/// Write all of `buf` at `addr`, failing if the region stops short.
pub fn write_all(region: &dyn MemoryRegion, addr: usize, buf: &[u8]) -> Result<(), Error> {
    let expected = buf.len();
    let actual = region.access(addr, Operation::Write(buf))?;
    if actual != expected {
        return Err(Error::ShortTransfer { expected, actual });
    }
    Ok(())
}

/// Read a single byte.
pub fn read_byte(region: &dyn MemoryRegion, addr: usize) -> Result<u8, Error> {
    let mut buf = [0u8; 1];
    read_exact(region, addr, &mut buf)?;
    Ok(buf[0])
}

/// Write a single byte.
pub fn write_byte(region: &dyn MemoryRegion, addr: usize, value: u8) -> Result<(), Error> {
    write_all(region, addr, &[value])
}

/// Window of `length` bytes into a parent region, starting at `offset`.
///
/// The parent is borrowed, never owned.
#[derive(Debug)]
pub struct SubRegion<'a> {
    name: String,
    parent: &'a dyn MemoryRegion,
    offset: usize,
    length: usize,
}

impl<'a> SubRegion<'a> {
    /// Create a window into `parent`.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] if the window does not fit inside the parent.
    pub fn new(
        name: impl Into<String>,
        parent: &'a dyn MemoryRegion,
        offset: usize,
        length: usize,
    ) -> Result<Self, Error> {
        let end = offset.checked_add(length).unwrap_or(usize::MAX);
        if length == 0 || end > parent.length() {
            return Err(Error::OutOfRange {
                region: parent.name().to_owned(),
                addr: offset.saturating_add(length.saturating_sub(1)),
                length: parent.length(),
            });
        }
        Ok(Self {
            name: name.into(),
            parent,
            offset,
            length,
        })
    }
}

impl std::fmt::Debug for dyn MemoryRegion + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{:#x}]", self.name(), self.length())
    }
}

impl MemoryRegion for SubRegion<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn length(&self) -> usize {
        self.length
    }

    fn alignment(&self) -> usize {
        self.parent.alignment()
    }

    fn parent(&self) -> Option<(&dyn MemoryRegion, usize)> {
        Some((self.parent, self.offset))
    }

    fn access(&self, addr: usize, op: Operation<'_>) -> Result<usize, Error> {
        check_bounds(self, addr)?;
        // Clamp to the window so a long buffer cannot spill into the parent.
        let available = self.length - addr;
        let op = match op {
            Operation::Read(buf) => {
                let len = buf.len().min(available);
                Operation::Read(&mut buf[..len])
            }
            Operation::Write(buf) => Operation::Write(&buf[..buf.len().min(available)]),
        };
        self.parent.access(self.offset + addr, op)
    }
}
