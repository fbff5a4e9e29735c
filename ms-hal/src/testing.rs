//! In-memory stand-ins for devices, used by the unit tests.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::Error;
use crate::clock::Clock;
use crate::commands::REPORT_LEN;
use crate::dump::CODE_LEN;
use crate::profile::DeviceProfile;
use crate::region::{MemoryRegion, Operation, check_bounds};
use crate::trampoline::{self, TEMPLATE};

fn transport_error(message: &str) -> Error {
    Error::HidApi(hidapi::HidError::HidApiError {
        message: message.to_owned(),
    })
}

/// Clock that only moves when slept on.
#[derive(Debug, Default)]
pub(crate) struct FakeClock {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl FakeClock {
    pub(crate) fn sleeps_ms(&self) -> Vec<u64> {
        self.sleeps.iter().map(|d| d.as_millis() as u64).collect()
    }
}

impl DelayNs for FakeClock {
    fn delay_ns(&mut self, ns: u32) {
        let duration = Duration::from_nanos(ns.into());
        self.now += duration;
        self.sleeps.push(duration);
    }

    fn delay_ms(&mut self, ms: u32) {
        let duration = Duration::from_millis(ms.into());
        self.now += duration;
        self.sleeps.push(duration);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.now
    }
}

/// Plain byte vector exposed as a region.
#[derive(Debug)]
pub(crate) struct VecRegion {
    name: String,
    data: RefCell<Vec<u8>>,
}

impl VecRegion {
    pub(crate) fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_owned(),
            data: RefCell::new(data),
        }
    }

    pub(crate) fn contents(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }
}

impl MemoryRegion for VecRegion {
    fn name(&self) -> &str {
        &self.name
    }

    fn length(&self) -> usize {
        self.data.borrow().len()
    }

    fn access(&self, addr: usize, op: Operation<'_>) -> Result<usize, Error> {
        check_bounds(self, addr)?;
        let mut data = self.data.borrow_mut();
        let available = data.len() - addr;
        match op {
            Operation::Read(buf) => {
                let len = buf.len().min(available);
                buf[..len].copy_from_slice(&data[addr..addr + len]);
                Ok(len)
            }
            Operation::Write(buf) => {
                let len = buf.len().min(available);
                data[addr..addr + len].copy_from_slice(&buf[..len]);
                Ok(len)
            }
        }
    }
}

/// One completed region access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Event {
    pub(crate) region: String,
    pub(crate) write: bool,
    pub(crate) addr: usize,
    pub(crate) len: usize,
}

/// Region wrapper that appends every completed access to a shared log.
pub(crate) struct Recorder<'a> {
    inner: &'a dyn MemoryRegion,
    log: &'a RefCell<Vec<Event>>,
}

impl<'a> Recorder<'a> {
    pub(crate) fn new(inner: &'a dyn MemoryRegion, log: &'a RefCell<Vec<Event>>) -> Self {
        Self { inner, log }
    }
}

impl MemoryRegion for Recorder<'_> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn length(&self) -> usize {
        self.inner.length()
    }

    fn access(&self, addr: usize, op: Operation<'_>) -> Result<usize, Error> {
        let write = matches!(op, Operation::Write(_));
        let len = op.len();
        let transferred = self.inner.access(addr, op)?;
        self.log.borrow_mut().push(Event {
            region: self.inner.name().to_owned(),
            write,
            addr,
            len,
        });
        Ok(transferred)
    }
}

pub(crate) const SP: usize = 0x81;
pub(crate) const DPL: usize = 0x82;
pub(crate) const DPH: usize = 0x83;
pub(crate) const PSW: usize = 0xD0;
pub(crate) const ACC: usize = 0xE0;
pub(crate) const B: usize = 0xF0;
const CY: u8 = 0x80;

/// Just enough of an 8051 to run the trampoline.
///
/// Instructions come from `program`, entered at offset 0, so only
/// position-independent code runs correctly. `movc` reads code memory through
/// `code`. Internal RAM and the SFRs share the flat `data` array, which is fine
/// while the stack stays below 0x80.
pub(crate) struct Cpu<'a> {
    program: &'a [u8],
    code: &'a dyn Fn(usize) -> u8,
    xdata: &'a mut [u8],
    pub(crate) data: [u8; 256],
    pc: usize,
}

impl<'a> Cpu<'a> {
    pub(crate) fn new(
        program: &'a [u8],
        code: &'a dyn Fn(usize) -> u8,
        xdata: &'a mut [u8],
    ) -> Self {
        let mut data = [0; 256];
        data[SP] = 0x07;
        Self {
            program,
            code,
            xdata,
            data,
            pc: 0,
        }
    }

    fn fetch(&mut self) -> u8 {
        let byte = self.program[self.pc];
        self.pc += 1;
        byte
    }

    fn dptr(&self) -> usize {
        usize::from(u16::from_be_bytes([self.data[DPH], self.data[DPL]]))
    }

    fn set_dptr(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.data[DPH] = hi;
        self.data[DPL] = lo;
    }

    fn push(&mut self, value: u8) {
        self.data[SP] += 1;
        let sp = usize::from(self.data[SP]);
        self.data[sp] = value;
    }

    fn pop(&mut self) -> u8 {
        let sp = usize::from(self.data[SP]);
        self.data[SP] -= 1;
        self.data[sp]
    }

    fn jump(&mut self, rel: u8) {
        self.pc = self.pc.wrapping_add_signed(isize::from(rel as i8));
    }

    /// Run from the start of the program until it returns.
    pub(crate) fn call(&mut self) {
        let entry_sp = self.data[SP];
        for _ in 0..100_000 {
            let pc = self.pc;
            match self.fetch() {
                0x04 => self.data[ACC] = self.data[ACC].wrapping_add(1),
                0x14 => self.data[ACC] = self.data[ACC].wrapping_sub(1),
                0x22 => {
                    assert_eq!(self.data[SP], entry_sp, "unbalanced stack");
                    return;
                }
                0x24 => {
                    let imm = self.fetch();
                    let (sum, carry) = self.data[ACC].overflowing_add(imm);
                    self.data[ACC] = sum;
                    if carry {
                        self.data[PSW] |= CY;
                    } else {
                        self.data[PSW] &= !CY;
                    }
                }
                0x50 => {
                    let rel = self.fetch();
                    if self.data[PSW] & CY == 0 {
                        self.jump(rel);
                    }
                }
                0x60 => {
                    let rel = self.fetch();
                    if self.data[ACC] == 0 {
                        self.jump(rel);
                    }
                }
                0x90 => {
                    let hi = self.fetch();
                    let lo = self.fetch();
                    self.set_dptr(u16::from_be_bytes([hi, lo]));
                }
                0x93 => {
                    let addr = (usize::from(self.data[ACC]) + self.dptr()) & 0xFFFF;
                    self.data[ACC] = (self.code)(addr);
                }
                0xA3 => {
                    let next = (self.dptr() as u16).wrapping_add(1);
                    self.set_dptr(next);
                }
                0xC0 => {
                    let direct = usize::from(self.fetch());
                    let value = self.data[direct];
                    self.push(value);
                }
                0xD0 => {
                    let direct = usize::from(self.fetch());
                    let value = self.pop();
                    self.data[direct] = value;
                }
                0xD5 => {
                    let direct = usize::from(self.fetch());
                    let rel = self.fetch();
                    self.data[direct] = self.data[direct].wrapping_sub(1);
                    if self.data[direct] != 0 {
                        self.jump(rel);
                    }
                }
                0xE0 => {
                    let dptr = self.dptr();
                    self.data[ACC] = self.xdata[dptr];
                }
                0xE4 => self.data[ACC] = 0,
                0xF0 => {
                    let dptr = self.dptr();
                    self.xdata[dptr] = self.data[ACC];
                }
                0xF5 => {
                    let direct = usize::from(self.fetch());
                    self.data[direct] = self.data[ACC];
                }
                op => panic!("unhandled opcode {op:#04x} at offset {pc}"),
            }
        }
        panic!("program did not return");
    }
}

/// XDATA of a chip running firmware with a user hook, at region level.
///
/// Whenever a mailbox request arrives while the hook is armed and the
/// trampoline is in place, the chip runs the patched trampoline on [`Cpu`].
/// Code memory reads return `rom`, except for the window the trampoline is
/// loaded into, which is mapped to RAM.
pub(crate) struct SimChip {
    profile: DeviceProfile,
    config_addr: usize,
    rom: Vec<u8>,
    ram: RefCell<Vec<u8>>,
    blob: Vec<u8>,
    command_pending: Cell<bool>,
    triggers: Cell<usize>,
    stuck: Cell<bool>,
    fail_after: Cell<Option<usize>>,
}

impl SimChip {
    pub(crate) fn new(profile: DeviceProfile, config_addr: usize, rom: Vec<u8>) -> Self {
        assert_eq!(rom.len(), CODE_LEN);
        Self {
            profile,
            config_addr,
            ram: RefCell::new(rom.clone()),
            rom,
            blob: trampoline::patch(&TEMPLATE, profile.mailbox_addr),
            command_pending: Cell::new(false),
            triggers: Cell::new(0),
            stuck: Cell::new(false),
            fail_after: Cell::new(None),
        }
    }

    pub(crate) fn set_ram(&self, addr: usize, bytes: &[u8]) {
        self.ram.borrow_mut()[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    pub(crate) fn ram(&self, addr: usize, len: usize) -> Vec<u8> {
        self.ram.borrow()[addr..addr + len].to_vec()
    }

    pub(crate) fn set_stuck(&self, stuck: bool) {
        self.stuck.set(stuck);
    }

    /// Fail every access once `count` chunks have been triggered.
    pub(crate) fn fail_after_triggers(&self, count: usize) {
        self.fail_after.set(Some(count));
    }

    pub(crate) fn triggers(&self) -> usize {
        self.triggers.get()
    }

    fn hook_ready(&self, ram: &[u8]) -> bool {
        let profile = &self.profile;
        let armed = ram[self.config_addr + profile.hook_register] == profile.hook_enable;
        let load = usize::from(profile.code_load_addr);
        let installed =
            !profile.relocates_code() || ram[load..load + self.blob.len()] == self.blob[..];
        armed && installed
    }

    fn trigger(&self, ram: &mut [u8]) {
        let mailbox = usize::from(self.profile.mailbox_addr);
        if ram[mailbox] == 0 {
            return;
        }
        self.triggers.set(self.triggers.get() + 1);
        if self.stuck.get() || !self.hook_ready(ram) {
            ram[mailbox] = 0xFF;
            return;
        }
        let load = usize::from(self.profile.code_load_addr);
        let window = if self.profile.relocates_code() {
            load..load + self.blob.len()
        } else {
            0..0
        };
        let resident = ram[window.clone()].to_vec();
        let code = |addr: usize| {
            if window.contains(&addr) {
                resident[addr - window.start]
            } else {
                self.rom[addr]
            }
        };
        Cpu::new(&self.blob, &code, ram).call();
    }
}

impl MemoryRegion for SimChip {
    fn name(&self) -> &str {
        "RAM"
    }

    fn length(&self) -> usize {
        CODE_LEN
    }

    fn access(&self, addr: usize, op: Operation<'_>) -> Result<usize, Error> {
        check_bounds(self, addr)?;
        if self.fail_after.get().is_some_and(|n| self.triggers.get() >= n) {
            return Err(transport_error("device went away"));
        }
        let mut ram = self.ram.borrow_mut();
        let available = ram.len() - addr;
        match op {
            Operation::Read(buf) => {
                let len = buf.len().min(available);
                buf[..len].copy_from_slice(&ram[addr..addr + len]);
                Ok(len)
            }
            Operation::Write(buf) => {
                let len = buf.len().min(available);
                ram[addr..addr + len].copy_from_slice(&buf[..len]);
                let mailbox = usize::from(self.profile.mailbox_addr);
                if addr == mailbox + 1 {
                    self.command_pending.set(true);
                } else if addr == mailbox && len == 1 && self.command_pending.replace(false) {
                    self.trigger(&mut ram);
                }
                Ok(len)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    Nothing,
    Xdata(u16),
    Scratch(u16),
}

/// Feature-report level device: XDATA, SPI flash with a scratch buffer, and a
/// log of every report sent.
pub(crate) struct SimTransport {
    sent: RefCell<Vec<[u8; REPORT_LEN]>>,
    xdata: RefCell<Vec<u8>>,
    flash: Vec<u8>,
    page: Cell<u16>,
    pending: Cell<Pending>,
}

impl SimTransport {
    pub(crate) fn new() -> Self {
        Self::with_flash(Vec::new())
    }

    pub(crate) fn with_flash(flash: Vec<u8>) -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            xdata: RefCell::new(vec![0; 0x10000]),
            flash,
            page: Cell::new(0),
            pending: Cell::new(Pending::Nothing),
        }
    }

    pub(crate) fn sent(&self) -> Vec<[u8; REPORT_LEN]> {
        self.sent.borrow().clone()
    }
}

impl crate::transport::FeatureReport for SimTransport {
    fn send_feature_report(&self, report: &[u8; REPORT_LEN]) -> Result<(), Error> {
        self.sent.borrow_mut().push(*report);
        let addr = u16::from_be_bytes([report[1], report[2]]);
        match report {
            // GPIO direction setup; nothing to model.
            [0xB5, _, _, _, input, ..] if *input != 0 => {}
            [0xB5, _, _, value, ..] => self.xdata.borrow_mut()[usize::from(addr)] = *value,
            [0xB6, ..] => self.pending.set(Pending::Xdata(addr)),
            [0xF7, 0x01, hi, lo, ..] => self.page.set(u16::from_be_bytes([*hi, *lo])),
            [0xF7, 0x00, _, _, _, hi, lo, _] => {
                self.pending
                    .set(Pending::Scratch(u16::from_be_bytes([*hi, *lo])))
            }
            _ => return Err(transport_error("unknown command")),
        }
        Ok(())
    }

    fn get_feature_report(&self, report: &mut [u8; REPORT_LEN]) -> Result<(), Error> {
        *report = [0; REPORT_LEN];
        match self.pending.replace(Pending::Nothing) {
            Pending::Nothing => return Err(transport_error("nothing to read")),
            Pending::Xdata(addr) => report[4] = self.xdata.borrow()[usize::from(addr)],
            Pending::Scratch(offset) => {
                let base = usize::from(self.page.get()) * 256;
                let offset = usize::from(offset);
                let len = (REPORT_LEN - 1).min(256 - offset);
                let start = base + offset;
                report[1..1 + len].copy_from_slice(&self.flash[start..start + len]);
            }
        }
        Ok(())
    }
}
