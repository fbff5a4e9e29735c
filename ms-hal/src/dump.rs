//! Code memory dump through an injected trampoline.
//!
//! None of the supported chips can read code memory over USB. Instead, a small
//! copy stub is written into RAM and one of the firmware's user hooks is pointed
//! at it. The host then drives the stub through a mailbox in XDATA: it writes a
//! source and staging address, sets the ready byte to the chunk length, waits
//! for the stub to clear it, and reads the staging buffer back.
//!
//! The device runs the stub on its own schedule while the hook is armed. If the
//! dump fails part way, [`CodeDumper::dump`] makes a best-effort attempt to
//! disarm the hook and put the original code and configuration back, but there
//! is no way to guarantee that over a link that has just failed. A device can
//! be left with the stub installed and the hook armed.

use std::time::Duration;

use crate::Error;
use crate::clock::Clock;
use crate::profile::DeviceProfile;
use crate::progress::ProgressCallbacks;
use crate::region::{MemoryRegion, read_byte, read_exact, write_all, write_byte};
use crate::trampoline::{self, TEMPLATE};

/// Size of the 8051 code address space.
pub const CODE_LEN: usize = 0x10000;

/// Wait before overwriting RAM so the CPU has left the area.
const SETTLE_BEFORE_PATCH_MS: u32 = 1000;
/// Wait after disarming the hook before restoring the original code.
const SETTLE_BEFORE_RESTORE_MS: u32 = 25;
const POLL_INTERVAL_MS: u32 = 20;
const ACK_TIMEOUT: Duration = Duration::from_millis(500);

/// What the dump has changed on the device so far.
#[derive(Debug, Default)]
struct DeviceChanges {
    /// Configuration block as it was before being zeroed.
    config_old: Option<Vec<u8>>,
    /// RAM contents displaced by the trampoline.
    code_orig: Option<Vec<u8>>,
    hook_armed: bool,
}

/// Dumps the 64KiB code space of a running chip.
#[derive(Debug)]
pub struct CodeDumper<'a> {
    ram: &'a dyn MemoryRegion,
    config: &'a dyn MemoryRegion,
    profile: DeviceProfile,
}

impl<'a> CodeDumper<'a> {
    /// Create a dumper over the device's RAM and user configuration regions.
    pub fn new(
        ram: &'a dyn MemoryRegion,
        config: &'a dyn MemoryRegion,
        profile: DeviceProfile,
    ) -> Self {
        Self {
            ram,
            config,
            profile,
        }
    }

    /// Run the whole dump and return the 65536-byte code image.
    ///
    /// If the RAM that the trampoline would overwrite cannot be read, nothing is
    /// injected and an empty image is returned without an error.
    ///
    /// # Errors
    ///
    /// Any transport or region error aborts the dump and is returned unchanged,
    /// as is [`Error::PatchTimeout`] if the device does not acknowledge a chunk
    /// within 500ms. Device state is restored on a best-effort basis first, and
    /// `progress` is finished.
    pub fn dump(
        &self,
        clock: &mut dyn Clock,
        mut progress: Option<&mut dyn ProgressCallbacks>,
    ) -> Result<Vec<u8>, Error> {
        let mut changes = DeviceChanges::default();
        match self.run(&mut changes, clock, progress.as_mut().map(|p| &mut **p as _)) {
            Ok(Some(code)) => Ok(code),
            Ok(None) => {
                self.recover(&changes, clock);
                Ok(Vec::new())
            }
            Err(err) => {
                log::warn!("code dump failed: {err}");
                if let Some(progress) = progress {
                    progress.finish();
                }
                self.recover(&changes, clock);
                Err(err)
            }
        }
    }

    fn run(
        &self,
        changes: &mut DeviceChanges,
        clock: &mut dyn Clock,
        mut progress: Option<&mut dyn ProgressCallbacks>,
    ) -> Result<Option<Vec<u8>>, Error> {
        let profile = &self.profile;
        let mailbox = usize::from(profile.mailbox_addr);
        let load = usize::from(profile.code_load_addr);
        let blob = trampoline::patch(&TEMPLATE, profile.mailbox_addr);
        let chunk_len = profile.working_buffer_len();

        let mut config_old = vec![0u8; self.config.length()];
        read_exact(self.config, 0, &mut config_old)?;

        // Zeroing the config disables every hook, so only ours gets armed below.
        let config_new = vec![0u8; config_old.len()];
        changes.config_old = Some(config_old);
        write_all(self.config, 0, &config_new)?;

        // Nothing may look like a pending request before the stub exists.
        write_byte(self.ram, mailbox, 0)?;

        let mut orig = Vec::new();
        if profile.relocates_code() {
            orig = vec![0u8; blob.len()];
            if let Err(err) = read_exact(self.ram, load, &mut orig) {
                log::warn!("cannot read RAM at {load:#06x} ({err}), not injecting");
                return Ok(None);
            }
        }

        clock.delay_ms(SETTLE_BEFORE_PATCH_MS);

        if profile.relocates_code() {
            log::info!("writing {} byte trampoline to {load:#06x}", blob.len());
            changes.code_orig = Some(orig.clone());
            write_all(self.ram, load, &blob)?;
        }

        changes.hook_armed = true;
        write_byte(self.config, profile.hook_register, profile.hook_enable)?;

        let mut code = vec![0u8; CODE_LEN];
        if let Some(progress) = progress.as_deref_mut() {
            progress.init(CODE_LEN);
        }

        let [temp_hi, temp_lo] = profile.temp_buffer_addr.to_be_bytes();
        let temp = usize::from(profile.temp_buffer_addr);
        let mut addr = 0;
        while addr < CODE_LEN {
            let len = chunk_len.min(CODE_LEN - addr);
            let [addr_hi, addr_lo] = (addr as u16).to_be_bytes();
            write_all(self.ram, mailbox + 1, &[addr_hi, addr_lo, temp_hi, temp_lo])?;
            write_byte(self.ram, mailbox, len as u8)?;
            self.wait_for_ack(clock)?;
            read_exact(self.ram, temp, &mut code[addr..addr + len])?;

            addr += len;
            log::debug!("dumping code: {addr} bytes read");
            if let Some(progress) = progress.as_deref_mut() {
                progress.update(addr);
            }
        }
        if let Some(progress) = progress.as_deref_mut() {
            progress.finish();
        }

        write_byte(self.config, profile.hook_register, 0)?;
        changes.hook_armed = false;

        clock.delay_ms(SETTLE_BEFORE_RESTORE_MS);

        if let Some(orig) = changes.code_orig.take() {
            // The stub shows up in the dump wherever it was loaded. This swaps
            // every copy of it for the displaced bytes, wherever it occurs.
            code = trampoline::replace_all(&code, &blob, &orig);
            if let Err(err) = write_all(self.ram, load, &orig) {
                changes.code_orig = Some(orig);
                return Err(err);
            }
        }

        if let Some(config_old) = changes.config_old.take() {
            write_all(self.config, 0, &config_old)?;
        }
        log::info!("code dump complete");
        Ok(Some(code))
    }

    /// Poll the mailbox ready byte until the device clears it.
    fn wait_for_ack(&self, clock: &mut dyn Clock) -> Result<(), Error> {
        let mailbox = usize::from(self.profile.mailbox_addr);
        let deadline = clock.now() + ACK_TIMEOUT;
        loop {
            if read_byte(self.ram, mailbox)? == 0 {
                return Ok(());
            }
            if clock.now() > deadline {
                return Err(Error::PatchTimeout);
            }
            clock.delay_ms(POLL_INTERVAL_MS);
        }
    }

    /// Undo whatever `changes` records, logging rather than returning failures.
    fn recover(&self, changes: &DeviceChanges, clock: &mut dyn Clock) {
        if changes.hook_armed {
            if let Err(err) = write_byte(self.config, self.profile.hook_register, 0) {
                log::warn!("could not disarm hook: {err}");
            }
            clock.delay_ms(SETTLE_BEFORE_RESTORE_MS);
        }
        if let Some(orig) = &changes.code_orig {
            let load = usize::from(self.profile.code_load_addr);
            if let Err(err) = write_all(self.ram, load, orig) {
                log::warn!("could not restore code at {load:#06x}: {err}");
            }
        }
        if let Some(config_old) = &changes.config_old {
            if let Err(err) = write_all(self.config, 0, config_old) {
                log::warn!("could not restore user config: {err}");
            }
        }
    }
}
