//! Supported chip families and their code-dump constants.

use std::fmt;

use crate::Error;

/// Largest chunk the mailbox can request. The chunk length travels in the
/// ready byte, and zero there means no request.
pub const MAX_CHUNK_LEN: usize = 255;

/// MacroSilicon chip families supported by the code dumper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipVariant {
    /// MS2106
    Ms2106,
    /// MS2107
    Ms2107,
    /// MS2109
    Ms2109,
    /// MS2130
    Ms2130,
}

impl ChipVariant {
    /// Every supported variant, in model-number order.
    pub const ALL: [ChipVariant; 4] = [Self::Ms2106, Self::Ms2107, Self::Ms2109, Self::Ms2130];

    /// Model name as it appears in device-type strings.
    pub fn model(self) -> &'static str {
        match self {
            ChipVariant::Ms2106 => "MS2106",
            ChipVariant::Ms2107 => "MS2107",
            ChipVariant::Ms2109 => "MS2109",
            ChipVariant::Ms2130 => "MS2130",
        }
    }

    /// Identify the chip from a free-form device-type string reported by a HAL.
    ///
    /// The HAL reports strings such as `"MS2109 (EEPROM firmware)"`, so this
    /// searches for the model name anywhere in the text.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDeviceVariant`] if no supported model name is present.
    pub fn from_device_type(device_type: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|variant| device_type.contains(variant.model()))
            .ok_or_else(|| Error::UnknownDeviceVariant(device_type.to_owned()))
    }

    /// Code-dump constants for this chip.
    pub fn profile(self) -> DeviceProfile {
        match self {
            ChipVariant::Ms2106 => DeviceProfile {
                mailbox_addr: 0xCF10,
                temp_buffer_addr: 0xCD00,
                temp_buffer_len: 256,
                code_load_addr: 0xC4A0,
                hook_register: 9,
                hook_enable: 0x96,
            },
            ChipVariant::Ms2107 => DeviceProfile {
                mailbox_addr: 0xD000,
                temp_buffer_addr: 0xD100,
                temp_buffer_len: 256,
                code_load_addr: 0xC800,
                hook_register: 8,
                hook_enable: 0x01,
            },
            ChipVariant::Ms2109 => DeviceProfile {
                mailbox_addr: 0xCBF0,
                temp_buffer_addr: 0xD300,
                temp_buffer_len: 256,
                code_load_addr: 0xCC20,
                hook_register: 4,
                hook_enable: 1 << 2,
            },
            // No code relocation on the MS2130.
            ChipVariant::Ms2130 => DeviceProfile {
                mailbox_addr: 0x7C00,
                temp_buffer_addr: 0x7D00,
                temp_buffer_len: 256,
                code_load_addr: 0,
                hook_register: 8,
                hook_enable: 0x01,
            },
        }
    }
}

impl fmt::Display for ChipVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model())
    }
}

/// Fixed addresses and values the code dumper needs for one chip family.
///
/// Addresses other than `hook_register` are in XDATA. `hook_register` is an
/// offset into the user configuration block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Ready/ack byte of the mailbox. The 4-byte command follows it.
    pub mailbox_addr: u16,
    /// Staging buffer the trampoline copies code bytes into.
    pub temp_buffer_addr: u16,
    /// Usable length of the staging buffer, at most 256.
    pub temp_buffer_len: usize,
    /// Where the trampoline is written. Zero means no relocation is performed.
    pub code_load_addr: u16,
    /// Offset of the hook enable register in the user configuration block.
    pub hook_register: usize,
    /// Value written to the hook register to arm the hook.
    pub hook_enable: u8,
}

impl DeviceProfile {
    /// Bytes copied per mailbox round-trip.
    ///
    /// This is the staging buffer length, capped at [`MAX_CHUNK_LEN`] and at the
    /// distance to the next 256-byte boundary, so one chunk never crosses a page
    /// of XDATA. A 256-byte staging buffer is therefore filled 255 bytes at a
    /// time.
    pub fn working_buffer_len(&self) -> usize {
        let to_boundary = 1 + usize::from(0xFF - (self.temp_buffer_addr & 0xFF));
        self.temp_buffer_len.min(MAX_CHUNK_LEN).min(to_boundary)
    }

    /// Returns true if the trampoline has to be written into RAM.
    pub fn relocates_code(&self) -> bool {
        self.code_load_addr != 0
    }
}
