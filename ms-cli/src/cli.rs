use std::path::PathBuf;

use crate::util;

use clap::{Args, Parser, ValueEnum};
use ms_hal::{ChipVariant, InterfaceMatch, SearchCriteria};

/// CLI for MacroSilicon MS2106/MS2107/MS2109/MS2130 USB bridge chips
///
/// Reads XDATA memory and external SPI flash through the stock firmware, and
/// dumps the 64KiB code memory by temporarily injecting a copy stub into RAM.
///
/// Devices are found by vendor and product ID. If nothing answers to the
/// primary vendor ID, the alternate one is tried; pass --vid2 0 to disable
/// that. Use --serial, --path, --interface or --usage-page to pick one device
/// or interface when several are present.
#[derive(Debug, Parser)]
#[command(version, about)]
pub(crate) struct Cli {
    /// Device vendor ID in hexadecimal
    #[arg(long = "vid", default_value = "0x534D", value_parser = util::u16_from_hex)]
    pub(crate) vid: u16,
    /// Alternate vendor ID in hexadecimal, tried when the first finds nothing
    #[arg(long = "vid2", default_value = "0x345F", value_parser = util::u16_from_hex)]
    pub(crate) vid2: u16,
    /// Device product ID in hexadecimal
    #[arg(long = "pid", default_value = "0x2109", value_parser = util::u16_from_hex)]
    pub(crate) pid: u16,
    /// Only use the device with this serial number
    #[arg(long)]
    pub(crate) serial: Option<String>,
    /// Only use the device at this HID path
    #[arg(long)]
    pub(crate) path: Option<String>,
    /// Only use this USB interface number
    #[arg(long, conflicts_with = "usage_page")]
    pub(crate) interface: Option<i32>,
    /// Only use interfaces with this HID usage page, in hexadecimal
    #[arg(long, value_parser = util::u16_from_hex)]
    pub(crate) usage_page: Option<u16>,
    /// More output; repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

impl Cli {
    pub(crate) fn criteria(&self) -> SearchCriteria {
        let interface = match (self.interface, self.usage_page) {
            (Some(n), _) => InterfaceMatch::Interface(n),
            (None, Some(page)) => InterfaceMatch::UsagePage(page),
            (None, None) => InterfaceMatch::Any,
        };
        SearchCriteria {
            vendor_id: self.vid,
            alternate_vendor_id: (self.vid2 != 0).then_some(self.vid2),
            product_id: self.pid,
            serial: self.serial.clone(),
            path: self.path.clone(),
            interface,
        }
    }
}

#[derive(Debug, Parser)]
pub(crate) enum Commands {
    /// List matching devices.
    ListDev,
    /// List the memory regions of the device.
    ListRegions(DeviceArgs),
    /// Read memory and print a hex dump.
    Read {
        region: Region,
        /// Start address in hexadecimal
        #[arg(value_parser = util::usize_from_hex)]
        addr: usize,
        /// Number of bytes, in hexadecimal
        #[arg(value_parser = util::usize_from_hex, default_value = "0x100")]
        len: usize,
    },
    /// Write bytes to RAM.
    Write {
        /// Start address in hexadecimal
        #[arg(value_parser = util::usize_from_hex)]
        addr: usize,
        /// Bytes to write, in hexadecimal
        #[arg(value_parser = util::u8_from_hex, required = true)]
        values: Vec<u8>,
    },
    /// Write the contents of a file to RAM.
    WriteFile {
        /// Start address in hexadecimal
        #[arg(value_parser = util::usize_from_hex)]
        addr: usize,
        /// Input file
        file: PathBuf,
    },
    /// Read the SPI flash into a file.
    ReadFlash {
        /// Output file
        file: PathBuf,
        /// Start address in hexadecimal
        #[arg(long, value_parser = util::usize_from_hex, default_value = "0")]
        addr: usize,
        /// Number of bytes, in hexadecimal
        #[arg(long, value_parser = util::usize_from_hex, default_value = "0x10000")]
        len: usize,
    },
    /// Dump code memory to a file by injecting a copy stub.
    ///
    /// The device's hook configuration and the RAM the stub displaces are
    /// restored afterwards. If the dump fails part way, the device may be left
    /// with the stub installed; power-cycle it in that case.
    DumpRom(DumpRomArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum Region {
    Ram,
    Flash,
}

#[derive(Debug, Parser)]
pub(crate) struct DumpRomArgs {
    /// Output file
    pub(crate) file: PathBuf,
    #[command(flatten)]
    pub(crate) device: DeviceArgs,
}

// What the stock firmware cannot report about itself.
#[derive(Debug, Args)]
pub(crate) struct DeviceArgs {
    /// Chip family
    #[arg(long, default_value = "ms2109")]
    pub(crate) chip: Chip,
    /// Address of the firmware's user configuration block in RAM, in hexadecimal
    #[arg(long, value_parser = util::usize_from_hex)]
    pub(crate) config_addr: usize,
    /// Length of the user configuration block, in hexadecimal
    #[arg(long, value_parser = util::usize_from_hex, default_value = "0x20")]
    pub(crate) config_len: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum Chip {
    Ms2106,
    Ms2107,
    Ms2109,
    Ms2130,
}

impl From<Chip> for ChipVariant {
    fn from(value: Chip) -> ChipVariant {
        match value {
            Chip::Ms2106 => ChipVariant::Ms2106,
            Chip::Ms2107 => ChipVariant::Ms2107,
            Chip::Ms2109 => ChipVariant::Ms2109,
            Chip::Ms2130 => ChipVariant::Ms2130,
        }
    }
}
