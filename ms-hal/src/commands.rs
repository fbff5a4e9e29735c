use bit_field::BitField;

/// Length of every feature report exchanged with the chip, excluding the report ID.
pub const REPORT_LEN: usize = 8;

/// Commands understood by the stock firmware of the MacroSilicon bridge chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MsCommand {
    /// Write one byte of XDATA (RAM and memory-mapped registers).
    WriteXdata { addr: u16, value: u8 },
    /// Read one byte of XDATA. The value comes back in byte 4 of the response.
    ReadXdata { addr: u16 },
    /// Set GPIO direction. Both arguments are pin bitmasks.
    ///
    /// Shares its opcode with [`MsCommand::WriteXdata`]; the firmware tells them
    /// apart by the layout of the remaining bytes.
    ConfigureGpio { output: u8, input: u8 },
    /// Copy `len` bytes of SPI flash starting at `page * 256` into the scratch buffer.
    FlashLoadPage { page: u16, len: u16 },
    /// Return bytes from the scratch buffer starting at `offset`.
    FlashReadScratch { offset: u16 },
}

impl MsCommand {
    fn opcode(&self) -> [u8; 2] {
        match self {
            MsCommand::WriteXdata { .. } | MsCommand::ConfigureGpio { .. } => [0xB5, 0x00],
            MsCommand::ReadXdata { .. } => [0xB6, 0x00],
            MsCommand::FlashLoadPage { .. } => [0xF7, 0x01],
            MsCommand::FlashReadScratch { .. } => [0xF7, 0x00],
        }
    }
}

/// Outgoing feature report.
pub(crate) struct Report {
    pub(crate) buffer: [u8; REPORT_LEN],
}

impl Report {
    pub(crate) fn new(command: MsCommand) -> Self {
        let mut buf = [0u8; REPORT_LEN];
        let [opcode, sub_opcode] = command.opcode();
        buf[0] = opcode;
        match command {
            MsCommand::WriteXdata { addr, value } => {
                buf[1..3].copy_from_slice(&addr.to_be_bytes());
                buf[3] = value;
            }
            MsCommand::ReadXdata { addr } => {
                buf[1..3].copy_from_slice(&addr.to_be_bytes());
            }
            MsCommand::ConfigureGpio { output, input } => {
                buf[1] = output;
                buf[3] = output;
                buf[4] = input;
            }
            MsCommand::FlashLoadPage { page, len } => {
                buf[1] = sub_opcode;
                buf[2..4].copy_from_slice(&page.to_be_bytes());
                buf[5..7].copy_from_slice(&len.to_be_bytes());
            }
            MsCommand::FlashReadScratch { offset } => {
                buf[1] = sub_opcode;
                buf[5..7].copy_from_slice(&offset.to_be_bytes());
            }
        }
        Self { buffer: buf }
    }
}

/// Build a pin bitmask from a list of GPIO numbers.
pub(crate) fn pin_mask(pins: &[usize]) -> u8 {
    let mut mask = 0u8;
    for &pin in pins {
        mask.set_bit(pin, true);
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xdata_write_layout() {
        let report = Report::new(MsCommand::WriteXdata {
            addr: 0xF01F,
            value: 0x10,
        });
        assert_eq!(report.buffer, [0xB5, 0xF0, 0x1F, 0x10, 0, 0, 0, 0]);
    }

    #[test]
    fn flash_load_page_layout() {
        let report = Report::new(MsCommand::FlashLoadPage {
            page: 0x0102,
            len: 256,
        });
        assert_eq!(report.buffer, [0xF7, 0x01, 0x01, 0x02, 0, 0x01, 0x00, 0]);
    }

    #[test]
    fn flash_read_scratch_layout() {
        let report = Report::new(MsCommand::FlashReadScratch { offset: 0xFA });
        assert_eq!(report.buffer, [0xF7, 0x00, 0, 0, 0, 0x00, 0xFA, 0]);
    }

    #[test]
    fn gpio_layout() {
        let output = pin_mask(&[2, 3, 4]);
        let input = pin_mask(&[5]);
        assert_eq!(output, 0x1C);
        assert_eq!(input, 0x20);
        let report = Report::new(MsCommand::ConfigureGpio { output, input });
        assert_eq!(report.buffer, [0xB5, 0x1C, 0, 0x1C, 0x20, 0, 0, 0]);
    }
}
