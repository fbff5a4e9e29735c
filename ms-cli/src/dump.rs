use anyhow::Context;
use ms_hal::{ChipVariant, Clock, FeatureReport, MemoryRegion, RamRegion, StockHal, dump_rom};

use crate::cli::{DeviceArgs, DumpRomArgs};
use crate::progress::Progress;

/// HAL for the chip named on the command line, over `ram`.
pub(crate) fn stock_hal<'a>(
    ram: &'a dyn MemoryRegion,
    args: &DeviceArgs,
) -> anyhow::Result<StockHal<'a>> {
    let variant = ChipVariant::from(args.chip);
    StockHal::new(variant.model(), ram, args.config_addr, args.config_len)
        .context("placing the user configuration block")
}

pub(crate) fn action(
    device: &impl FeatureReport,
    clock: &mut dyn Clock,
    args: DumpRomArgs,
) -> anyhow::Result<()> {
    let ram = RamRegion::new(device);
    let hal = stock_hal(&ram, &args.device)?;

    let mut progress = Progress::new("Dump complete");
    let code = dump_rom(&hal, clock, Some(&mut progress)).context("dumping code memory")?;
    if code.is_empty() {
        log::warn!("RAM at the load address could not be read, nothing was dumped");
        return Ok(());
    }

    std::fs::write(&args.file, &code)
        .with_context(|| format!("writing {}", args.file.display()))?;
    println!("Wrote {} bytes to {}", code.len(), args.file.display());
    Ok(())
}
