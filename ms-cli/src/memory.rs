use std::path::Path;

use anyhow::{Context, bail};
use ms_hal::region::{read_exact, write_all};
use ms_hal::{FeatureReport, FlashRegion, Hal, MemoryRegion, ProgressCallbacks, RamRegion};

use crate::cli::{DeviceArgs, Region};
use crate::dump::stock_hal;
use crate::progress::Progress;
use crate::util::hexdump;

const FLASH_CHUNK: usize = 0x1000;

fn check_range(region: &dyn MemoryRegion, addr: usize, len: usize) -> anyhow::Result<()> {
    if addr.checked_add(len).is_none_or(|end| end > region.length()) {
        bail!(
            "{addr:#x}+{len:#x} is outside {} (length {:#x})",
            region.name(),
            region.length()
        );
    }
    Ok(())
}

/// One line per region: name, length, alignment and where it sits in its parent.
fn describe(region: &dyn MemoryRegion) -> String {
    let mut line = format!(
        "{:<12} length {:#07x}  alignment {}",
        region.name(),
        region.length(),
        region.alignment()
    );
    if let Some((parent, offset)) = region.parent() {
        line.push_str(&format!("  in {} at {offset:#06x}", parent.name()));
    }
    line
}

pub(crate) fn list_regions(
    device: &impl FeatureReport,
    args: &DeviceArgs,
) -> anyhow::Result<()> {
    let ram = RamRegion::new(device);
    let flash = FlashRegion::new(device);
    let hal = stock_hal(&ram, args)?.with_flash(&flash);
    println!("{}", hal.device_type());
    for (_, region) in hal.regions() {
        println!("  {}", describe(region));
    }
    Ok(())
}

pub(crate) fn read(
    device: &impl FeatureReport,
    which: Region,
    addr: usize,
    len: usize,
) -> anyhow::Result<()> {
    let ram = RamRegion::new(device);
    let flash = FlashRegion::new(device);
    let region: &dyn MemoryRegion = match which {
        Region::Ram => &ram,
        Region::Flash => &flash,
    };
    check_range(region, addr, len)?;

    let mut buf = vec![0u8; len];
    read_exact(region, addr, &mut buf)
        .with_context(|| format!("reading {len:#x} bytes of {}", region.name()))?;
    print!("{}", hexdump(addr, &buf));
    Ok(())
}

pub(crate) fn write(device: &impl FeatureReport, addr: usize, values: &[u8]) -> anyhow::Result<()> {
    let ram = RamRegion::new(device);
    check_range(&ram, addr, values.len())?;
    write_all(&ram, addr, values).with_context(|| format!("writing RAM at {addr:#06x}"))?;
    log::info!("wrote {} bytes at {addr:#06x}", values.len());
    Ok(())
}

pub(crate) fn write_file(
    device: &impl FeatureReport,
    addr: usize,
    file: &Path,
) -> anyhow::Result<()> {
    let data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    write(device, addr, &data)
}

pub(crate) fn read_flash(
    device: &impl FeatureReport,
    file: &Path,
    addr: usize,
    len: usize,
) -> anyhow::Result<()> {
    let flash = FlashRegion::new(device);
    check_range(&flash, addr, len)?;

    let mut data = vec![0u8; len];
    let mut progress = Progress::new("Read complete");
    progress.init(len);
    let mut offset = 0;
    while offset < len {
        let chunk = FLASH_CHUNK.min(len - offset);
        read_exact(&flash, addr + offset, &mut data[offset..offset + chunk])
            .with_context(|| format!("reading flash at {:#06x}", addr + offset))?;
        offset += chunk;
        progress.update(offset);
    }
    progress.finish();

    std::fs::write(file, &data).with_context(|| format!("writing {}", file.display()))?;
    println!("Wrote {} bytes to {}", data.len(), file.display());
    Ok(())
}
