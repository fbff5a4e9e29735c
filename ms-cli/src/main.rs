use anyhow::Context;
use clap::Parser;
use hidapi::HidApi;
use ms_hal::{SystemClock, locator};

use cli::Commands;

mod cli;
mod dump;
mod memory;
mod progress;
mod util;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut api = HidApi::new().context("initialising hidapi")?;
    let mut clock = SystemClock::new();
    let criteria = cli.criteria();

    if let Commands::ListDev = cli.command {
        for descriptor in locator::list(&mut api, &mut clock, &criteria)? {
            println!("{descriptor}");
            println!("\tManufacturer {}", descriptor.manufacturer.as_deref().unwrap_or(""));
            println!("\tProduct      {}", descriptor.product.as_deref().unwrap_or(""));
            println!("\tSerial       {}", descriptor.serial.as_deref().unwrap_or(""));
        }
        return Ok(());
    }

    let device = locator::open_first(&mut api, &mut clock, &criteria)
        .context("opening device")?;
    match cli.command {
        Commands::ListDev => {}
        Commands::ListRegions(args) => memory::list_regions(&device, &args)?,
        Commands::Read { region, addr, len } => memory::read(&device, region, addr, len)?,
        Commands::Write { addr, values } => memory::write(&device, addr, &values)?,
        Commands::WriteFile { addr, file } => memory::write_file(&device, addr, &file)?,
        Commands::ReadFlash { file, addr, len } => memory::read_flash(&device, &file, addr, len)?,
        Commands::DumpRom(args) => dump::action(&device, &mut clock, args)?,
    }
    Ok(())
}
