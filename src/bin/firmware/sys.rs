//! System/device glue for the firmware binary: logging, panic handler,
//! RP2040 second-stage boot loader.

/// defmt RTT logger (link-time side effects)
use defmt_rtt as _;

/// Panic handler: print via defmt/RTT before halting.
use panic_probe as _;

/// Second-stage boot loader the RP2040's boot ROM expects at the start of
/// flash, matching the QSPI flash chip these boards ship with.
#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

/// Optional: any runtime init hooks you want.
/// (You can also leave this empty and just `use sys as _;` in main.)
pub fn init() {
    // If you ever need to init heap, global alloc, etc., do it here.
}

// End of File
