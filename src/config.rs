//! Compile-time configuration: timeouts, queue bounds, heat pump model.
//!
//! One flat module of constants rather than scattered magic numbers, so
//! every other module names a timing or sizing constant instead of a
//! literal.

/// 2400 baud, 8 data bits, even parity, 1 stop bit.
pub const SERIAL_BAUD: u32 = 2400;

/// Minimum bytes in the UART RX FIFO before the sniffer bothers draining it.
pub const SERIAL_MIN_AVAILABLE: usize = 2;

/// Maximum valid frame is 45 bytes, ~189ms transmit time at 2400 baud 8E1;
/// this is the "nothing arrived, flush what we have" timeout.
pub const SERIAL_READ_TIMEOUT_MS: u32 = 190;

/// Intra-byte pause used only by the legacy blocking `synchronous_request` path.
pub const BYTE_DELAY_MS: u32 = 5;

/// Completed-but-undispatched sniffed frames are capped here; oldest dropped.
pub const SNIFFED_FRAMES_LIMIT: usize = 64;

/// Capacity of the rolling RX byte buffer the sniffer accumulates into.
/// Sized for a couple of fused max-length (45 byte) frames.
pub const RX_BUFFER_CAP: usize = 128;

/// Outbound command queue bound.
pub const CMD_QUEUE_SIZE: usize = 10;

/// Sensor-name request queue bound, a generous ceiling so normal use
/// (polling the whole catalog at once) never hits it.
pub const REQUEST_QUEUE_CAP: usize = 48;

/// Sensor reading map capacity. Must be a power of two (heapless `IndexMap`
/// requirement); the catalog has ~30 entries.
pub const SENSOR_MAP_CAP: usize = 64;

/// Completed frames that the classifier didn't recognize as a status, ACK,
/// or data-response frame (heartbeats, frame types this port doesn't decode)
/// wait here for the host to drain via `Engine::take_next_frame`.
pub const NEXT_FRAME_QUEUE_CAP: usize = 16;

/// Response + heartbeat transmit time; a data request is considered overdue
/// after this many milliseconds without a response.
pub const REQUEST_TIMEOUT_MS: u32 = 135;
/// Twice the shortest valid frame's transmit time; minimum spacing between
/// a reply/no-reply and the next outgoing request.
pub const REQUEST_DELAY_MS: u32 = 110;
pub const REQUEST_RETRIES: u8 = 3;

pub const CMD_TIMEOUT_MS: u32 = 1000;
pub const CMD_RETRIES: u8 = 2;

/// Default sensor poll set a host typically enqueues on a schedule.
pub const DEFAULT_POLL_SET: &[&str] = &[
    "tc", "twi", "two", "tho", "wf", "lps", "te", "to", "td", "ts", "tl", "cmp", "fan1", "pmv",
    "hps",
];

pub const MIN_COOLING_TEMP: i8 = 7; // 7-20, default 7
pub const MAX_COOLING_TEMP: i8 = 25; // 18-30, default 25
pub const MIN_HEATING_TEMP: i8 = 20; // 20-37, default 20
pub const MIN_HOT_WATER_TEMP: i8 = 40; // 40-60, default 40
pub const MAX_HOT_WATER_TEMP: i8 = 75; // 60-80, default 75

/// Max heating setpoint depends on the unit's power class: 55C for 4-6kW
/// units, 65C for 8-11kW units. Selected at compile time via Cargo feature
/// (`model-4-6kw` / `model-8-11kw`).
#[cfg(feature = "model-4-6kw")]
pub const MAX_HEATING_TEMP: i8 = 55;
#[cfg(not(feature = "model-4-6kw"))]
pub const MAX_HEATING_TEMP: i8 = 65;

/// Known firmware collapses every cooling setpoint to the minimum because
/// its clamp is called with matching low and high bounds. Whether that is
/// intentional (a deliberately fixed cooling setpoint) or a transcription
/// bug is undecided upstream, so the choice is a build-time flag rather
/// than a silent fix; see DESIGN.md for the default.
pub enum CoolingClampMode {
    /// Reproduce the known firmware's behavior bit-for-bit.
    FirmwareBug,
    /// Use the apparently-intended `MIN_COOLING_TEMP..MAX_COOLING_TEMP` range.
    Corrected,
}

pub const COOLING_CLAMP_MODE: CoolingClampMode = CoolingClampMode::FirmwareBug;
