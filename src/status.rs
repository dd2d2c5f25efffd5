//! Status and status-update frame decoding.
//!
//! Two incoming shapes share a decode routine: the 31-byte `Status`
//! broadcast (every ~30 minutes, carries the secondary/previous target
//! temperatures and defrost/night-active flags) and the 21-byte `Update`
//! broadcast (every ~30s, the same leading fields without the secondary
//! targets, defrost/night-active flags at a different offset).
//! `decode_status` picks the expected shape from the buffer's length.

use crate::error::FrameCheck;
use crate::frame::{data_type, frame_len, Frame, FrameType};

/// Decoded contents of a status or status-update frame.
///
/// When `error` is not `FrameCheck::Ok` every other field is zeroed; check
/// `error` before reading them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct StatusData {
    pub error: FrameCheck,
    pub extended_data: bool,
    pub operation_mode: u8,
    pub cooling: bool,
    pub heating: bool,
    pub hot_water: bool,
    pub auto_mode: bool,
    pub quiet_mode: bool,
    pub night_mode: bool,
    pub backup_heater: bool,
    pub cooling_cmp: bool,
    pub heating_cmp: bool,
    pub hot_water_heater: bool,
    pub hot_water_cmp: bool,
    pub pump1: bool,
    pub hot_water_target: i8,
    pub zone1_target: i8,
    pub zone2_target: i8,
    pub hot_water_target2: i8,
    pub zone1_target2: i8,
    pub zone2_target2: i8,
    pub defrost_in_progress: bool,
    pub night_mode_active: bool,
}

impl StatusData {
    pub(crate) const fn errored(error: FrameCheck) -> Self {
        StatusData {
            error,
            extended_data: false,
            operation_mode: 0,
            cooling: false,
            heating: false,
            hot_water: false,
            auto_mode: false,
            quiet_mode: false,
            night_mode: false,
            backup_heater: false,
            cooling_cmp: false,
            heating_cmp: false,
            hot_water_heater: false,
            hot_water_cmp: false,
            pump1: false,
            hot_water_target: 0,
            zone1_target: 0,
            zone2_target: 0,
            hot_water_target2: 0,
            zone1_target2: 0,
            zone2_target2: 0,
            defrost_in_progress: false,
            night_mode_active: false,
        }
    }
}

/// `byte / 2 - 16`, the target-temperature encoding shared with `commands`.
fn decode_temp(byte: u8) -> i8 {
    (byte as i16 / 2 - 16) as i8
}

/// Decode a status or status-update frame. `buf`'s length picks which of
/// the two shapes is expected (31 bytes: `STATUS`; 21 bytes: anything
/// else, checked against `UPDATE`).
pub fn decode_status(buf: &[u8]) -> StatusData {
    let long_frame = buf.len() == frame_len::STATUS as usize;
    let expected_type = if long_frame {
        FrameType::Status
    } else {
        FrameType::Update
    };
    let frame = Frame::from_slice(buf);
    let error = frame.check_frame(expected_type as u8, data_type::STATUS);
    if !error.is_ok() {
        return StatusData::errored(error);
    }

    let b = frame.as_bytes();
    let operation_mode = (b[11] & 0xe0) >> 5;
    let cooling = (b[11] & 0xa1) == 0xa1;
    let heating = (b[11] & 0xc1) == 0xc1;
    let hot_water = (b[11] & 0x02) >> 1 == 0x01;
    let auto_mode = (b[12] & 0x04) >> 2 == 0x01;
    let quiet_mode = (b[12] & 0x10) >> 4 == 0x01;
    let night_mode = (b[12] & 0x20) >> 5 == 0x01;
    let backup_heater = (b[13] & 0x01) == 0x01;
    let cooling_cmp = (b[13] & 0x02) >> 1 == 0x01 && operation_mode == 0x05;
    let heating_cmp = (b[13] & 0x02) >> 1 == 0x01 && operation_mode == 0x06;
    let hot_water_heater = (b[13] & 0x04) >> 2 == 0x01;
    let hot_water_cmp = (b[13] & 0x08) >> 3 == 0x01;
    let pump1 = (b[13] & 0x10) >> 4 == 0x01;
    let hot_water_target = decode_temp(b[14]);
    let zone1_target = decode_temp(b[15]);
    let zone2_target = decode_temp(b[16]);

    let (hot_water_target2, zone1_target2, zone2_target2, defrost_in_progress, night_mode_active) =
        if long_frame {
            (
                decode_temp(b[17]),
                decode_temp(b[18]),
                decode_temp(b[19]),
                (b[21] & 0x02) == 0x02,
                (b[21] & 0x10) == 0x10,
            )
        } else {
            (0, 0, 0, (b[17] & 0x02) == 0x02, (b[17] & 0x10) == 0x10)
        };

    StatusData {
        error,
        extended_data: long_frame,
        operation_mode,
        cooling,
        heating,
        hot_water,
        auto_mode,
        quiet_mode,
        night_mode,
        backup_heater,
        cooling_cmp,
        heating_cmp,
        hot_water_heater,
        hot_water_cmp,
        pump1,
        hot_water_target,
        zone1_target,
        zone2_target,
        hot_water_target2,
        zone1_target2,
        zone2_target2,
        defrost_in_progress,
        night_mode_active,
    }
}
