//! Outgoing command frame constructors: mode set, operation mode, switch,
//! temperature, forced defrost.
//!
//! All command frames carry source `REMOTE` and destination `MASTER`;
//! each constructor fills its frame-specific payload offsets and
//! finalizes the CRC before returning.

use crate::config;
use crate::frame::{data_type, frame_len, Frame, FrameType, SRC_DST_MASTER, SRC_DST_REMOTE};

/// Built outgoing frame. A single value type plus free constructor
/// functions per kind: the engine matches an ACK's frame code against
/// what was actually sent without needing any frame-type hierarchy.
#[derive(Debug, Clone)]
pub struct CommandFrame {
    pub frame: Frame,
}

impl CommandFrame {
    pub fn data_type(&self) -> u16 {
        self.frame.data_type()
    }
}

pub fn mode_by_name(name: &str) -> Option<u8> {
    match name {
        "auto" => Some(SET_AUTO_MODE_CODE),
        "quiet" => Some(SET_QUIET_MODE_CODE),
        "night" => Some(SET_NIGHT_MODE_CODE),
        _ => None,
    }
}

pub const SET_AUTO_MODE_CODE: u8 = 0x01;
pub const SET_QUIET_MODE_CODE: u8 = 0x04;
pub const SET_NIGHT_MODE_CODE: u8 = 0x88;

const SET_MODE_CODE_OFFSET: usize = 11;
const SET_MODE_VALUE_OFFSET: usize = 12;

/// auto/quiet/night on-off. `on_off` is `0` or `1`; the on/off bit is
/// shifted per mode: auto `onOff`, quiet `onOff << 2`, night `onOff << 3`.
pub fn set_mode(mode: u8, on_off: u8) -> CommandFrame {
    let shifted = match mode {
        SET_QUIET_MODE_CODE => on_off << 2,
        SET_NIGHT_MODE_CODE => on_off << 3,
        _ => on_off,
    };
    let mut frame = Frame::new(FrameType::Cmd as u8, frame_len::SET_MODE);
    frame.set_source(SRC_DST_REMOTE, false);
    frame.set_destination(SRC_DST_MASTER, false);
    frame.set_data_type(data_type::MODE_CHANGE, false);
    frame.set_byte(SET_MODE_CODE_OFFSET, mode, false);
    frame.set_byte(SET_MODE_VALUE_OFFSET, shifted, true);
    CommandFrame { frame }
}

pub const OPERATION_MODE_COOLING: u8 = 0x05;
pub const OPERATION_MODE_HEATING: u8 = 0x06;
const OPERATION_MODE_OFFSET: usize = 11;

pub fn operation_mode_by_name(name: &str) -> Option<u8> {
    match name {
        "cooling" => Some(OPERATION_MODE_COOLING),
        "heating" => Some(OPERATION_MODE_HEATING),
        _ => None,
    }
}

pub fn operation_mode(mode: u8) -> CommandFrame {
    let mut frame = Frame::new(FrameType::Cmd as u8, frame_len::OPERATION_MODE);
    frame.set_source(SRC_DST_REMOTE, false);
    frame.set_destination(SRC_DST_MASTER, false);
    frame.set_data_type(data_type::OPERATION_MODE, false);
    frame.set_byte(OPERATION_MODE_OFFSET, mode, true);
    CommandFrame { frame }
}

pub const SWITCH_OPERATION_COOL_HEAT: u8 = 0x22;
pub const SWITCH_OPERATION_HOT_WATER: u8 = 0x28;
const SWITCH_VALUE_OFFSET: usize = 11;

/// Both `cooling` and `heating` map to the same opcode `0x22` — the
/// actual cool/heat distinction is carried by the preceding
/// `operation_mode` command, not by this frame.
pub fn switch_operation_by_name(name: &str) -> Option<u8> {
    match name {
        "cooling" | "heating" => Some(SWITCH_OPERATION_COOL_HEAT),
        "hot_water" => Some(SWITCH_OPERATION_HOT_WATER),
        _ => None,
    }
}

pub fn switch(operation: u8, on_off: u8) -> CommandFrame {
    let value = match operation {
        SWITCH_OPERATION_HOT_WATER => operation + (on_off << 2),
        _ => operation + on_off,
    };
    let mut frame = Frame::new(FrameType::Cmd as u8, frame_len::SWITCH);
    frame.set_source(SRC_DST_REMOTE, false);
    frame.set_destination(SRC_DST_MASTER, false);
    frame.set_data_type(data_type::OPERATION_SWITCH, false);
    frame.set_byte(SWITCH_VALUE_OFFSET, value, true);
    CommandFrame { frame }
}

pub const TEMPERATURE_COOLING_CODE: u8 = 0x01;
pub const TEMPERATURE_HEATING_CODE: u8 = 0x02;
pub const TEMPERATURE_HOT_WATER_CODE: u8 = 0x08;

pub fn temperature_zone_by_name(name: &str) -> Option<u8> {
    match name {
        "cooling" => Some(TEMPERATURE_COOLING_CODE),
        "heating" => Some(TEMPERATURE_HEATING_CODE),
        "hot_water" => Some(TEMPERATURE_HOT_WATER_CODE),
        _ => None,
    }
}

const TEMPERATURE_CODE_OFFSET: usize = 11;
const TEMPERATURE_ZONE1_VALUE_OFFSET: usize = 12;
const TEMPERATURE_ZONE2_VALUE_OFFSET: usize = 13;
const TEMPERATURE_HOT_WATER_VALUE_OFFSET: usize = 14;
const TEMPERATURE_ZONE1_VALUE2_OFFSET: usize = 15;

fn constrain(temperature: i8, min: i8, max: i8) -> i8 {
    temperature.clamp(min, max)
}

fn constrain_temp(zone: u8, temperature: i8) -> i8 {
    match zone {
        TEMPERATURE_COOLING_CODE => match config::COOLING_CLAMP_MODE {
            // collapses every cooling setpoint to the minimum; see config::CoolingClampMode.
            config::CoolingClampMode::FirmwareBug => {
                constrain(temperature, config::MIN_COOLING_TEMP, config::MIN_COOLING_TEMP)
            }
            config::CoolingClampMode::Corrected => {
                constrain(temperature, config::MIN_COOLING_TEMP, config::MAX_COOLING_TEMP)
            }
        },
        TEMPERATURE_HEATING_CODE => {
            constrain(temperature, config::MIN_HEATING_TEMP, config::MAX_HEATING_TEMP)
        }
        TEMPERATURE_HOT_WATER_CODE => {
            constrain(temperature, config::MIN_HOT_WATER_TEMP, config::MAX_HOT_WATER_TEMP)
        }
        _ => temperature,
    }
}

fn convert_temp(temperature: i8) -> u8 {
    ((temperature as i16 + 16) * 2) as u8
}

/// Zone-keyed temperature change. `zone1`/`zone2` matter only for
/// cooling/heating; `hot_water` only for the hot-water zone.
///
/// All three fields are clamped against the zone-selected bounds, not just
/// the field the device actually reads for `zone` — the device's own
/// constructor clamps `zone1`/`zone2`/`hot_water` unconditionally, so an
/// unused field still comes out pinned to the zone's range rather than
/// encoded raw.
pub fn temperature(zone: u8, zone1: i8, zone2: i8, hot_water: i8) -> CommandFrame {
    let zone1 = constrain_temp(zone, zone1);
    let zone2 = constrain_temp(zone, zone2);
    let hot_water = constrain_temp(zone, hot_water);

    let mut frame = Frame::new(FrameType::Cmd as u8, frame_len::TEMPERATURE);
    frame.set_source(SRC_DST_REMOTE, false);
    frame.set_destination(SRC_DST_MASTER, false);
    frame.set_data_type(data_type::TEMPERATURE_CHANGE, false);
    frame.set_byte(TEMPERATURE_CODE_OFFSET, zone, false);
    match zone {
        TEMPERATURE_COOLING_CODE | TEMPERATURE_HEATING_CODE => {
            frame.set_byte(TEMPERATURE_ZONE1_VALUE_OFFSET, convert_temp(zone1), false);
            frame.set_byte(TEMPERATURE_ZONE2_VALUE_OFFSET, convert_temp(zone2), false);
            frame.set_byte(
                TEMPERATURE_HOT_WATER_VALUE_OFFSET,
                convert_temp(hot_water),
                false,
            );
            frame.set_byte(TEMPERATURE_ZONE1_VALUE2_OFFSET, convert_temp(zone1), true);
        }
        TEMPERATURE_HOT_WATER_CODE => {
            frame.set_byte(
                TEMPERATURE_HOT_WATER_VALUE_OFFSET,
                convert_temp(hot_water),
                true,
            );
        }
        _ => {}
    }
    CommandFrame { frame }
}

pub const FORCE_DEFROST_CODE: u8 = 0x46;
const FORCE_DEFROST_CODE_OFFSET: usize = 12;
const FORCE_DEFROST_VALUE_OFFSET: usize = 13;

pub fn forced_defrost(on_off: u8) -> CommandFrame {
    let mut frame = Frame::new(FrameType::Cmd as u8, frame_len::FORCE_DEFROST);
    frame.set_source(SRC_DST_REMOTE, false);
    frame.set_destination(SRC_DST_MASTER, false);
    frame.set_data_type(data_type::SPECIAL_CMD, false);
    frame.set_byte(FORCE_DEFROST_CODE_OFFSET, FORCE_DEFROST_CODE, false);
    frame.set_byte(FORCE_DEFROST_VALUE_OFFSET, on_off, true);
    CommandFrame { frame }
}

/// Decoded ACK: the acknowledged data-type word at offsets 11..12.
#[derive(Debug, Clone, Copy)]
pub struct AckFrame {
    pub error: crate::error::FrameCheck,
    pub frame_code: u16,
}

const ACK_FRAME_CODE_OFFSET: usize = 11;

pub fn decode_ack(buf: &[u8]) -> AckFrame {
    let frame = Frame::from_slice(buf);
    let error = frame.check_frame(FrameType::Ack as u8, data_type::ACK);
    let frame_code = if error.is_ok() {
        crate::frame::read_u16(frame.as_bytes(), ACK_FRAME_CODE_OFFSET)
    } else {
        0
    };
    AckFrame { error, frame_code }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn night_mode_on_encodes_shifted_bit() {
        let cmd = set_mode(SET_NIGHT_MODE_CODE, 1);
        let bytes = cmd.frame.as_bytes();
        assert_eq!(bytes.len(), 17);
        assert_eq!(&bytes[0..2], &[0xa0, 0x00]);
        assert_eq!(bytes[11], 0x88);
        assert_eq!(bytes[12], 0x08);
        assert_eq!(&bytes[5..7], &[0x00, 0x40]);
        assert_eq!(&bytes[7..9], &[0x08, 0x00]);
        assert_eq!(&bytes[9..11], &[0x03, 0xc4]);
        let n = bytes.len();
        assert_eq!(
            crate::frame::crc16_mcrf4xx(&bytes[..n - 2]),
            crate::frame::read_u16(bytes, n - 2)
        );
    }

    #[test]
    fn heating_temperature_45c_encodes_zone1_at_both_offsets() {
        let cmd = temperature(TEMPERATURE_HEATING_CODE, 45, 0, 0);
        let bytes = cmd.frame.as_bytes();
        assert_eq!(bytes.len(), 18);
        assert_eq!(bytes[11], 0x02);
        assert_eq!(bytes[12], 0x7a);
        // zone2/hot_water are unused by a heating command but still clamp
        // to MIN_HEATING_TEMP (20C) rather than pass through raw: convert_temp(20)=0x48.
        assert_eq!(bytes[13], 0x48);
        assert_eq!(bytes[14], 0x48);
        assert_eq!(bytes[15], 0x7a);
    }

    #[test]
    fn ack_frame_decodes_frame_code() {
        let bytes: [u8; 15] = [
            0xa0, 0x00, 0x18, 0x09, 0x00, 0x08, 0x00, 0x08, 0x00, 0x00, 0xa1, 0x00, 0x41, 0xc1,
            0x95,
        ];
        let ack = decode_ack(&bytes);
        assert!(ack.error.is_ok());
        assert_eq!(ack.frame_code, 0x0041);
    }

    #[test]
    fn cooling_setpoint_collapses_to_minimum_in_firmware_bug_mode() {
        // config::COOLING_CLAMP_MODE defaults to FirmwareBug: every cooling
        // setpoint, regardless of requested value, clamps to
        // MIN_COOLING_TEMP because the clamp's low and high bounds match.
        for requested in [7, 15, 25] {
            let cmd = temperature(TEMPERATURE_COOLING_CODE, requested, 0, 0);
            let bytes = cmd.frame.as_bytes();
            assert_eq!(bytes[TEMPERATURE_ZONE1_VALUE_OFFSET], convert_temp(config::MIN_COOLING_TEMP));
        }
    }

    #[test]
    fn outgoing_commands_always_carry_remote_to_master() {
        for cmd in [
            set_mode(SET_AUTO_MODE_CODE, 1),
            operation_mode(OPERATION_MODE_COOLING),
            switch(SWITCH_OPERATION_COOL_HEAT, 1),
            temperature(TEMPERATURE_HOT_WATER_CODE, 0, 0, 45),
            forced_defrost(1),
        ] {
            let bytes = cmd.frame.as_bytes();
            assert_eq!(&bytes[0..2], &[0xa0, 0x00]);
            assert_eq!(cmd.frame.src(), SRC_DST_REMOTE);
            assert_eq!(cmd.frame.dst(), SRC_DST_MASTER);
            assert_eq!(
                cmd.frame.data_length() as usize,
                bytes.len() - crate::frame::FRAME_HEAD_AND_CRC_LEN
            );
        }
    }
}
