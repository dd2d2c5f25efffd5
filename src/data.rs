//! Sensor data-request/response frames and the named sensor catalog.
//!
//! The catalog carries every known sensor entry, including ones the
//! default poll set never touches (firmware version, control-loop
//! temperatures, service on-time accumulators) — `rc` (remote sensor
//! temperature) stays commented out: the device never answers it on the
//! units this engine has been run against.

use crate::error::FrameCheck;
use crate::frame::{data_type, frame_len, Frame, FrameType, SRC_DST_MASTER, SRC_DST_REMOTE};

const REQ_DATA_CODE_OFFSET: usize = 17;
const REQ_DATA_BASE: [u8; 8] = [0x00, 0xef, 0x00, 0x2c, 0x08, 0x00, 0x00, 0x00];

const RES_DATA_EMPTY_OFFSET: usize = 13;
const RES_DATA_VALUE_OFFSET: usize = 15;
const RES_DATA_FLAG_EMPTY: u16 = 0x00a2;

/// One named entry in the sensor catalog: its wire opcode and the
/// multiplier a caller applies to the raw reading before display.
#[derive(Debug, Clone, Copy)]
pub struct SensorSpec {
    pub name: &'static str,
    pub code: u8,
    pub multiplier: f32,
}

macro_rules! sensor {
    ($name:expr, $code:expr, $mult:expr) => {
        SensorSpec {
            name: $name,
            code: $code,
            multiplier: $mult,
        }
    };
}

pub mod request_code {
    // HydroUnitData
    // pub const HW_TARGET: u8 = 0x00;
    // pub const HEAT_ZONE1_TARGET: u8 = 0x01;
    // pub const HEAT_ZONE2_TARGET: u8 = 0x02;
    // pub const RC: u8 = 0x03; // remote sensor temperature, never answered
    pub const TC: u8 = 0x04;
    pub const TWI: u8 = 0x06;
    pub const TWO: u8 = 0x07;
    pub const THO: u8 = 0x08;
    pub const TFI: u8 = 0x09;
    pub const TTW: u8 = 0x0a;
    pub const MIX: u8 = 0x0b;
    pub const LPS: u8 = 0x0e;
    pub const SW_VER: u8 = 0x0f;
    pub const CTRL_HW_TEMP: u8 = 0x10;
    pub const CTRL_ZONE1_TEMP: u8 = 0x11;
    pub const CTRL_ZONE2_TEMP: u8 = 0x12;
    pub const WF: u8 = 0xc0;
    // OutdoorUnitData
    pub const TE: u8 = 0x60;
    pub const TO: u8 = 0x61;
    pub const TD: u8 = 0x62;
    pub const TS: u8 = 0x63;
    pub const THS: u8 = 0x65;
    pub const CT: u8 = 0x6a;
    pub const TL: u8 = 0x6d;
    pub const CMP: u8 = 0x70;
    pub const FAN1: u8 = 0x72;
    pub const FAN2: u8 = 0x73;
    pub const PMV: u8 = 0x74;
    pub const HPS: u8 = 0x7a;
    // ServiceData
    pub const HP_ON_TIME: u8 = 0xf0;
    pub const HW_CMP_ON_TIME: u8 = 0xf1;
    pub const COOL_CMP_ON_TIME: u8 = 0xf2;
    pub const HEAT_CMP_ON_TIME: u8 = 0xf3;
    pub const PUMP1_ON_TIME: u8 = 0xf4;
    pub const HW_E_HEATER_ON_TIME: u8 = 0xf5;
    pub const BACKUP_HEATER_ON_TIME: u8 = 0xf6;
    pub const BOOST_HEATER_ON_TIME: u8 = 0xf7;
}

pub const SENSOR_CATALOG: &[SensorSpec] = &[
    sensor!("tc", request_code::TC, 1.0),
    sensor!("twi", request_code::TWI, 1.0),
    sensor!("two", request_code::TWO, 1.0),
    sensor!("tho", request_code::THO, 1.0),
    sensor!("tfi", request_code::TFI, 1.0),
    sensor!("ttw", request_code::TTW, 1.0),
    sensor!("mix", request_code::MIX, 1.0),
    sensor!("lps", request_code::LPS, 10.0),
    sensor!("sw_ver", request_code::SW_VER, 1.0),
    sensor!("ctrl_hw_temp", request_code::CTRL_HW_TEMP, 1.0),
    sensor!("ctrl_zone1_temp", request_code::CTRL_ZONE1_TEMP, 1.0),
    sensor!("ctrl_zone2_temp", request_code::CTRL_ZONE2_TEMP, 1.0),
    sensor!("wf", request_code::WF, 0.1),
    sensor!("te", request_code::TE, 1.0),
    sensor!("to", request_code::TO, 1.0),
    sensor!("td", request_code::TD, 1.0),
    sensor!("ts", request_code::TS, 1.0),
    sensor!("ths", request_code::THS, 1.0),
    sensor!("ct", request_code::CT, 10.0),
    sensor!("tl", request_code::TL, 1.0),
    sensor!("cmp", request_code::CMP, 1.0),
    sensor!("fan1", request_code::FAN1, 1.0),
    sensor!("fan2", request_code::FAN2, 1.0),
    sensor!("pmv", request_code::PMV, 10.0),
    sensor!("hps", request_code::HPS, 10.0),
    sensor!("hp_on_time", request_code::HP_ON_TIME, 100.0),
    sensor!("hw_cmp_on_time", request_code::HW_CMP_ON_TIME, 100.0),
    sensor!("cool_cmp_on_time", request_code::COOL_CMP_ON_TIME, 100.0),
    sensor!("heat_cmp_on_time", request_code::HEAT_CMP_ON_TIME, 100.0),
    sensor!("pump1_on_time", request_code::PUMP1_ON_TIME, 100.0),
    sensor!("hw_e_heater_on_time", request_code::HW_E_HEATER_ON_TIME, 100.0),
    sensor!(
        "backup_heater_on_time",
        request_code::BACKUP_HEATER_ON_TIME,
        100.0
    ),
    sensor!(
        "boost_heater_on_time",
        request_code::BOOST_HEATER_ON_TIME,
        100.0
    ),
];

/// Look up a sensor by name. `None` for anything outside the catalog —
/// callers must reject unknown names without doing any I/O.
pub fn sensor_by_name(name: &str) -> Option<&'static SensorSpec> {
    SENSOR_CATALOG.iter().find(|s| s.name == name)
}

pub struct DataRequestFrame {
    pub frame: Frame,
}

/// Build a data-request frame for `request_code`.
pub fn data_request(request_code: u8) -> DataRequestFrame {
    let mut frame = Frame::new(FrameType::ReqData as u8, frame_len::REQ_DATA);
    frame.set_source(SRC_DST_REMOTE, false);
    frame.set_destination(SRC_DST_MASTER, false);
    frame.set_data_type(data_type::DATA_REQUEST, false);
    frame.insert_payload(&REQ_DATA_BASE, false, false);
    frame.set_byte(REQ_DATA_CODE_OFFSET, request_code, true);
    DataRequestFrame { frame }
}

/// Decoded data-response: `Ok(reading)` or the `FrameCheck` that failed.
/// `FrameCheck::DataEmpty` is its own outcome (offset 13 carries the
/// empty-data sentinel `00A2`), checked after the base frame validation.
pub fn decode_response(buf: &[u8]) -> Result<i16, FrameCheck> {
    let frame = Frame::from_slice(buf);
    let error = frame.check_frame(FrameType::ResData as u8, data_type::DATA_RESPONSE);
    if !error.is_ok() {
        return Err(error);
    }
    let bytes = frame.as_bytes();
    if crate::frame::read_u16(bytes, RES_DATA_EMPTY_OFFSET) == RES_DATA_FLAG_EMPTY {
        return Err(FrameCheck::DataEmpty);
    }
    Ok(crate::frame::read_u16(bytes, RES_DATA_VALUE_OFFSET) as i16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::crc16_mcrf4xx;

    #[test]
    fn catalog_has_every_supplemented_entry() {
        assert!(sensor_by_name("tc").is_some());
        assert!(sensor_by_name("sw_ver").is_some());
        assert!(sensor_by_name("ctrl_zone2_temp").is_some());
        assert!(sensor_by_name("boost_heater_on_time").is_some());
        assert!(sensor_by_name("rc").is_none());
        assert_eq!(SENSOR_CATALOG.len(), 33);
    }

    #[test]
    fn data_request_carries_code_and_template() {
        let req = data_request(request_code::TE);
        let bytes = req.frame.as_bytes();
        assert_eq!(bytes.len(), frame_len::REQ_DATA as usize);
        assert_eq!(&bytes[5..7], &[0x00, 0x40]);
        assert_eq!(&bytes[7..9], &[0x08, 0x00]);
        assert_eq!(&bytes[9..11], &[0x00, 0x80]);
        assert_eq!(bytes[REQ_DATA_CODE_OFFSET], request_code::TE);
        // bytes 11..17 are the fixed template (header-exclusive insert).
        assert_eq!(&bytes[11..17], &REQ_DATA_BASE[..6]);
        let n = bytes.len();
        assert_eq!(
            crc16_mcrf4xx(&bytes[..n - 2]),
            crate::frame::read_u16(bytes, n - 2)
        );
    }

    #[test]
    fn decode_response_extracts_value() {
        let mut frame = Frame::new(FrameType::ResData as u8, frame_len::RES_DATA);
        frame.set_source(SRC_DST_MASTER, false);
        frame.set_destination(SRC_DST_REMOTE, false);
        frame.set_data_type(data_type::DATA_RESPONSE, false);
        frame.set_byte(RES_DATA_EMPTY_OFFSET, 0x00, false);
        frame.set_byte(RES_DATA_EMPTY_OFFSET + 1, 0x2c, false);
        frame.set_byte(RES_DATA_VALUE_OFFSET, 0x00, false);
        frame.set_byte(RES_DATA_VALUE_OFFSET + 1, 42, true);
        assert_eq!(decode_response(frame.as_bytes()), Ok(42));
    }

    #[test]
    fn decode_response_detects_empty_sentinel() {
        let mut frame = Frame::new(FrameType::ResData as u8, frame_len::RES_DATA);
        frame.set_source(SRC_DST_MASTER, false);
        frame.set_destination(SRC_DST_REMOTE, false);
        frame.set_data_type(data_type::DATA_RESPONSE, false);
        frame.set_byte(RES_DATA_EMPTY_OFFSET, 0x00, false);
        frame.set_byte(RES_DATA_EMPTY_OFFSET + 1, 0xa2, true);
        assert_eq!(decode_response(frame.as_bytes()), Err(FrameCheck::DataEmpty));
    }
}
