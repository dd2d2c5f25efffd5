//! The closed table of recognized frame shapes, shared by the repairer's
//! per-known-frame fixes: heartbeat, short/long status, status update,
//! data response, and the two ACK variants.

use crate::frame::{
    data_len, data_type, FrameType, FRAME_HEAD_AND_CRC_LEN, SRC_DST_BROADCAST, SRC_DST_MASTER,
    SRC_DST_REMOTE,
};

#[derive(Debug, Clone, Copy)]
pub struct KnownFrame {
    pub frame_type: u8,
    pub data_len: u8,
    pub src: u16,
    pub dst: u16,
    pub data_type: u16,
}

impl KnownFrame {
    pub const fn new(frame_type: u8, data_len: u8, src: u16, dst: u16, data_type: u16) -> Self {
        KnownFrame {
            frame_type,
            data_len,
            src,
            dst,
            data_type,
        }
    }

    /// Total frame length this shape implies (`data_len + 6`).
    pub const fn len(&self) -> u8 {
        self.data_len + FRAME_HEAD_AND_CRC_LEN as u8
    }
}

pub const KNOWN_FRAMES: &[KnownFrame] = &[
    // heartbeat
    KnownFrame::new(
        FrameType::Ctrl as u8,
        data_len::HEARTBEAT,
        SRC_DST_MASTER,
        SRC_DST_BROADCAST,
        data_type::HEARTBEAT,
    ),
    // remote status every 30s
    KnownFrame::new(
        FrameType::Status2 as u8,
        data_len::STATUS2,
        SRC_DST_REMOTE,
        SRC_DST_MASTER,
        data_type::STATUS,
    ),
    // master status every 30s
    KnownFrame::new(
        FrameType::Status as u8,
        data_len::STATUS,
        SRC_DST_MASTER,
        SRC_DST_BROADCAST,
        data_type::STATUS,
    ),
    // master status every 30m (short)
    KnownFrame::new(
        FrameType::Status as u8,
        data_len::SHORT_STATUS,
        SRC_DST_MASTER,
        SRC_DST_BROADCAST,
        data_type::SHORT_STATUS,
    ),
    // master status update
    KnownFrame::new(
        FrameType::Update as u8,
        data_len::UPDATE,
        SRC_DST_MASTER,
        SRC_DST_BROADCAST,
        data_type::STATUS,
    ),
    // data response
    KnownFrame::new(
        FrameType::ResData as u8,
        data_len::RES_DATA,
        SRC_DST_MASTER,
        SRC_DST_REMOTE,
        data_type::DATA_RESPONSE,
    ),
    // ack variant 1
    KnownFrame::new(
        FrameType::Ack as u8,
        data_len::ACK,
        SRC_DST_MASTER,
        SRC_DST_MASTER,
        data_type::ACK,
    ),
    // ack variant 2
    KnownFrame::new(
        FrameType::Ack as u8,
        data_len::ACK,
        SRC_DST_MASTER,
        SRC_DST_REMOTE,
        data_type::ACK,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::frame_len;

    #[test]
    fn heartbeat_entry_len_matches_fixed_constant() {
        assert_eq!(KNOWN_FRAMES[0].len(), frame_len::HEARTBEAT);
    }

    #[test]
    fn table_has_eight_entries() {
        assert_eq!(KNOWN_FRAMES.len(), 8);
    }
}
