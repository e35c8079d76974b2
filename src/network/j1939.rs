use crate::types::{Address, CanId, Frame, FrameData, Timestamp};

pub const PGN_TSC1: u32 = 0x0000;
pub const PGN_ACKNOWLEDGEMENT: u32 = 0xE800;
pub const PGN_REQUEST: u32 = 0xEA00;
pub const PGN_TP_DT: u32 = 0xEB00;
pub const PGN_TP_CM: u32 = 0xEC00;
pub const PGN_ADDRESS_CLAIMED: u32 = 0xEE00;
pub const PGN_EEC2: u32 = 0xF003;
pub const PGN_EEC1: u32 = 0xF004;
pub const PGN_DM1: u32 = 0xFECA;
pub const PGN_VEHICLE_ID: u32 = 0xFEEC;
pub const PGN_ET1: u32 = 0xFEEE;
pub const PGN_CCVS1: u32 = 0xFEF1;

/// Global (broadcast) destination address
pub const ADDRESS_GLOBAL: u8 = 0xFF;

// PDU format values at or above this are broadcast (PDU2)
const PDU2_THRESHOLD: u32 = 0xF0;

/// J1939 message structure
#[derive(Debug, Clone, PartialEq)]
pub struct J1939Message {
    pub address: Address,
    pub data: FrameData,
    pub timestamp: Timestamp,
    pub interface: String,
}

impl From<Frame> for J1939Message {
    fn from(frame: Frame) -> Self {
        Self {
            address: decode_id(frame.id),
            data: frame.data,
            timestamp: frame.timestamp,
            interface: frame.interface,
        }
    }
}

/// Splits a 29-bit identifier into priority, PGN, destination and source.
///
/// The data page and extended data page bits are kept as part of the PGN.
/// For PDU1 messages the PDU specific byte is the destination address and
/// is cleared from the PGN.
pub fn decode_id(id: CanId) -> Address {
    let priority = ((id >> 26) & 0x7) as u8;
    let data_page = (id >> 24) & 0x3;
    let pdu_format = (id >> 16) & 0xFF;
    let pdu_specific = (id >> 8) & 0xFF;
    let source = (id & 0xFF) as u8;

    let (pgn, destination) = if pdu_format >= PDU2_THRESHOLD {
        ((data_page << 16) | (pdu_format << 8) | pdu_specific, None)
    } else {
        ((data_page << 16) | (pdu_format << 8), Some(pdu_specific as u8))
    };

    Address {
        priority,
        pgn,
        source,
        destination,
    }
}

/// Builds a 29-bit identifier from decoded fields.
///
/// A PDU1 address without destination is sent to the global address.
pub fn encode_id(address: &Address) -> CanId {
    let pdu_format = (address.pgn >> 8) & 0xFF;
    let pdu_specific = if pdu_format >= PDU2_THRESHOLD {
        address.pgn & 0xFF
    } else {
        address.destination.unwrap_or(ADDRESS_GLOBAL) as u32
    };

    ((address.priority as u32 & 0x7) << 26)
        | (address.pgn & 0x3_0000) << 8
        | (pdu_format << 16)
        | (pdu_specific << 8)
        | address.source as u32
}

/// Short acronym of a well-known PGN
pub fn pgn_name(pgn: u32) -> Option<&'static str> {
    match pgn {
        PGN_TSC1 => Some("TSC1"),
        PGN_ACKNOWLEDGEMENT => Some("ACK"),
        PGN_REQUEST => Some("RQST"),
        PGN_TP_DT => Some("TP.DT"),
        PGN_TP_CM => Some("TP.CM"),
        PGN_ADDRESS_CLAIMED => Some("ACL"),
        PGN_EEC2 => Some("EEC2"),
        PGN_EEC1 => Some("EEC1"),
        PGN_DM1 => Some("DM1"),
        PGN_VEHICLE_ID => Some("VI"),
        PGN_ET1 => Some("ET1"),
        PGN_CCVS1 => Some("CCVS1"),
        _ => None,
    }
}
