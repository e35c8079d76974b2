/// CAN ID type
pub type CanId = u32;

/// Generic frame data type
pub type FrameData = Vec<u8>;

/// Timestamp in seconds, as written by candump
pub type Timestamp = f64;

/// Decoded J1939 addressing fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub priority: u8,
    pub pgn: u32,
    pub source: u8,
    /// `None` for broadcast (PDU2) messages
    pub destination: Option<u8>,
}

/// A single captured CAN frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: CanId,
    pub data: FrameData,
    pub timestamp: Timestamp,
    pub interface: String,
}

/// Configuration trait that must be implemented by all rule and labeler configurations
pub trait Config {
    fn validate(&self) -> crate::error::Result<()>;
}
