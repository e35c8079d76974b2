//! Data link layer: raw CAN frames recovered from candump captures.
//!
//! Two textual layouts written by `candump` are understood:
//!
//! ```text
//! (1612345678.123456) can0 18FEF100 [8] 01 02 03 04 05 06 07 08
//! (1612345678.123456) can0 18FEF100#0102030405060708
//! ```

pub mod candump;

pub use candump::{parse_line, read_frames, read_frames_from, CandumpReader, ParsedLog};
