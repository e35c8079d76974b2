//! Network layer: J1939 identifier decoding.

pub mod j1939;

pub use j1939::{decode_id, encode_id, J1939Message};
