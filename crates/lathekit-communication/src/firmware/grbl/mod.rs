//! GRBL command vocabulary
//!
//! Line builders, realtime signals and error code decoding for a
//! GRBL-style motion controller.

pub mod command_creator;
pub mod error_decoder;
pub mod realtime;

pub use error_decoder::{decode_error, format_error};
pub use realtime::RealtimeSignal;
