//! Firmware implementations for the motion controller
//!
//! Only the GRBL dialect is spoken by the panel.

pub mod grbl;
