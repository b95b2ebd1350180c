//! Shared utility modules used across Pilum components.

pub mod bytes_io;
pub mod numeric;
pub mod varint;
