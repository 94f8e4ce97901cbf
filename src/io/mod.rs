//! Byte-level I/O over the stack file.

pub mod frame;
