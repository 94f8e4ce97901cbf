//! Store integrity verification.
//!
//! A read-only walk of every frame up to the stack pointer: frame lengths
//! must agree, every item record must decode, and the walk must land exactly
//! on the pointer. The first violation propagates as the corruption it is;
//! verification never repairs anything.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::oats::lifecycle::Oats;

/// Summary of a clean verification walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Items decoded, stubs included.
    pub items: u64,
    /// Items carrying the void bit.
    pub voids: u64,
    /// Total payload bytes left on disk.
    pub payload_bytes: u64,
    /// The stack pointer the walk was bounded by.
    pub stack_ptr: u64,
}

impl Oats {
    /// Walk the whole stack and report on it, failing on the first corrupt
    /// frame or item.
    pub fn verify(&mut self) -> Result<VerifyReport> {
        let stack_ptr = self.stack_ptr();
        let mut report = VerifyReport {
            items: 0,
            voids: 0,
            payload_bytes: 0,
            stack_ptr,
        };
        for meta in self.scanner() {
            let meta = meta?;
            report.items += 1;
            if meta.features.is_void {
                report.voids += 1;
            }
            report.payload_bytes += meta.payload_len();
        }
        tracing::debug!(
            verify.items = report.items,
            verify.voids = report.voids,
            verify.payload_bytes = report.payload_bytes,
            "store verified"
        );
        Ok(report)
    }
}
