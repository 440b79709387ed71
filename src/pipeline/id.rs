//! Identity type for pipeline stages.
//!
//! A `StageId` is a direct index into `Pipeline::stages`.

use std::fmt;

/// Index into `Pipeline::stages`, in upstream-to-downstream order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct StageId(pub u32);

impl StageId {
    pub const INVALID: StageId = StageId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "StageId(INVALID)")
        } else {
            write!(f, "StageId({})", self.0)
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
