//! Line quantity.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// The quantity of a line item.
///
/// A quantity is always at least one: a line that would drop to zero is
/// removed from the cart instead, so zero is not representable here.
/// Deserializing `0` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A quantity of one, the quantity every newly added line starts with.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Create a quantity, returning `None` for zero.
    #[must_use]
    pub const fn new(n: u32) -> Option<Self> {
        match NonZeroU32::new(n) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// Get the quantity as a `u32`.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// The next quantity up, or `None` if already at `u32::MAX`.
    #[must_use]
    pub const fn incremented(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// The next quantity down, or `None` if this is the last unit.
    #[must_use]
    pub const fn decremented(self) -> Option<Self> {
        Self::new(self.0.get() - 1)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NonZeroU32> for Quantity {
    fn from(n: NonZeroU32) -> Self {
        Self(n)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.get()
    }
}
