//! Hardware edge counters
//!
//! A counter accumulates edges seen on its input while started. Which
//! edges count depends on the [`CounterMode`].

/// Signal edge on a counter input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
}

/// Which edges a counter accumulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CounterMode {
    /// Count rising edges only
    RisingEdge,
    /// Count rising and falling edges
    BothEdge,
}

impl CounterMode {
    /// Whether `edge` increments a counter in this mode
    pub const fn counts(self, edge: Edge) -> bool {
        match self {
            CounterMode::RisingEdge => matches!(edge, Edge::Rising),
            CounterMode::BothEdge => true,
        }
    }
}

/// Advance `count` by one, wrapping to zero past `top`
pub const fn advance(count: u32, top: u32) -> u32 {
    if count >= top {
        0
    } else {
        count + 1
    }
}
