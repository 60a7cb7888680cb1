//! Cyclic counters for consumable resource locations.
//!
//! Multi-day runs burn through consumables faster than a human can restock
//! them, so locations are used round-robin: tip racks across liquid-handler
//! deck slots, spare plates across tower decks, lids across parking nests.
//! A [`ResourceCycle`] is the bounded counter behind that rotation.
//!
//! Wraparound is silent and unconditional - the lab restocks each location
//! before the cycle comes back around, and nothing in software can verify
//! that. The bounds themselves are validated when the
//! cycle is constructed, so a running experiment can never observe a value
//! outside `[min, max]`.

use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};

/// Inclusive bounds and starting point for a [`ResourceCycle`], as written in
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleBounds {
    /// Lowest slot number (inclusive)
    pub min: u32,
    /// Highest slot number (inclusive)
    pub max: u32,
    /// Slot the experiment starts on
    pub start: u32,
}

/// A named, bounded cyclic counter over consumable locations.
///
/// `advance()` steps to the next slot, wrapping back to `min` after `max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCycle {
    name: String,
    min: u32,
    max: u32,
    current: u32,
}

impl ResourceCycle {
    /// Create a cycle, validating `min <= start <= max`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Configuration`] for inverted bounds or an
    /// out-of-range starting slot.
    pub fn new(name: impl Into<String>, min: u32, max: u32, start: u32) -> FlowResult<Self> {
        let name = name.into();
        if min > max {
            return Err(FlowError::Configuration(format!(
                "resource cycle '{name}': min {min} exceeds max {max}"
            )));
        }
        if start < min || start > max {
            return Err(FlowError::Configuration(format!(
                "resource cycle '{name}': start {start} outside [{min}, {max}]"
            )));
        }
        Ok(Self {
            name,
            min,
            max,
            current: start,
        })
    }

    /// Create a cycle from configured bounds.
    pub fn from_bounds(name: impl Into<String>, bounds: CycleBounds) -> FlowResult<Self> {
        Self::new(name, bounds.min, bounds.max, bounds.start)
    }

    /// The cycle's name (used in logs and payload keys).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current slot. Always within `[min, max]`.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Number of slots in the cycle.
    pub fn slot_count(&self) -> u32 {
        self.max - self.min + 1
    }

    /// Step to the next slot, wrapping to `min` past `max`, and return it.
    pub fn advance(&mut self) -> u32 {
        self.current = if self.current >= self.max {
            tracing::debug!(cycle = %self.name, min = self.min, "resource cycle wrapped");
            self.min
        } else {
            self.current + 1
        };
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_to_min_past_max() {
        // Tip racks live on deck slots 4-11
        let mut tips = ResourceCycle::new("tip_box_location", 4, 11, 11).unwrap();
        assert_eq!(tips.advance(), 4);
        assert_eq!(tips.advance(), 5);
    }

    #[test]
    fn full_cycle_returns_to_start() {
        let mut stack = ResourceCycle::new("tower_deck", 1, 5, 3).unwrap();
        let origin = stack.current();
        for _ in 0..stack.slot_count() {
            stack.advance();
        }
        assert_eq!(stack.current(), origin);
    }

    #[test]
    fn never_leaves_bounds() {
        let mut nest = ResourceCycle::new("lidnest", 1, 2, 1).unwrap();
        for _ in 0..10 {
            let slot = nest.advance();
            assert!((1..=2).contains(&slot));
        }
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert!(matches!(
            ResourceCycle::new("bad", 5, 1, 3),
            Err(FlowError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_start() {
        assert!(ResourceCycle::new("tip_box_location", 4, 11, 12).is_err());
        assert!(ResourceCycle::new("tip_box_location", 4, 11, 3).is_err());
    }

    #[test]
    fn single_slot_cycle_stays_put() {
        let mut fixed = ResourceCycle::new("exchange", 1, 1, 1).unwrap();
        assert_eq!(fixed.advance(), 1);
        assert_eq!(fixed.advance(), 1);
    }
}
