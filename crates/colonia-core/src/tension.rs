//! Bounded relationship scalars (native alarm, inter-player tension).
//!
//! Modifiers accumulate unclamped and the bound is applied on read, so the
//! observable value only depends on the multiset of modifiers applied, never
//! on their order.

use colonia_protocol::TensionLevel;

pub const TENSION_MIN: i32 = 0;
pub const TENSION_MAX: i32 = 1000;

pub const TENSION_ADD_NORMAL: i32 = 200;
pub const TENSION_ADD_MAJOR: i32 = 300;
pub const TENSION_ADD_UNIT_DESTROYED: i32 = 400;
pub const TENSION_ADD_SETTLEMENT_ATTACKED: i32 = 500;
pub const TENSION_ADD_WAR_INCITER: i32 = 500;
pub const WAR_MODIFIER: i32 = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tension {
    raw: i64,
}

impl Tension {
    pub const fn new(value: i32) -> Self {
        Self { raw: value as i64 }
    }

    /// Bounded value in `[TENSION_MIN, TENSION_MAX]`.
    pub fn value(self) -> i32 {
        self.raw.clamp(TENSION_MIN as i64, TENSION_MAX as i64) as i32
    }

    pub fn level(self) -> TensionLevel {
        TensionLevel::from_value(self.value())
    }

    pub fn modify(&mut self, delta: i32) {
        self.raw = self.raw.saturating_add(delta as i64);
    }

    pub fn modified(mut self, delta: i32) -> Self {
        self.modify(delta);
        self
    }

    /// Additive change needed to bring the bounded value to `target`.
    pub fn delta_to(self, target: i32) -> i32 {
        target.clamp(TENSION_MIN, TENSION_MAX) - self.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn level_follows_value() {
        let mut t = Tension::new(90);
        assert_eq!(t.level(), TensionLevel::Happy);
        t.modify(TENSION_ADD_NORMAL);
        assert_eq!(t.level(), TensionLevel::Content);
        t.modify(TENSION_ADD_MAJOR * 2);
        assert_eq!(t.value(), 890);
        assert_eq!(t.level(), TensionLevel::Hateful);
    }

    #[test]
    fn value_is_clamped_on_read() {
        let t = Tension::new(950).modified(WAR_MODIFIER);
        assert_eq!(t.value(), TENSION_MAX);
        let t = Tension::new(10).modified(-500);
        assert_eq!(t.value(), TENSION_MIN);
    }

    #[test]
    fn delta_to_reaches_target() {
        let t = Tension::new(300);
        assert_eq!(t.modified(t.delta_to(801)).level(), TensionLevel::Hateful);
    }

    proptest! {
        #[test]
        fn modifiers_commute(start in 0i32..1000, deltas in proptest::collection::vec(-1500i32..1500, 0..12)) {
            let forward = deltas.iter().fold(Tension::new(start), |t, d| t.modified(*d));
            let backward = deltas.iter().rev().fold(Tension::new(start), |t, d| t.modified(*d));
            prop_assert_eq!(forward.value(), backward.value());
            prop_assert_eq!(forward.level(), TensionLevel::from_value(forward.value()));
        }
    }
}
