//! Combat odds. The controller sequences an attack; this module only decides
//! who wins.

use colonia_protocol::{CombatResult, Location, PlayerId, Position, UnitId, UnitState};

use crate::error::GameError;
use crate::world::World;

/// Fortified units get this bonus, in percent.
pub const FORTIFY_BONUS_PCT: i32 = 50;
/// Units inside a settlement get this bonus, in percent.
pub const SETTLEMENT_BONUS_PCT: i32 = 50;

pub trait CombatResolver: Send + Sync + std::fmt::Debug {
    fn resolve(
        &self,
        world: &mut World,
        attacker: UnitId,
        defender: UnitId,
    ) -> Result<CombatResult, GameError>;
}

/// Offence against terrain-modified defence, one roll from the world RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrengthCombat;

impl CombatResolver for StrengthCombat {
    fn resolve(
        &self,
        world: &mut World,
        attacker: UnitId,
        defender: UnitId,
    ) -> Result<CombatResult, GameError> {
        let offence = attack_strength(world, attacker)?.max(1) as u32;
        let defence = defence_strength(world, defender)?.max(1) as u32;
        let roll = world.rng.below(offence + defence);
        tracing::debug!(?attacker, ?defender, offence, defence, roll, "combat roll");
        Ok(if roll < offence {
            CombatResult::AttackerWins
        } else {
            CombatResult::DefenderWins
        })
    }
}

/// Always returns the same result. Handy for scripted scenarios.
#[derive(Clone, Copy, Debug)]
pub struct FixedCombat(pub CombatResult);

impl CombatResolver for FixedCombat {
    fn resolve(&self, _: &mut World, _: UnitId, _: UnitId) -> Result<CombatResult, GameError> {
        Ok(self.0)
    }
}

pub fn attack_strength(world: &World, unit: UnitId) -> Result<i32, GameError> {
    let u = world.unit(unit)?;
    Ok(world.offence(u) * 10)
}

pub fn defence_strength(world: &World, unit: UnitId) -> Result<i32, GameError> {
    let u = world.unit(unit)?;
    let mut pct = 100;
    if let Some(terrain) = world.unit_position(unit).and_then(|p| world.map.terrain(p)) {
        pct += world.rules.terrain(terrain).defence_bonus;
    }
    if u.state == UnitState::Fortified {
        pct += FORTIFY_BONUS_PCT;
    }
    if matches!(u.location, Location::Settlement { .. }) {
        pct += SETTLEMENT_BONUS_PCT;
    }
    Ok(world.defence(u) * pct / 10)
}

/// Strongest unit of `owner` defending `pos` (on the tile or inside a settlement there).
pub fn best_defender(world: &World, pos: Position, owner: PlayerId) -> Option<UnitId> {
    world
        .units_near(pos)
        .into_iter()
        .filter(|id| {
            world.units.get(*id).is_some_and(|u| {
                u.owner == owner && !matches!(u.location, Location::Carrier { .. })
            })
        })
        .max_by_key(|id| (defence_strength(world, *id).unwrap_or(0), std::cmp::Reverse(*id)))
}
