//! Move classification.
//!
//! `classify` is a pure function of the world: two calls without an
//! intervening mutation always agree. Handlers re-run it before mutating.

use colonia_protocol::{
    Direction, Location, MoveType, PlayerId, Position, Stance, Terrain, UnitId, UnitRole,
};

use crate::error::GameError;
use crate::map::Tile;
use crate::rules::Expertise;
use crate::world::{Unit, World};

/// Where a unit would end up stepping in `direction`.
pub fn target(world: &World, unit: UnitId, direction: Direction) -> Option<Position> {
    world.unit_position(unit).map(|p| p.step(direction))
}

pub fn classify(world: &World, unit: UnitId, direction: Direction) -> Result<MoveType, GameError> {
    let u = world.unit(unit)?;
    if u.moves_left == 0 {
        return Ok(MoveType::MoveNoMoves);
    }
    let Some(from) = world.unit_position(unit) else {
        return Ok(MoveType::MoveNoTile);
    };
    let to = from.step(direction);
    let Some(tile) = world.map.get(to) else {
        return Ok(MoveType::MoveNoTile);
    };
    if world.is_naval(u) {
        Ok(classify_naval(world, u, from, to, tile))
    } else {
        Ok(classify_land(world, u, to, tile))
    }
}

/// First foreign owner with units standing on `pos`.
fn foreign_occupant(world: &World, owner: PlayerId, pos: Position) -> Option<PlayerId> {
    world
        .units_at(pos)
        .into_iter()
        .filter_map(|id| world.units.get(id))
        .map(|u| u.owner)
        .find(|o| *o != owner)
}

fn classify_naval(world: &World, u: &Unit, from: Position, to: Position, tile: &Tile) -> MoveType {
    let beached = world.map.is_land(from) && world.settlement_at(from).is_none();
    if beached {
        return MoveType::MoveNoAccessBeached;
    }
    if !tile.terrain.is_water() {
        let Some(settlement) = tile.settlement.and_then(|s| world.settlements.get(s)) else {
            return MoveType::MoveNoAccessLand;
        };
        if settlement.owner == u.owner {
            return MoveType::Move;
        }
        let has_goods = !u.cargo.is_empty();
        if settlement.is_colony() {
            return if has_goods {
                MoveType::MoveNoAccessTrade
            } else {
                MoveType::MoveNoAccessSettlement
            };
        }
        if world.stance(u.owner, settlement.owner) == Stance::Uncontacted {
            return MoveType::MoveNoAccessContact;
        }
        return if has_goods {
            MoveType::EnterSettlementWithCarrierAndGoods
        } else {
            MoveType::MoveNoAccessGoods
        };
    }
    if foreign_occupant(world, u.owner, to).is_some() {
        return if world.is_offensive(u) || world.has_piracy(u) {
            MoveType::AttackUnit
        } else {
            MoveType::MoveNoAttackCivilian
        };
    }
    if tile.terrain == Terrain::HighSeas {
        MoveType::MoveHighSeas
    } else {
        MoveType::Move
    }
}

fn classify_land(world: &World, u: &Unit, to: Position, tile: &Tile) -> MoveType {
    let aboard = matches!(u.location, Location::Carrier { .. });

    if tile.terrain.is_water() {
        let boardable = world.units_at(to).into_iter().any(|id| {
            world.units.get(id).is_some_and(|c| {
                c.owner == u.owner && world.is_naval(c) && world.free_slots(c) > 0
            })
        });
        return if boardable {
            MoveType::Embark
        } else {
            MoveType::MoveNoAccessWater
        };
    }

    if let Some(settlement) = tile.settlement.and_then(|s| world.settlements.get(s)) {
        if settlement.owner == u.owner {
            return MoveType::Move;
        }
        if aboard {
            return MoveType::MoveNoAttackMarine;
        }
        let offensive = world.is_offensive(u);
        return match settlement.as_native() {
            Some(native) => {
                let stance = world.stance(u.owner, settlement.owner);
                if stance == Stance::Uncontacted {
                    return MoveType::MoveNoAccessContact;
                }
                match u.role {
                    UnitRole::Scout => MoveType::EnterNativeSettlementWithScout,
                    UnitRole::Missionary => {
                        let banned = world
                            .players
                            .get(settlement.owner.index())
                            .is_some_and(|p| p.missions_banned.contains(&u.owner));
                        if banned {
                            MoveType::MoveNoAccessMissionBan
                        } else {
                            MoveType::EnterNativeSettlementWithMissionary
                        }
                    }
                    _ if offensive => MoveType::AttackSettlement,
                    _ => {
                        let can_learn = world
                            .rules
                            .unit_type(u.unit_type)
                            .is_some_and(|t| t.can_learn);
                        if !can_learn {
                            MoveType::MoveNoAccessSettlement
                        } else if stance == Stance::War {
                            MoveType::MoveNoAccessWar
                        } else if native.learnable_skill.is_none() {
                            MoveType::MoveNoAccessSkill
                        } else {
                            MoveType::EnterNativeSettlementWithColonist
                        }
                    }
                }
            }
            None => match u.role {
                UnitRole::Scout => MoveType::EnterForeignColonyWithScout,
                _ if offensive => MoveType::AttackSettlement,
                _ => MoveType::MoveNoAccessSettlement,
            },
        };
    }

    if foreign_occupant(world, u.owner, to).is_some() {
        if aboard {
            return MoveType::MoveNoAttackMarine;
        }
        return if world.is_offensive(u) {
            MoveType::AttackUnit
        } else {
            MoveType::MoveNoAttackCivilian
        };
    }

    if tile.rumour {
        MoveType::ExploreLostCityRumour
    } else {
        MoveType::Move
    }
}

/// Move points spent entering `to`. Never more than what is left, so a unit
/// with any points can always attempt one step.
pub fn move_cost(world: &World, unit: &Unit, to: Position) -> u32 {
    let full = if world.is_naval(unit) || world.settlement_at(to).is_some() {
        1
    } else {
        world
            .map
            .terrain(to)
            .map_or(1, |t| world.rules.terrain(t).move_cost)
    };
    full.min(unit.moves_left)
}

/// Whether a unit may enter `pos` while following a path.
pub fn passable(world: &World, unit: &Unit, pos: Position) -> bool {
    let Some(tile) = world.map.get(pos) else {
        return false;
    };
    let naval = world.is_naval(unit);
    if let Some(settlement) = tile.settlement.and_then(|s| world.settlements.get(s)) {
        return settlement.owner == unit.owner;
    }
    if naval != tile.terrain.is_water() {
        return false;
    }
    foreign_occupant(world, unit.owner, pos).is_none()
}

/// Expert scouts see further when speaking to natives.
pub fn is_expert_scout(world: &World, unit: &Unit) -> bool {
    world.is_expert(unit, Expertise::Scout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::WorldBuilder;
    use colonia_protocol::{PlayerKind, Terrain};

    struct Fixture {
        world: World,
        colonist: UnitId,
        soldier: UnitId,
        scout: UnitId,
        ship: UnitId,
    }

    // Layout (x grows east):
    //   column 0-1 ocean, the rest plains. Native camp at (5,2), enemy
    //   colonist at (4,4), rumour at (2,1).
    fn fixture() -> Fixture {
        let mut b = WorldBuilder::new(8, 6, Terrain::Plains).unwrap();
        for y in 0..6 {
            b.terrain(Position::new(0, y), Terrain::HighSeas);
            b.terrain(Position::new(1, y), Terrain::Ocean);
        }
        let dutch = b.player("Dutch", PlayerKind::Colonial, true);
        let english = b.player("English", PlayerKind::Colonial, true);
        let sioux = b.player("Sioux", PlayerKind::Native, false);
        b.native_settlement(sioux, "Camp", Position::new(5, 2), false);
        b.stance(dutch, sioux, Stance::Peace);
        b.rumour(Position::new(2, 1));
        let colonist = b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(4, 2));
        let soldier = b.unit(dutch, "veteran_soldier", UnitRole::Soldier, Position::new(3, 4));
        let scout = b.unit(dutch, "free_colonist", UnitRole::Scout, Position::new(4, 3));
        let ship = b.unit(dutch, "caravel", UnitRole::Default, Position::new(1, 3));
        b.unit(english, "free_colonist", UnitRole::Default, Position::new(4, 4));
        Fixture {
            world: b.build().unwrap(),
            colonist,
            soldier,
            scout,
            ship,
        }
    }

    #[test]
    fn classifies_land_moves() {
        let f = fixture();
        let w = &f.world;
        assert_eq!(classify(w, f.colonist, Direction::N).unwrap(), MoveType::Move);
        assert_eq!(
            classify(w, f.scout, Direction::NE).unwrap(),
            MoveType::EnterNativeSettlementWithScout
        );
        assert_eq!(
            classify(w, f.soldier, Direction::E).unwrap(),
            MoveType::AttackUnit
        );
        assert_eq!(
            classify(w, f.scout, Direction::S).unwrap(),
            MoveType::MoveNoAttackCivilian
        );
        assert_eq!(
            classify(w, f.soldier, Direction::W).unwrap(),
            MoveType::Move
        );
    }

    #[test]
    fn colonist_without_skill_is_refused() {
        let mut f = fixture();
        let camp = f.world.settlement_at(Position::new(5, 2)).unwrap();
        f.world
            .settlement_mut(camp)
            .unwrap()
            .as_native_mut()
            .unwrap()
            .learnable_skill = None;
        assert_eq!(
            classify(&f.world, f.colonist, Direction::E).unwrap(),
            MoveType::MoveNoAccessSkill
        );
    }

    #[test]
    fn classifies_water_edges() {
        let f = fixture();
        let w = &f.world;
        assert_eq!(classify(w, f.ship, Direction::W).unwrap(), MoveType::MoveHighSeas);
        assert_eq!(classify(w, f.ship, Direction::E).unwrap(), MoveType::MoveNoAccessLand);
        assert_eq!(classify(w, f.ship, Direction::N).unwrap(), MoveType::Move);
    }

    #[test]
    fn no_moves_and_off_map() {
        let mut f = fixture();
        assert_eq!(
            classify(&f.world, f.ship, Direction::SW).unwrap(),
            MoveType::MoveHighSeas
        );
        f.world.unit_mut(f.ship).unwrap().moves_left = 0;
        assert_eq!(
            classify(&f.world, f.ship, Direction::N).unwrap(),
            MoveType::MoveNoMoves
        );
        let corner = f.world.spawn_unit(
            f.world.unit(f.colonist).unwrap().owner,
            f.world.unit(f.colonist).unwrap().unit_type,
            UnitRole::Default,
            Location::tile(Position::new(7, 0)),
        );
        assert_eq!(
            classify(&f.world, corner, Direction::NE).unwrap(),
            MoveType::MoveNoTile
        );
    }

    #[test]
    fn rumour_is_explored() {
        let mut f = fixture();
        let unit = f.world.units_at(Position::new(3, 4))[0];
        assert_eq!(unit, f.soldier);
        let explorer = f.world.spawn_unit(
            f.world.unit(f.colonist).unwrap().owner,
            f.world.unit(f.colonist).unwrap().unit_type,
            UnitRole::Default,
            Location::tile(Position::new(3, 1)),
        );
        assert_eq!(
            classify(&f.world, explorer, Direction::W).unwrap(),
            MoveType::ExploreLostCityRumour
        );
    }
}
