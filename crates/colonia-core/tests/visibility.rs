//! What each player learns from an operation.

use std::sync::Arc;

use colonia_core::{movement, FixedCombat, GameEngine, NoDecisions, WorldBuilder};
use colonia_protocol::{
    CombatResult, Command, Delta, Direction, Location, ObjectId, ObjectSnapshot, PlayerId,
    PlayerKind, Position, Stance, Terrain, UnitId, UnitRole,
};
use proptest::prelude::*;

struct Scene {
    engine: GameEngine,
    dutch: PlayerId,
    english: PlayerId,
    french: PlayerId,
    spanish: PlayerId,
    soldier: UnitId,
    artillery: UnitId,
    colonist: UnitId,
}

/// Dutch soldier next to an English gun, a French colonist watching from
/// one tile away, and a Spaniard far off in the corner.
fn scene(result: CombatResult) -> Scene {
    let mut b = WorldBuilder::new(10, 6, Terrain::Plains).unwrap();
    let dutch = b.player("Dutch", PlayerKind::Colonial, true);
    let english = b.player("English", PlayerKind::Colonial, true);
    let french = b.player("French", PlayerKind::Colonial, true);
    let spanish = b.player("Spanish", PlayerKind::Colonial, true);
    b.stance(dutch, english, Stance::War);
    let soldier = b.unit(dutch, "veteran_soldier", UnitRole::Soldier, Position::new(3, 3));
    let colonist = b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(7, 5));
    let artillery = b.unit(english, "artillery", UnitRole::Default, Position::new(4, 3));
    b.unit(french, "free_colonist", UnitRole::Default, Position::new(5, 4));
    b.unit(spanish, "free_colonist", UnitRole::Default, Position::new(9, 0));
    let world = b.build().unwrap();
    Scene {
        engine: GameEngine::with_combat(world, Arc::new(FixedCombat(result))),
        dutch,
        english,
        french,
        spanish,
        soldier,
        artillery,
        colonist,
    }
}

fn mentions(delta: &Delta, object: ObjectId) -> bool {
    match delta {
        Delta::Update { object: snapshot } => snapshot.id() == object,
        Delta::Moved { unit, .. } => ObjectId::Unit(*unit) == object,
        Delta::Disappeared { object: o } | Delta::Disposed { object: o } => *o == object,
        Delta::Attack {
            attacker, defender, ..
        } => ObjectId::Unit(*attacker) == object || *defender == object,
        _ => false,
    }
}

fn about(deltas: &[Delta], object: ObjectId) -> Vec<Delta> {
    deltas.iter().filter(|d| mentions(d, object)).cloned().collect()
}

#[test]
fn a_destroyed_unit_is_only_ever_a_disposal() {
    let mut s = scene(CombatResult::AttackerWins);
    let cs = s
        .engine
        .apply(
            s.dutch,
            &Command::MoveUnit { unit: s.soldier, direction: Direction::E },
            &mut NoDecisions,
        )
        .unwrap();
    let world = s.engine.world();
    assert!(world.unit(s.artillery).is_err());

    let gun = ObjectId::Unit(s.artillery);
    let disposed = vec![Delta::Disposed { object: gun }];
    for player in [s.dutch, s.english, s.french] {
        assert_eq!(about(&cs.build(world, player), gun), disposed, "{player:?}");
    }
    assert!(about(&cs.build(world, s.spanish), gun).is_empty());
}

#[test]
fn a_lost_attack_demotes_and_everyone_nearby_sees_it() {
    let mut s = scene(CombatResult::DefenderWins);
    let cs = s
        .engine
        .apply(
            s.dutch,
            &Command::MoveUnit { unit: s.soldier, direction: Direction::E },
            &mut NoDecisions,
        )
        .unwrap();
    let world = s.engine.world();
    assert_eq!(world.unit(s.soldier).unwrap().role, UnitRole::Default);

    let french = cs.build(world, s.french);
    assert!(french.iter().any(|d| matches!(d, Delta::Attack { result: CombatResult::DefenderWins, .. })));
    assert!(cs.build(world, s.spanish).iter().all(|d| !matches!(d, Delta::Attack { .. })));
}

#[test]
fn foreign_observers_see_moves_without_private_fields() {
    let mut s = scene(CombatResult::AttackerWins);
    let cs = s
        .engine
        .apply(
            s.dutch,
            &Command::MoveUnit { unit: s.colonist, direction: Direction::W },
            &mut NoDecisions,
        )
        .unwrap();
    let world = s.engine.world();
    let colonist = ObjectId::Unit(s.colonist);

    let french = about(&cs.build(world, s.french), colonist);
    assert!(matches!(
        french.first(),
        Some(Delta::Moved { to: Location::Tile { position }, .. }) if *position == Position::new(6, 5)
    ));
    let Some(Delta::Update { object: ObjectSnapshot::Unit(snapshot) }) = french.get(1) else {
        panic!("expected an update after the move, got {french:?}");
    };
    assert_eq!(snapshot.moves_left, None);

    let own = cs.build(world, s.dutch);
    let own_update = own.iter().find_map(|d| match d {
        Delta::Update { object: ObjectSnapshot::Unit(u) } if u.id == s.colonist => Some(u),
        _ => None,
    });
    assert_eq!(own_update.and_then(|u| u.moves_left), Some(0));
    assert!(about(&cs.build(world, s.spanish), colonist).is_empty());
}

#[test]
fn player_views_strip_foreign_private_fields() {
    let s = scene(CombatResult::AttackerWins);
    let view = s.engine.world().view(Some(s.english));
    for unit in &view.units {
        if unit.owner == s.english {
            assert!(unit.moves_left.is_some());
        } else {
            assert_eq!(unit.moves_left, None);
        }
    }
    assert_eq!(view.viewer, Some(s.english));
}

proptest! {
    #[test]
    fn classify_is_a_pure_query(
        water in proptest::collection::vec(any::<bool>(), 60),
        x in 0i32..10,
        y in 0i32..6,
        dir in 0usize..8,
    ) {
        let mut b = WorldBuilder::new(10, 6, Terrain::Plains).unwrap();
        for (i, wet) in water.iter().enumerate() {
            if *wet {
                b.terrain(Position::new(i as i32 % 10, i as i32 / 10), Terrain::Ocean);
            }
        }
        let dutch = b.player("Dutch", PlayerKind::Colonial, true);
        let english = b.player("English", PlayerKind::Colonial, false);
        let unit = b.unit(dutch, "veteran_soldier", UnitRole::Soldier, Position::new(x, y));
        b.unit(english, "free_colonist", UnitRole::Default, Position::new((x + 1) % 10, y));
        let world = b.build().unwrap();

        let direction = Direction::ALL[dir];
        let before = world.view(None);
        let first = movement::classify(&world, unit, direction).unwrap();
        let second = movement::classify(&world, unit, direction).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(world.view(None), before);
    }
}
