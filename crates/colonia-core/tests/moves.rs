//! Boarding ships from the shore and landing passengers.

use colonia_core::{
    DecisionSource, GameEngine, GameError, NoDecisions, ScriptedDecisions, WorldBuilder,
};
use colonia_protocol::{
    Command, DecisionAnswer, DecisionRequest, Direction, Location, MoveType, PlayerId, PlayerKind,
    Position, Rejection, Terrain, UnitId, UnitRole, UnitState,
};

struct Coast {
    engine: GameEngine,
    dutch: PlayerId,
    colonist: UnitId,
    ships: Vec<UnitId>,
}

// Column 1 is ocean, everything else plains. The colonist stands at (2,3)
// and `ships` are moored at (1,3).
fn coast(ships: &[&str], setup: impl FnOnce(&mut WorldBuilder, PlayerId, &[UnitId])) -> Coast {
    let mut b = WorldBuilder::new(8, 6, Terrain::Plains).unwrap();
    for y in 0..6 {
        b.terrain(Position::new(1, y), Terrain::Ocean);
    }
    let dutch = b.player("Dutch", PlayerKind::Colonial, true);
    let colonist = b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(2, 3));
    let ships: Vec<UnitId> = ships
        .iter()
        .map(|key| b.unit(dutch, key, UnitRole::Default, Position::new(1, 3)))
        .collect();
    setup(&mut b, dutch, &ships);
    Coast {
        engine: GameEngine::new(b.build().unwrap()),
        dutch,
        colonist,
        ships,
    }
}

fn walk_west(c: &mut Coast, decisions: &mut dyn DecisionSource) -> Result<(), GameError> {
    let cmd = Command::MoveUnit { unit: c.colonist, direction: Direction::W };
    c.engine.apply(c.dutch, &cmd, decisions).map(|_| ())
}

#[test]
fn a_single_carrier_is_boarded_without_asking() {
    let mut c = coast(&["caravel"], |_, _, _| {});
    walk_west(&mut c, &mut NoDecisions).unwrap();

    let u = c.engine.world().unit(c.colonist).unwrap();
    assert_eq!(u.location, Location::Carrier { unit: c.ships[0] });
    assert_eq!(u.state, UnitState::Sentry);
    assert_eq!(u.moves_left, 0);
}

#[test]
fn full_ships_are_not_candidates() {
    let mut c = coast(&["caravel", "caravel"], |b, _, ships| {
        b.cargo(ships[0], "furs", 200);
    });
    walk_west(&mut c, &mut NoDecisions).unwrap();
    let u = c.engine.world().unit(c.colonist).unwrap();
    assert_eq!(u.location, Location::Carrier { unit: c.ships[1] });
}

#[test]
fn several_carriers_ask_which_one() {
    let mut c = coast(&["caravel", "merchantman"], |_, _, _| {});
    let err = walk_west(&mut c, &mut NoDecisions).unwrap_err();
    let GameError::DecisionRequired { player, request } = err.clone() else {
        panic!("expected a decision, got {err:?}");
    };
    assert_eq!(player, c.dutch);
    assert_eq!(
        request,
        DecisionRequest::ChooseCarrier {
            unit: c.colonist,
            candidates: c.ships.clone(),
        }
    );
    // Nothing moved while the question was open.
    assert_eq!(
        c.engine.world().unit(c.colonist).unwrap().location,
        Location::tile(Position::new(2, 3))
    );

    let mut answers = ScriptedDecisions::new();
    answers.push(c.dutch, DecisionAnswer::Unit(c.ships[1]));
    walk_west(&mut c, &mut answers).unwrap();
    assert_eq!(
        c.engine.world().unit(c.colonist).unwrap().location,
        Location::Carrier { unit: c.ships[1] }
    );
}

#[test]
fn choosing_a_ship_that_was_not_offered_is_a_contract_violation() {
    let mut c = coast(&["caravel", "merchantman"], |_, _, _| {});
    let mut answers = ScriptedDecisions::new();
    answers.push(c.dutch, DecisionAnswer::Unit(c.colonist));
    let err = walk_west(&mut c, &mut answers).unwrap_err();
    assert!(matches!(err, GameError::UnexpectedAnswer { .. }));
    assert!(err.is_contract_violation());
}

/// A caravel at (1,3) carrying two colonists, one of them already spent.
fn loaded_ship() -> (GameEngine, PlayerId, UnitId, UnitId, UnitId) {
    let mut b = WorldBuilder::new(8, 6, Terrain::Plains).unwrap();
    for y in 0..6 {
        b.terrain(Position::new(1, y), Terrain::Ocean);
    }
    let dutch = b.player("Dutch", PlayerKind::Colonial, true);
    let ship = b.unit(dutch, "caravel", UnitRole::Default, Position::new(1, 3));
    let aboard = Location::Carrier { unit: ship };
    let fresh = b.unit_at(dutch, "free_colonist", UnitRole::Default, aboard);
    let tired = b.unit_at(dutch, "free_colonist", UnitRole::Default, aboard);
    b.world_mut().unit_mut(tired).unwrap().moves_left = 0;
    (GameEngine::new(b.build().unwrap()), dutch, ship, fresh, tired)
}

#[test]
fn landing_offers_only_passengers_with_moves() {
    let (mut engine, dutch, ship, fresh, tired) = loaded_ship();
    let land = Command::MoveUnit { unit: ship, direction: Direction::E };
    let err = engine.apply(dutch, &land, &mut NoDecisions).unwrap_err();
    let GameError::DecisionRequired { request, .. } = err.clone() else {
        panic!("expected a decision, got {err:?}");
    };
    assert_eq!(
        request,
        DecisionRequest::ChooseDisembark { carrier: ship, candidates: vec![fresh] }
    );

    let mut answers = ScriptedDecisions::new();
    answers.push(dutch, DecisionAnswer::Units(vec![fresh]));
    engine.apply(dutch, &land, &mut answers).unwrap();

    let world = engine.world();
    assert_eq!(world.unit(fresh).unwrap().location, Location::tile(Position::new(2, 3)));
    assert_eq!(world.unit(tired).unwrap().location, Location::Carrier { unit: ship });
    // The ship itself stays at sea.
    assert_eq!(world.unit(ship).unwrap().location, Location::tile(Position::new(1, 3)));
}

#[test]
fn landing_with_nobody_able_to_move_is_refused() {
    let (mut engine, dutch, ship, fresh, _) = loaded_ship();
    engine.world_mut().unit_mut(fresh).unwrap().moves_left = 0;
    let land = Command::MoveUnit { unit: ship, direction: Direction::E };
    let err = engine.apply(dutch, &land, &mut NoDecisions).unwrap_err();
    assert_eq!(
        err.rejection(),
        Some(&Rejection::IllegalMove { move_type: MoveType::MoveNoAccessLand })
    );
}
