//! End of turn, the yearly round, the crown and independence.

use colonia_core::{
    GameEngine, GameOptions, NoDecisions, Orders, PendingMonarch, World, WorldBuilder,
};
use colonia_protocol::{
    Command, Direction, Location, MonarchAction, PlayerId, PlayerKind, Position, Rejection,
    SettlementId, Stance, Terrain, TradeRouteId, TradeStop, UnitId, UnitRole, UnitState,
    VictoryReason,
};

struct Game {
    engine: GameEngine,
    dutch: PlayerId,
    sioux: PlayerId,
}

/// The Dutch and one native tribe, with the Dutch to move.
fn game(options: GameOptions, setup: impl FnOnce(&mut WorldBuilder, PlayerId)) -> Game {
    let mut b = WorldBuilder::new(12, 8, Terrain::Plains).unwrap();
    b.options(options);
    b.seed(11);
    let dutch = b.player("Dutch", PlayerKind::Colonial, true);
    let sioux = b.player("Sioux", PlayerKind::Native, false);
    b.native_settlement(sioux, "Camp", Position::new(10, 6), true);
    b.entry_location(dutch, Position::new(0, 1));
    b.terrain(Position::new(0, 1), Terrain::HighSeas);
    setup(&mut b, dutch);
    Game {
        engine: GameEngine::new(b.build().unwrap()),
        dutch,
        sioux,
    }
}

fn full_round(g: &mut Game) {
    g.engine.apply(g.dutch, &Command::EndTurn, &mut NoDecisions).unwrap();
    assert_eq!(g.engine.current_player(), g.sioux);
    g.engine.apply(g.sioux, &Command::EndTurn, &mut NoDecisions).unwrap();
    assert_eq!(g.engine.current_player(), g.dutch);
}

fn crown_only(weights: [u32; 4]) -> GameOptions {
    GameOptions {
        monarch_action_chance_pct: 100,
        monarch_weight_raise_tax: weights[0],
        monarch_weight_add_to_ref: weights[1],
        monarch_weight_declare_war: weights[2],
        monarch_weight_offer_mercenaries: weights[3],
        ..GameOptions::default()
    }
}

#[test]
fn goto_orders_move_or_skip_without_losing_the_destination() {
    let mut units = Vec::new();
    let mut g = game(GameOptions::default(), |b, dutch| {
        b.terrain(Position::new(1, 5), Terrain::Ocean);
        units.push(b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(1, 1)));
        units.push(b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(3, 1)));
    });
    let (stuck, walker) = (units[0], units[1]);
    for (unit, to) in [(stuck, Position::new(1, 5)), (walker, Position::new(3, 3))] {
        g.engine
            .apply(
                g.dutch,
                &Command::SetDestination { unit, destination: Some(Location::tile(to)) },
                &mut NoDecisions,
            )
            .unwrap();
    }

    g.engine.apply(g.dutch, &Command::ExecuteGotoOrders, &mut NoDecisions).unwrap();
    let world = g.engine.world();
    let stuck_unit = world.unit(stuck).unwrap();
    assert_eq!(stuck_unit.state, UnitState::Skipped);
    assert_eq!(world.destination(stuck_unit), Some(Location::tile(Position::new(1, 5))));
    let walker_unit = world.unit(walker).unwrap();
    // One step closer; any of the three tiles on row 2 is a shortest path.
    assert_eq!(world.unit_position(walker).map(|p| p.y), Some(2));
    assert_eq!(walker_unit.moves_left, 0);
    assert_eq!(world.destination(walker_unit), Some(Location::tile(Position::new(3, 3))));
}

#[test]
fn a_direct_move_spending_the_last_point_cancels_goto() {
    let mut unit = None;
    let mut g = game(GameOptions::default(), |b, dutch| {
        unit = Some(b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(3, 3)));
    });
    let unit = unit.unwrap();
    g.engine
        .apply(
            g.dutch,
            &Command::SetDestination {
                unit,
                destination: Some(Location::tile(Position::new(6, 3))),
            },
            &mut NoDecisions,
        )
        .unwrap();
    g.engine
        .apply(
            g.dutch,
            &Command::MoveUnit { unit, direction: Direction::S },
            &mut NoDecisions,
        )
        .unwrap();
    let u = g.engine.world().unit(unit).unwrap();
    assert_eq!(u.moves_left, 0);
    assert_eq!(g.engine.world().destination(u), None);
}

#[test]
fn new_round_restores_moves_and_wakes_skipped_units() {
    let mut unit = None;
    let mut g = game(GameOptions::default(), |b, dutch| {
        unit = Some(b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(3, 3)));
    });
    let unit = unit.unwrap();
    let turn = g.engine.world().turn;
    g.engine
        .apply(g.dutch, &Command::MoveUnit { unit, direction: Direction::E }, &mut NoDecisions)
        .unwrap();
    g.engine
        .apply(g.dutch, &Command::SetUnitState { unit, state: UnitState::Skipped }, &mut NoDecisions)
        .unwrap();

    full_round(&mut g);
    assert_eq!(g.engine.world().turn, turn + 1);
    let u = g.engine.world().unit(unit).unwrap();
    assert_eq!(u.state, UnitState::Active);
    assert_eq!(u.moves_left, 1);
}

#[test]
fn not_your_turn() {
    let mut g = game(GameOptions::default(), |b, dutch| {
        b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(3, 3));
    });
    let err = g.engine.apply(g.sioux, &Command::EndTurn, &mut NoDecisions).unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::NotYourTurn));
}

#[test]
fn tax_raise_waits_for_an_answer() {
    let mut g = game(crown_only([1, 0, 0, 0]), |b, dutch| {
        b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(3, 3));
    });
    full_round(&mut g);

    let pending = g.engine.world().player(g.dutch).unwrap().pending_monarch.clone();
    let [PendingMonarch::RaiseTax { tax, .. }] = pending.as_slice() else {
        panic!("expected one tax raise, got {pending:?}");
    };
    assert!(*tax > 0);

    g.engine
        .apply(
            g.dutch,
            &Command::AnswerMonarch { action: MonarchAction::RaiseTax, accept: true },
            &mut NoDecisions,
        )
        .unwrap();
    let dutch = g.engine.world().player(g.dutch).unwrap();
    assert_eq!(dutch.tax, *tax);
    assert!(dutch.pending_monarch.is_empty());

    let err = g
        .engine
        .apply(
            g.dutch,
            &Command::AnswerMonarch { action: MonarchAction::RaiseTax, accept: true },
            &mut NoDecisions,
        )
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::NoPendingMonarchAction));
}

#[test]
fn refusing_a_tax_raise_boycotts_the_goods() {
    let mut g = game(crown_only([1, 0, 0, 0]), |b, dutch| {
        b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(3, 3));
    });
    full_round(&mut g);
    let goods = match g.engine.world().player(g.dutch).unwrap().pending_monarch.first() {
        Some(PendingMonarch::RaiseTax { goods, .. }) => *goods,
        other => panic!("expected a tax raise, got {other:?}"),
    };
    g.engine
        .apply(
            g.dutch,
            &Command::AnswerMonarch { action: MonarchAction::RaiseTax, accept: false },
            &mut NoDecisions,
        )
        .unwrap();
    let dutch = g.engine.world().player(g.dutch).unwrap();
    assert_eq!(dutch.tax, 0);
    assert!(dutch.market.is_boycotted(goods));
}

#[test]
fn crown_reinforces_the_expeditionary_force() {
    let mut g = game(crown_only([0, 1, 0, 0]), |b, dutch| {
        b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(3, 3));
    });
    let total = |g: &Game| -> u32 {
        g.engine.world().player(g.dutch).unwrap().royal_force.values().sum()
    };
    let before = total(&g);
    full_round(&mut g);
    let added = total(&g) - before;
    assert!((1..=2).contains(&added));
}

#[test]
fn mercenaries_cost_gold_when_accepted() {
    let mut g = game(crown_only([0, 0, 0, 1]), |b, dutch| {
        b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(3, 3));
        b.gold(dutch, 5000);
    });
    full_round(&mut g);
    let units_before = g.engine.world().units_of(g.dutch).len();
    g.engine
        .apply(
            g.dutch,
            &Command::AnswerMonarch { action: MonarchAction::OfferMercenaries, accept: true },
            &mut NoDecisions,
        )
        .unwrap();
    let price = g.engine.world().options.mercenary_price as i64;
    assert_eq!(g.engine.world().player(g.dutch).unwrap().gold, 5000 - price);
    let hired = g.engine.world().rules.mercenaries.iter().map(|(_, n)| *n as usize).sum::<usize>();
    assert_eq!(g.engine.world().units_of(g.dutch).len(), units_before + hired);
}

#[test]
fn founding_fathers_are_offered_and_chosen() {
    let mut g = game(GameOptions::default(), |b, dutch| {
        b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(3, 3));
    });
    full_round(&mut g);
    let offers = g.engine.world().player(g.dutch).unwrap().father_offers.clone();
    assert_eq!(offers.len(), 5);

    let not_offered = g
        .engine
        .world()
        .rules
        .fathers
        .iter()
        .map(|f| f.id)
        .find(|f| !offers.contains(f))
        .unwrap();
    let err = g
        .engine
        .apply(g.dutch, &Command::ChooseFoundingFather { father: not_offered }, &mut NoDecisions)
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::FatherNotOffered));

    g.engine
        .apply(g.dutch, &Command::ChooseFoundingFather { father: offers[0] }, &mut NoDecisions)
        .unwrap();
    assert_eq!(g.engine.world().player(g.dutch).unwrap().current_father, Some(offers[0]));
}

#[test]
fn ships_reach_the_new_world_after_sailing() {
    let mut ship = None;
    let mut g = game(GameOptions::default(), |b, dutch| {
        ship = Some(b.unit_at(dutch, "caravel", UnitRole::Default, Location::Europe));
    });
    let ship = ship.unwrap();
    g.engine
        .apply(g.dutch, &Command::SailToAmerica { unit: ship }, &mut NoDecisions)
        .unwrap();
    assert_eq!(g.engine.world().unit(ship).unwrap().state, UnitState::ToAmerica);

    for _ in 0..g.engine.world().options.sail_turns {
        full_round(&mut g);
    }
    let u = g.engine.world().unit(ship).unwrap();
    assert_eq!(u.state, UnitState::Active);
    assert_eq!(u.location, Location::tile(Position::new(0, 1)));
}

fn rebellious_colony(b: &mut WorldBuilder, dutch: PlayerId) -> SettlementId {
    let colony = b.colony(dutch, "Nieuw Amsterdam", Position::new(4, 3));
    b.unit_at(dutch, "free_colonist", UnitRole::Default, Location::Settlement { settlement: colony });
    colony
}

fn set_bells(g: &mut Game, colony: SettlementId, bells: i32) {
    g.engine
        .world_mut()
        .settlement_mut(colony)
        .unwrap()
        .as_colony_mut()
        .unwrap()
        .bells = bells;
}

#[test]
fn independence_needs_rebels_and_a_name() {
    let mut colony = None;
    let mut g = game(GameOptions::default(), |b, dutch| {
        colony = Some(rebellious_colony(b, dutch));
    });
    let err = g
        .engine
        .apply(
            g.dutch,
            &Command::DeclareIndependence { nation_name: "Free Netherlands".into() },
            &mut NoDecisions,
        )
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::CannotDeclareIndependence));

    set_bells(&mut g, colony.unwrap(), 100);
    let err = g
        .engine
        .apply(g.dutch, &Command::DeclareIndependence { nation_name: "  ".into() }, &mut NoDecisions)
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::EmptyName));
}

#[test]
fn declaring_independence_brings_the_crown_to_war() {
    let mut colony = None;
    let mut g = game(GameOptions::default(), |b, dutch| {
        colony = Some(rebellious_colony(b, dutch));
    });
    set_bells(&mut g, colony.unwrap(), 100);

    g.engine
        .apply(
            g.dutch,
            &Command::DeclareIndependence { nation_name: "Free Netherlands".into() },
            &mut NoDecisions,
        )
        .unwrap();

    let world = g.engine.world();
    let rebel = world.player(g.dutch).unwrap();
    assert_eq!(rebel.kind, PlayerKind::Rebel);
    let royal = rebel.opponent.unwrap();
    assert_eq!(world.player(royal).unwrap().kind, PlayerKind::Royal);
    assert_eq!(world.stance(g.dutch, royal), Stance::War);

    // Two men-o-war carry the whole land force; nothing is left in reserve.
    let royal_units: Vec<UnitId> = world.units_of(royal);
    assert_eq!(royal_units.len(), 10);
    assert!(rebel.royal_force.is_empty());
    let aboard = royal_units
        .iter()
        .filter(|u| matches!(world.unit(**u).unwrap().location, Location::Carrier { .. }))
        .count();
    assert_eq!(aboard, 8);
}

#[test]
fn last_european_standing_wins() {
    let mut english = None;
    let mut g = game(GameOptions::default(), |b, dutch| {
        b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(3, 3));
        english = Some(b.player("English", PlayerKind::Colonial, true));
    });
    g.engine.apply(g.dutch, &Command::EndTurn, &mut NoDecisions).unwrap();

    let world = g.engine.world();
    assert!(world.player(english.unwrap()).unwrap().dead);
    assert_eq!(world.game_over, Some((Some(g.dutch), VictoryReason::SoleEuropean)));
    let check = g.engine.check_victory().unwrap();
    assert_eq!(check.winner, Some(g.dutch));

    let err = g.engine.apply(g.dutch, &Command::EndTurn, &mut NoDecisions).unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::GameOver));
}

#[test]
fn a_table_of_absent_players_still_runs_one_round_at_a_time() {
    let mut b = WorldBuilder::new(8, 6, Terrain::Plains).unwrap();
    let dutch = b.player("Dutch", PlayerKind::Colonial, true);
    let english = b.player("English", PlayerKind::Colonial, true);
    b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(2, 2));
    b.unit(english, "free_colonist", UnitRole::Default, Position::new(5, 4));
    for p in [dutch, english] {
        b.world_mut().player_mut(p).unwrap().connected = false;
    }
    let mut engine = GameEngine::new(b.build().unwrap());
    let turn = engine.world().turn;

    engine.apply(dutch, &Command::EndTurn, &mut NoDecisions).unwrap();
    assert_eq!(engine.world().turn, turn + 1);
    assert_eq!(engine.current_player(), english);

    engine.apply(english, &Command::EndTurn, &mut NoDecisions).unwrap();
    assert_eq!(engine.world().turn, turn + 2);
    assert_eq!(engine.current_player(), dutch);
}

fn create_route(g: &mut Game, name: &str, stops: Vec<TradeStop>) -> TradeRouteId {
    let cmd = Command::CreateTradeRoute { name: name.into(), stops };
    g.engine.apply(g.dutch, &cmd, &mut NoDecisions).unwrap();
    g.engine
        .world()
        .trade_routes
        .iter_ordered()
        .find(|(_, r)| r.name == name)
        .map(|(id, _)| id)
        .unwrap()
}

fn assign(g: &mut Game, unit: UnitId, route: TradeRouteId) {
    g.engine
        .apply(g.dutch, &Command::AssignTradeRoute { unit, route: Some(route) }, &mut NoDecisions)
        .unwrap();
}

/// A unit on a route always heads for the route's current stop.
fn assert_heading_for_current_stop(world: &World, unit: UnitId) -> usize {
    let u = world.unit(unit).unwrap();
    let Orders::Route { route, stop } = u.orders else {
        panic!("{unit:?} has no route: {:?}", u.orders);
    };
    let settlement = world.trade_route(route).unwrap().stops[stop].settlement;
    assert_eq!(world.destination(u), Some(Location::Settlement { settlement }));
    stop
}

struct Port {
    g: Game,
    home: SettlementId,
    away: SettlementId,
    ships: Vec<UnitId>,
}

/// Two Dutch colonies, `ships` caravels moored in the first one, which holds
/// `furs` furs.
fn port(ships: usize, furs: u32) -> Port {
    let mut ids = None;
    let g = game(GameOptions::default(), |b, dutch| {
        let home = b.colony(dutch, "Fort Oranje", Position::new(3, 3));
        let away = b.colony(dutch, "Nieuw Amsterdam", Position::new(7, 3));
        b.colony_goods(home, "furs", furs);
        let docked = Location::Settlement { settlement: home };
        let ships = (0..ships)
            .map(|_| b.unit_at(dutch, "caravel", UnitRole::Default, docked))
            .collect();
        ids = Some((home, away, ships));
    });
    let (home, away, ships) = ids.unwrap();
    Port { g, home, away, ships }
}

fn fur_run(p: &Port) -> Vec<TradeStop> {
    let furs = p.g.engine.world().rules.goods_id("furs").unwrap();
    vec![
        TradeStop { settlement: p.home, load: vec![furs] },
        TradeStop { settlement: p.away, load: vec![] },
    ]
}

#[test]
fn route_units_always_head_for_their_current_stop() {
    let mut p = port(1, 100);
    let ship = p.ships[0];
    let stops = fur_run(&p);
    let route = create_route(&mut p.g, "Furs", stops);

    assign(&mut p.g, ship, route);
    assert_eq!(assert_heading_for_current_stop(p.g.engine.world(), ship), 0);

    let err = p
        .g
        .engine
        .apply(
            p.g.dutch,
            &Command::SetDestination { unit: ship, destination: Some(Location::Europe) },
            &mut NoDecisions,
        )
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::TradeRouteAssigned));
    assert_eq!(assert_heading_for_current_stop(p.g.engine.world(), ship), 0);

    // Already docked at the first stop: it loads and turns toward the second.
    p.g.engine.apply(p.g.dutch, &Command::ExecuteGotoOrders, &mut NoDecisions).unwrap();
    let world = p.g.engine.world();
    assert_eq!(assert_heading_for_current_stop(world, ship), 1);
    assert_eq!(
        world.destination(world.unit(ship).unwrap()),
        Some(Location::Settlement { settlement: p.away })
    );
    let furs = world.rules.goods_id("furs").unwrap();
    assert_eq!(world.unit(ship).unwrap().goods_amount(furs), 100);
    assert_eq!(world.unit(ship).unwrap().moves_left, 0);

    // Clearing the route lifts the restriction again.
    p.g.engine
        .apply(p.g.dutch, &Command::AssignTradeRoute { unit: ship, route: None }, &mut NoDecisions)
        .unwrap();
    assert_eq!(p.g.engine.world().destination(p.g.engine.world().unit(ship).unwrap()), None);
}

#[test]
fn goto_orders_run_by_route_name_then_unit() {
    let mut p = port(3, 250);
    let stops = fur_run(&p);
    // Created first, but sorts after "Alpha".
    let beta = create_route(&mut p.g, "Beta", stops.clone());
    let alpha = create_route(&mut p.g, "Alpha", stops);
    let (first_built, second_built, third_built) = (p.ships[0], p.ships[1], p.ships[2]);
    assign(&mut p.g, first_built, beta);
    assign(&mut p.g, third_built, alpha);
    assign(&mut p.g, second_built, alpha);

    p.g.engine.apply(p.g.dutch, &Command::ExecuteGotoOrders, &mut NoDecisions).unwrap();

    // Whoever is serviced first takes a full hold; the last finds nothing left.
    let world = p.g.engine.world();
    let furs = world.rules.goods_id("furs").unwrap();
    let loaded = |unit| world.unit(unit).unwrap().goods_amount(furs);
    assert_eq!(loaded(second_built), 200);
    assert_eq!(loaded(third_built), 50);
    assert_eq!(loaded(first_built), 0);
}

/// Ends turns until the year changes.
fn end_round(g: &mut Game) {
    let turn = g.engine.world().turn;
    for _ in 0..g.engine.world().players.len() {
        let current = g.engine.current_player();
        g.engine.apply(current, &Command::EndTurn, &mut NoDecisions).unwrap();
        if g.engine.world().turn != turn {
            return;
        }
    }
    panic!("the year never turned");
}

#[test]
fn spanish_succession_hands_the_weakest_crown_to_the_strongest() {
    let mut ids = None;
    let options = GameOptions { monarch_action_chance_pct: 0, ..GameOptions::default() };
    let mut g = game(options, |b, dutch| {
        let colony = rebellious_colony(b, dutch);
        let france = b.player("France", PlayerKind::Colonial, false);
        let spain = b.player("Spain", PlayerKind::Colonial, false);
        let fort = b.colony(france, "Port Royal", Position::new(8, 2));
        let inside = Location::Settlement { settlement: fort };
        b.unit_at(france, "free_colonist", UnitRole::Default, inside);
        b.gold(france, 0);
        let soldier = b.unit(spain, "veteran_soldier", UnitRole::Soldier, Position::new(1, 6));
        b.gold(spain, 900);
        ids = Some((colony, france, spain, soldier));
    });
    let (colony, france, spain, soldier) = ids.unwrap();
    set_bells(&mut g, colony, 100);

    end_round(&mut g);
    let world = g.engine.world();
    assert!(world.spanish_succession_done);
    assert!(world.player(spain).unwrap().dead);
    assert_eq!(world.unit(soldier).unwrap().owner, france);
    assert_eq!(world.player(france).unwrap().gold, 900);
    assert_eq!(world.player(spain).unwrap().gold, 0);
    assert!(!world.player(g.dutch).unwrap().dead);
}

#[test]
fn no_succession_while_the_colonies_are_loyal() {
    let mut spain = None;
    let options = GameOptions { monarch_action_chance_pct: 0, ..GameOptions::default() };
    let mut g = game(options, |b, dutch| {
        rebellious_colony(b, dutch);
        let france = b.player("France", PlayerKind::Colonial, false);
        b.unit(france, "free_colonist", UnitRole::Default, Position::new(8, 2));
        let id = b.player("Spain", PlayerKind::Colonial, false);
        b.unit(id, "free_colonist", UnitRole::Default, Position::new(8, 5));
        spain = Some(id);
    });
    end_round(&mut g);
    assert!(!g.engine.world().spanish_succession_done);
    assert!(!g.engine.world().player(spain.unwrap()).unwrap().dead);
}

#[test]
fn beating_the_expeditionary_force_wins_independence() {
    let mut colony = None;
    let mut g = game(GameOptions::default(), |b, dutch| {
        colony = Some(rebellious_colony(b, dutch));
    });
    set_bells(&mut g, colony.unwrap(), 100);
    g.engine
        .apply(
            g.dutch,
            &Command::DeclareIndependence { nation_name: "Free Netherlands".into() },
            &mut NoDecisions,
        )
        .unwrap();
    let royal = g.engine.world().player(g.dutch).unwrap().opponent.unwrap();
    let mut land: Vec<UnitId> = {
        let world = g.engine.world();
        world
            .units_of(royal)
            .into_iter()
            .filter(|u| !world.is_naval(world.unit(*u).unwrap()))
            .collect()
    };
    let last_regular = land.pop().unwrap();
    for unit in land {
        g.engine.world_mut().dispose_unit(unit);
    }

    // One regular left: the war goes on.
    g.engine.apply(g.dutch, &Command::EndTurn, &mut NoDecisions).unwrap();
    assert_eq!(g.engine.world().player(g.dutch).unwrap().kind, PlayerKind::Rebel);
    assert_eq!(g.engine.world().game_over, None);

    g.engine.world_mut().dispose_unit(last_regular);
    g.engine.apply(g.sioux, &Command::EndTurn, &mut NoDecisions).unwrap();

    let world = g.engine.world();
    assert_eq!(world.player(g.dutch).unwrap().kind, PlayerKind::Independent);
    assert_eq!(world.stance(g.dutch, royal), Stance::Peace);
    assert!(world.units_of(royal).is_empty());
    assert_eq!(world.game_over, Some((Some(g.dutch), VictoryReason::RefDefeated)));
}
