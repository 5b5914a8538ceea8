//! Scouts, tribute and trade sessions against native settlements.

use colonia_core::tension::TENSION_ADD_WAR_INCITER;
use colonia_core::{
    ChangeSet, GameEngine, GameError, GameOptions, NoDecisions, ScriptedDecisions, WorldBuilder,
};
use colonia_protocol::{
    Command, DecisionAnswer, DecisionRequest, Delta, Direction, Location, MissionaryAction, Notice,
    PlayerId, PlayerKind, Position, Rejection, ScoutAction, ScoutOutcome, SettlementId, Stance,
    Terrain, TensionLevel, UnitId, UnitRole,
};

struct Scenario {
    engine: GameEngine,
    dutch: PlayerId,
    sioux: PlayerId,
    camp: SettlementId,
}

/// A native camp at (5,4) with the Dutch already in contact.
fn scenario(setup: impl FnOnce(&mut WorldBuilder, PlayerId, PlayerId, SettlementId)) -> Scenario {
    let mut b = WorldBuilder::new(12, 8, Terrain::Plains).unwrap();
    let dutch = b.player("Dutch", PlayerKind::Colonial, true);
    let sioux = b.player("Sioux", PlayerKind::Native, false);
    b.stance(dutch, sioux, Stance::Peace);
    b.gold(dutch, 500);
    b.gold(sioux, 1000);
    let camp = b.native_settlement(sioux, "Camp", Position::new(5, 4), false);
    setup(&mut b, dutch, sioux, camp);
    Scenario {
        engine: GameEngine::new(b.build().unwrap()),
        dutch,
        sioux,
        camp,
    }
}

fn notices(cs: &ChangeSet, engine: &GameEngine, player: PlayerId) -> Vec<Notice> {
    cs.build(engine.world(), player)
        .into_iter()
        .filter_map(|d| match d {
            Delta::Message { notice } => Some(notice),
            _ => None,
        })
        .collect()
}

fn gold(engine: &GameEngine, player: PlayerId) -> i64 {
    engine.world().player(player).unwrap().gold
}

#[test]
fn first_scout_is_rewarded_and_second_learns_nothing() {
    let mut scouts = Vec::new();
    let mut s = scenario(|b, dutch, _, _| {
        scouts.push(b.unit(dutch, "free_colonist", UnitRole::Scout, Position::new(4, 4)));
        scouts.push(b.unit(dutch, "free_colonist", UnitRole::Scout, Position::new(4, 5)));
    });
    let (first, second) = (scouts[0], scouts[1]);

    let mut answers = ScriptedDecisions::new();
    answers.push(s.dutch, DecisionAnswer::Scout(ScoutAction::Speak));
    let cs = s
        .engine
        .apply(s.dutch, &Command::MoveUnit { unit: first, direction: Direction::E }, &mut answers)
        .unwrap();

    let outcome = notices(&cs, &s.engine, s.dutch)
        .into_iter()
        .find_map(|n| match n {
            Notice::ScoutResult { outcome, .. } => Some(outcome),
            _ => None,
        })
        .unwrap();
    assert!(matches!(
        outcome,
        ScoutOutcome::Expert | ScoutOutcome::Tales { .. } | ScoutOutcome::Beads { .. }
    ));
    assert_eq!(s.engine.world().unit(first).unwrap().moves_left, 0);
    let camp = s.engine.world().settlement(s.camp).unwrap();
    assert!(camp.as_native().unwrap().has_visited(s.dutch));

    let gold_before = gold(&s.engine, s.dutch);
    let mut answers = ScriptedDecisions::new();
    answers.push(s.dutch, DecisionAnswer::Scout(ScoutAction::Speak));
    let cs = s
        .engine
        .apply(s.dutch, &Command::MoveUnit { unit: second, direction: Direction::NE }, &mut answers)
        .unwrap();
    assert!(notices(&cs, &s.engine, s.dutch).iter().any(|n| matches!(
        n,
        Notice::ScoutResult {
            outcome: ScoutOutcome::Nothing,
            ..
        }
    )));
    assert_eq!(gold(&s.engine, s.dutch), gold_before);
    assert_eq!(s.engine.world().unit(second).unwrap().moves_left, 0);
}

#[test]
fn unanswered_scout_visit_changes_nothing() {
    let mut scout = None;
    let mut s = scenario(|b, dutch, _, _| {
        scout = Some(b.unit(dutch, "free_colonist", UnitRole::Scout, Position::new(4, 4)));
    });
    let scout = scout.unwrap();
    let before = s.engine.world().view(None);

    let err = s
        .engine
        .apply(s.dutch, &Command::MoveUnit { unit: scout, direction: Direction::E }, &mut NoDecisions)
        .unwrap_err();
    assert!(matches!(err, GameError::DecisionRequired { player, .. } if player == s.dutch));
    assert_eq!(s.engine.world().view(None), before);
}

fn soldier_next_to_camp() -> (Scenario, UnitId) {
    let mut soldier = None;
    let s = scenario(|b, dutch, _, _| {
        soldier = Some(b.unit(dutch, "veteran_soldier", UnitRole::Soldier, Position::new(4, 4)));
    });
    (s, soldier.unwrap())
}

#[test]
fn tribute_from_content_camp_takes_a_fraction_of_the_treasury() {
    let (mut s, soldier) = soldier_next_to_camp();
    s.engine
        .apply(
            s.dutch,
            &Command::DemandTribute { unit: soldier, settlement: s.camp },
            &mut NoDecisions,
        )
        .unwrap();
    // 20% of the tribe's 1000 gold.
    assert_eq!(gold(&s.engine, s.dutch), 700);
    assert_eq!(gold(&s.engine, s.sioux), 800);
    assert_eq!(s.engine.world().unit(soldier).unwrap().moves_left, 0);
}

#[test]
fn tribute_during_cooldown_pays_nothing_but_still_angers() {
    let (mut s, soldier) = soldier_next_to_camp();
    let turn = s.engine.world().turn;
    let camp = s.camp;
    s.engine
        .world_mut()
        .settlement_mut(camp)
        .unwrap()
        .as_native_mut()
        .unwrap()
        .last_tribute_turn = Some(turn);

    let cs = s
        .engine
        .apply(s.dutch, &Command::DemandTribute { unit: soldier, settlement: camp }, &mut NoDecisions)
        .unwrap();
    assert_eq!(gold(&s.engine, s.dutch), 500);
    assert_eq!(gold(&s.engine, s.sioux), 1000);
    assert!(notices(&cs, &s.engine, s.dutch)
        .contains(&Notice::TributePaid { settlement: camp, gold: 0 }));

    let native = s.engine.world().settlement(camp).unwrap().as_native().unwrap().clone();
    let tension = s.engine.world().options.tribute_tension;
    assert_eq!(native.alarm(s.dutch).value(), tension);
}

#[test]
fn tribute_needs_an_armed_unit() {
    let mut colonist = None;
    let mut s = scenario(|b, dutch, _, _| {
        colonist = Some(b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(4, 4)));
    });
    let err = s
        .engine
        .apply(
            s.dutch,
            &Command::DemandTribute { unit: colonist.unwrap(), settlement: s.camp },
            &mut NoDecisions,
        )
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::TributeNotAllowed));
}

/// A caravel on the coast next to the camp, carrying trade goods.
fn ship_at_camp() -> (Scenario, UnitId) {
    let mut ship = None;
    let s = scenario(|b, dutch, _, _| {
        b.terrain(Position::new(4, 4), Terrain::Ocean);
        let id = b.unit(dutch, "caravel", UnitRole::Default, Position::new(4, 4));
        b.cargo(id, "trade_goods", 100);
        ship = Some(id);
    });
    (s, ship.unwrap())
}

#[test]
fn closing_an_untouched_session_restores_moves() {
    let (mut s, ship) = ship_at_camp();
    let full = s.engine.world().unit(ship).unwrap().moves_left;
    assert!(full > 0);

    s.engine
        .apply(s.dutch, &Command::OpenTradeSession { unit: ship, settlement: s.camp }, &mut NoDecisions)
        .unwrap();
    assert_eq!(s.engine.world().unit(ship).unwrap().moves_left, 0);
    assert!(s.engine.sessions().is_open(ship, s.camp));

    s.engine
        .apply(s.dutch, &Command::CloseTradeSession { unit: ship, settlement: s.camp }, &mut NoDecisions)
        .unwrap();
    assert_eq!(s.engine.world().unit(ship).unwrap().moves_left, full);
    assert!(s.engine.sessions().is_empty());
}

#[test]
fn one_action_per_session() {
    let (mut s, ship) = ship_at_camp();
    let goods = s.engine.world().rules.goods_id("trade_goods").unwrap();
    s.engine
        .apply(s.dutch, &Command::OpenTradeSession { unit: ship, settlement: s.camp }, &mut NoDecisions)
        .unwrap();
    s.engine
        .apply(
            s.dutch,
            &Command::GiveGift { unit: ship, settlement: s.camp, goods, amount: 50 },
            &mut NoDecisions,
        )
        .unwrap();

    let err = s
        .engine
        .apply(
            s.dutch,
            &Command::SellGoods { unit: ship, settlement: s.camp, goods, amount: 50, price: None },
            &mut NoDecisions,
        )
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::SessionActionTaken));
    assert_eq!(s.engine.world().unit(ship).unwrap().goods_amount(goods), 50);

    // Acting consumed the visit: closing does not give the moves back.
    s.engine
        .apply(s.dutch, &Command::CloseTradeSession { unit: ship, settlement: s.camp }, &mut NoDecisions)
        .unwrap();
    assert_eq!(s.engine.world().unit(ship).unwrap().moves_left, 0);
}

#[test]
fn closing_a_session_never_opened_is_a_contract_violation() {
    let (mut s, ship) = ship_at_camp();
    let err = s
        .engine
        .apply(s.dutch, &Command::CloseTradeSession { unit: ship, settlement: s.camp }, &mut NoDecisions)
        .unwrap_err();
    assert!(err.is_contract_violation());
}

#[test]
fn end_of_turn_expires_open_sessions() {
    let (mut s, ship) = ship_at_camp();
    s.engine
        .apply(s.dutch, &Command::OpenTradeSession { unit: ship, settlement: s.camp }, &mut NoDecisions)
        .unwrap();
    s.engine.apply(s.dutch, &Command::EndTurn, &mut NoDecisions).unwrap();
    assert!(s.engine.sessions().is_empty());
}

#[test]
fn gifts_calm_the_camp() {
    let (mut s, ship) = ship_at_camp();
    let camp = s.camp;
    let dutch = s.dutch;
    s.engine
        .world_mut()
        .settlement_mut(camp)
        .unwrap()
        .as_native_mut()
        .unwrap()
        .alarm
        .insert(dutch, colonia_core::Tension::new(650));
    let goods = s.engine.world().rules.goods_id("trade_goods").unwrap();

    s.engine
        .apply(dutch, &Command::OpenTradeSession { unit: ship, settlement: camp }, &mut NoDecisions)
        .unwrap();
    s.engine
        .apply(dutch, &Command::GiveGift { unit: ship, settlement: camp, goods, amount: 100 }, &mut NoDecisions)
        .unwrap();

    let alarm = s.engine.world().settlement(camp).unwrap().as_native().unwrap().alarm(dutch);
    assert!(alarm.value() < 650);
    assert!(alarm.level() <= TensionLevel::Angry);
}

#[test]
fn a_refused_haggle_uses_up_the_visit() {
    let (mut s, ship) = ship_at_camp();
    let goods = s.engine.world().rules.goods_id("trade_goods").unwrap();
    s.engine
        .apply(s.dutch, &Command::OpenTradeSession { unit: ship, settlement: s.camp }, &mut NoDecisions)
        .unwrap();
    let greedy = Command::SellGoods {
        unit: ship,
        settlement: s.camp,
        goods,
        amount: 100,
        price: Some(1_000_000),
    };
    let cs = s.engine.apply(s.dutch, &greedy, &mut NoDecisions).unwrap();
    assert!(notices(&cs, &s.engine, s.dutch)
        .iter()
        .any(|n| matches!(n, Notice::HaggleFailed { .. })));
    assert_eq!(s.engine.world().unit(ship).unwrap().goods_amount(goods), 100);
    assert_eq!(gold(&s.engine, s.dutch), 500);

    let err = s.engine.apply(s.dutch, &greedy, &mut NoDecisions).unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::SessionActionTaken));

    s.engine
        .apply(s.dutch, &Command::CloseTradeSession { unit: ship, settlement: s.camp }, &mut NoDecisions)
        .unwrap();
    assert_eq!(s.engine.world().unit(ship).unwrap().moves_left, 0);
}

/// A Dutch missionary west of the camp, with the camp's alarm toward the
/// Dutch set to `alarm`.
fn missionary_next_to_camp(alarm: i32) -> (Scenario, UnitId) {
    let mut missionary = None;
    let s = scenario(|b, dutch, _, camp| {
        b.alarm(camp, dutch, alarm);
        missionary = Some(b.unit(dutch, "free_colonist", UnitRole::Missionary, Position::new(4, 4)));
    });
    (s, missionary.unwrap())
}

fn visit(s: &mut Scenario, unit: UnitId, answers: &[DecisionAnswer]) -> Result<ChangeSet, GameError> {
    let mut scripted = ScriptedDecisions::new();
    for answer in answers {
        scripted.push(s.dutch, answer.clone());
    }
    let cmd = Command::MoveUnit { unit, direction: Direction::E };
    s.engine.apply(s.dutch, &cmd, &mut scripted)
}

fn camp_missionary(s: &Scenario) -> Option<UnitId> {
    s.engine.world().settlement(s.camp).unwrap().as_native().unwrap().missionary
}

#[test]
fn calm_camps_accept_a_mission() {
    let (mut s, missionary) = missionary_next_to_camp(0);
    visit(&mut s, missionary, &[DecisionAnswer::Missionary(MissionaryAction::Establish)]).unwrap();
    assert_eq!(camp_missionary(&s), Some(missionary));
    assert_eq!(
        s.engine.world().unit(missionary).unwrap().location,
        Location::Settlement { settlement: s.camp }
    );
}

#[test]
fn angry_camps_refuse_a_mission() {
    let (mut s, missionary) = missionary_next_to_camp(750);
    let cs = visit(&mut s, missionary, &[DecisionAnswer::Missionary(MissionaryAction::Establish)])
        .unwrap();
    assert!(notices(&cs, &s.engine, s.dutch).contains(&Notice::MissionRefused { settlement: s.camp }));
    assert_eq!(camp_missionary(&s), None);
    let u = s.engine.world().unit(missionary).unwrap();
    assert_eq!(u.location, Location::tile(Position::new(4, 4)));
    assert_eq!(u.moves_left, 0);
}

#[test]
fn hateful_camps_kill_the_missionary() {
    let (mut s, missionary) = missionary_next_to_camp(900);
    let cs = visit(&mut s, missionary, &[DecisionAnswer::Missionary(MissionaryAction::Establish)])
        .unwrap();
    assert!(notices(&cs, &s.engine, s.dutch)
        .contains(&Notice::MissionaryKilled { settlement: s.camp }));
    assert!(s.engine.world().unit(missionary).is_err());
    assert_eq!(camp_missionary(&s), None);
}

struct Contest {
    s: Scenario,
    english: PlayerId,
    ours: UnitId,
    theirs: UnitId,
}

/// An English mission already in the camp, a Dutch missionary at the gate.
/// Denouncing succeeds when the roll reaches `threshold`.
fn contested_mission(threshold: u32) -> Contest {
    let mut ids = None;
    let s = scenario(|b, dutch, sioux, camp| {
        b.options(GameOptions { denounce_threshold: threshold, ..GameOptions::default() });
        let english = b.player("English", PlayerKind::Colonial, true);
        b.stance(english, sioux, Stance::Peace);
        let theirs = b.unit_at(
            english,
            "free_colonist",
            UnitRole::Missionary,
            Location::Settlement { settlement: camp },
        );
        b.world_mut()
            .settlement_mut(camp)
            .unwrap()
            .as_native_mut()
            .unwrap()
            .missionary = Some(theirs);
        let ours = b.unit(dutch, "free_colonist", UnitRole::Missionary, Position::new(4, 4));
        ids = Some((english, ours, theirs));
    });
    let (english, ours, theirs) = ids.unwrap();
    Contest { s, english, ours, theirs }
}

#[test]
fn occupied_missions_offer_a_denunciation() {
    let mut c = contested_mission(0);
    let err = visit(&mut c.s, c.ours, &[]).unwrap_err();
    let GameError::DecisionRequired { request, .. } = err.clone() else {
        panic!("expected a decision, got {err:?}");
    };
    assert_eq!(
        request,
        DecisionRequest::MissionarySettlement { unit: c.ours, settlement: c.s.camp, can_denounce: true }
    );
}

#[test]
fn a_successful_denunciation_replaces_the_rival() {
    let mut c = contested_mission(0);
    let cs = visit(&mut c.s, c.ours, &[DecisionAnswer::Missionary(MissionaryAction::Denounce)])
        .unwrap();
    let expected = Notice::MissionDenounced { settlement: c.s.camp, by: c.s.dutch, success: true };
    assert!(notices(&cs, &c.s.engine, c.s.dutch).contains(&expected));
    assert!(notices(&cs, &c.s.engine, c.english).contains(&expected));
    assert!(c.s.engine.world().unit(c.theirs).is_err());
    assert_eq!(camp_missionary(&c.s), Some(c.ours));
}

#[test]
fn a_failed_denunciation_costs_the_denouncer() {
    // Two equal immigration totals cap the roll at 99.
    let mut c = contested_mission(1000);
    let cs = visit(&mut c.s, c.ours, &[DecisionAnswer::Missionary(MissionaryAction::Denounce)])
        .unwrap();
    let expected = Notice::MissionDenounced { settlement: c.s.camp, by: c.s.dutch, success: false };
    assert!(notices(&cs, &c.s.engine, c.english).contains(&expected));
    assert!(c.s.engine.world().unit(c.ours).is_err());
    assert_eq!(camp_missionary(&c.s), Some(c.theirs));
}

/// The Sioux dislike the Dutch (300) more than the English (100).
fn incite_scenario(dutch_gold: i64) -> (Scenario, PlayerId, UnitId) {
    let mut ids = None;
    let s = scenario(|b, dutch, sioux, _| {
        b.gold(dutch, dutch_gold);
        let english = b.player("English", PlayerKind::Colonial, true);
        b.stance(english, sioux, Stance::Peace);
        b.world_mut().modify_tension(sioux, dutch, 300);
        b.world_mut().modify_tension(sioux, english, 100);
        let missionary = b.unit(dutch, "free_colonist", UnitRole::Missionary, Position::new(4, 4));
        ids = Some((english, missionary));
    });
    let (english, missionary) = ids.unwrap();
    (s, english, missionary)
}

fn incite_answers(english: PlayerId) -> Vec<DecisionAnswer> {
    vec![
        DecisionAnswer::Missionary(MissionaryAction::Incite),
        DecisionAnswer::Player(Some(english)),
    ]
}

#[test]
fn incite_price_is_the_floor_plus_the_grudge() {
    let (mut s, english, missionary) = incite_scenario(2000);
    let err = visit(&mut s, missionary, &incite_answers(english)).unwrap_err();
    let GameError::DecisionRequired { request, .. } = err.clone() else {
        panic!("expected a decision, got {err:?}");
    };
    let floor = s.engine.world().options.incite_gold_floor;
    assert_eq!(
        request,
        DecisionRequest::ConfirmIncite { settlement: s.camp, target: english, price: floor + 200 }
    );
}

#[test]
fn paid_incitement_starts_a_war_and_a_grudge() {
    let (mut s, english, missionary) = incite_scenario(2000);
    let price = s.engine.world().options.incite_price(300, 100) as i64;
    let mut answers = incite_answers(english);
    answers.push(DecisionAnswer::Confirm(true));
    let cs = visit(&mut s, missionary, &answers).unwrap();

    let world = s.engine.world();
    assert_eq!(gold(&s.engine, s.dutch), 2000 - price);
    assert_eq!(gold(&s.engine, s.sioux), 1000 + price);
    assert_eq!(world.stance(s.sioux, english), Stance::War);
    let sioux = world.player(s.sioux).unwrap();
    assert_eq!(sioux.tension_toward(english).level(), TensionLevel::Hateful);
    assert_eq!(sioux.tension_toward(s.dutch).value(), 300);
    let victim = world.player(english).unwrap();
    assert_eq!(victim.tension_toward(s.dutch).value(), TENSION_ADD_WAR_INCITER);
    assert_eq!(world.unit(missionary).unwrap().moves_left, 0);
    assert!(notices(&cs, &s.engine, english)
        .contains(&Notice::IncitedAgainst { inciter: s.dutch, native: s.sioux }));
}

#[test]
fn unaffordable_incitement_changes_nothing_but_moves() {
    let (mut s, english, missionary) = incite_scenario(100);
    let mut answers = incite_answers(english);
    answers.push(DecisionAnswer::Confirm(true));
    let cs = visit(&mut s, missionary, &answers).unwrap();

    let price = s.engine.world().options.incite_price(300, 100);
    assert!(notices(&cs, &s.engine, s.dutch)
        .contains(&Notice::InciteUnaffordable { settlement: s.camp, price }));
    assert_eq!(gold(&s.engine, s.dutch), 100);
    assert_ne!(s.engine.world().stance(s.sioux, english), Stance::War);
    assert_eq!(s.engine.world().unit(missionary).unwrap().moves_left, 0);
}
