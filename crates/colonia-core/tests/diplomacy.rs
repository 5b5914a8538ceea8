//! Trade negotiation between European players.

use colonia_core::{GameEngine, GameError, NoDecisions, ScriptedDecisions, WorldBuilder};
use colonia_protocol::{
    Command, DecisionAnswer, DiplomaticTrade, PlayerId, PlayerKind, Position, Rejection, Stance,
    Terrain, TradeItem, TradeStatus, UnitRole,
};

struct Table {
    engine: GameEngine,
    dutch: PlayerId,
    english: PlayerId,
}

fn table() -> Table {
    let mut b = WorldBuilder::new(10, 6, Terrain::Plains).unwrap();
    let dutch = b.player("Dutch", PlayerKind::Colonial, true);
    let english = b.player("English", PlayerKind::Colonial, true);
    b.stance(dutch, english, Stance::Peace);
    b.gold(dutch, 1000);
    b.gold(english, 200);
    b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(2, 2));
    b.unit(english, "free_colonist", UnitRole::Default, Position::new(7, 2));
    Table {
        engine: GameEngine::new(b.build().unwrap()),
        dutch,
        english,
    }
}

fn gold(t: &Table, player: PlayerId) -> i64 {
    t.engine.world().player(player).unwrap().gold
}

fn offer(t: &Table, amount: u32) -> DiplomaticTrade {
    DiplomaticTrade::propose(
        t.dutch,
        t.english,
        vec![TradeItem::Gold {
            from: t.dutch,
            amount,
        }],
    )
}

#[test]
fn accepted_trade_is_applied_once() {
    let mut t = table();
    let agreement = offer(&t, 300);
    let mut answers = ScriptedDecisions::new();
    answers.push(
        t.english,
        DecisionAnswer::Trade(agreement.clone().with_status(TradeStatus::Accept)),
    );
    t.engine
        .apply(t.dutch, &Command::ProposeTrade { agreement, via: None }, &mut answers)
        .unwrap();
    assert_eq!(gold(&t, t.dutch), 700);
    assert_eq!(gold(&t, t.english), 500);
    assert_eq!(answers.remaining(), 0);
}

#[test]
fn rejected_trade_changes_nothing() {
    let mut t = table();
    let before = t.engine.world().view(None);
    let agreement = offer(&t, 300);
    let mut answers = ScriptedDecisions::new();
    answers.push(
        t.english,
        DecisionAnswer::Trade(agreement.clone().with_status(TradeStatus::Reject)),
    );
    t.engine
        .apply(t.dutch, &Command::ProposeTrade { agreement, via: None }, &mut answers)
        .unwrap();
    assert_eq!(t.engine.world().view(None), before);
}

#[test]
fn accepting_an_altered_agreement_counts_as_rejection() {
    let mut t = table();
    let agreement = offer(&t, 300);
    let mut altered = offer(&t, 900);
    altered.status = TradeStatus::Accept;
    let mut answers = ScriptedDecisions::new();
    answers.push(t.english, DecisionAnswer::Trade(altered));
    t.engine
        .apply(t.dutch, &Command::ProposeTrade { agreement, via: None }, &mut answers)
        .unwrap();
    assert_eq!(gold(&t, t.dutch), 1000);
    assert_eq!(gold(&t, t.english), 200);
}

#[test]
fn counter_proposal_goes_back_to_the_sender() {
    let mut t = table();
    let agreement = offer(&t, 300);
    let mut counter = DiplomaticTrade::propose(
        t.english,
        t.dutch,
        vec![TradeItem::Gold {
            from: t.dutch,
            amount: 400,
        }],
    );
    counter.status = TradeStatus::Propose;
    let mut answers = ScriptedDecisions::new();
    answers.push(t.english, DecisionAnswer::Trade(counter.clone()));
    answers.push(
        t.dutch,
        DecisionAnswer::Trade(counter.with_status(TradeStatus::Accept)),
    );
    t.engine
        .apply(t.dutch, &Command::ProposeTrade { agreement, via: None }, &mut answers)
        .unwrap();
    assert_eq!(gold(&t, t.dutch), 600);
    assert_eq!(gold(&t, t.english), 600);
}

#[test]
fn stale_items_are_skipped() {
    let mut t = table();
    let agreement = offer(&t, 5000);
    let mut answers = ScriptedDecisions::new();
    answers.push(
        t.english,
        DecisionAnswer::Trade(agreement.clone().with_status(TradeStatus::Accept)),
    );
    t.engine
        .apply(t.dutch, &Command::ProposeTrade { agreement, via: None }, &mut answers)
        .unwrap();
    assert_eq!(gold(&t, t.dutch), 1000);
    assert_eq!(gold(&t, t.english), 200);
}

#[test]
fn impossible_stance_change_is_refused_up_front() {
    let mut t = table();
    let agreement = DiplomaticTrade::propose(
        t.dutch,
        t.english,
        vec![TradeItem::Stance {
            stance: Stance::CeaseFire,
        }],
    );
    let err = t
        .engine
        .apply(t.dutch, &Command::ProposeTrade { agreement, via: None }, &mut NoDecisions)
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::InvalidStanceChange));
}

#[test]
fn items_from_third_parties_are_refused() {
    let mut t = table();
    let mut agreement = offer(&t, 100);
    agreement.items.push(TradeItem::Gold {
        from: PlayerId(7),
        amount: 1,
    });
    let err = t
        .engine
        .apply(t.dutch, &Command::ProposeTrade { agreement, via: None }, &mut NoDecisions)
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::InvalidTrade));
}

#[test]
fn unanswered_proposal_waits_for_the_recipient() {
    let mut t = table();
    let agreement = offer(&t, 300);
    let err = t
        .engine
        .apply(t.dutch, &Command::ProposeTrade { agreement, via: None }, &mut NoDecisions)
        .unwrap_err();
    assert!(matches!(err, GameError::DecisionRequired { player, .. } if player == t.english));
    assert_eq!(gold(&t, t.dutch), 1000);
}
