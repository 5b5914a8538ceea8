//! Replica and orchestrator behaviour, fed by a real engine standing in for
//! the server.

use colonia_client::{ClientError, ClientEvent, MoveMode, Orchestrator, Replica};
use colonia_core::{GameEngine, NoDecisions, PassiveDecisions, WorldBuilder};
use colonia_protocol::wire::view_hash;
use colonia_protocol::{
    CombatResult, Command, DecisionAnswer, DecisionRequest, Delta, Direction, GoodsTypeId,
    MonarchAction, ObjectId, PlayerId, PlayerKind, Position, Stance, Terrain, UnitId, UnitRole,
};
use colonia_server::{ClientMessage, ServerMessage};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

struct Table {
    engine: GameEngine,
    dutch: PlayerId,
    english: PlayerId,
    colonist: UnitId,
    soldier: UnitId,
    artillery: UnitId,
}

fn table() -> Table {
    let mut b = WorldBuilder::new(10, 6, Terrain::Plains).unwrap();
    let dutch = b.player("Dutch", PlayerKind::Colonial, true);
    let english = b.player("English", PlayerKind::Colonial, true);
    b.stance(dutch, english, Stance::War);
    let colonist = b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(1, 1));
    let soldier = b.unit(dutch, "veteran_soldier", UnitRole::Soldier, Position::new(6, 3));
    let artillery = b.unit(english, "artillery", UnitRole::Default, Position::new(7, 3));
    let engine = GameEngine::with_combat(
        b.build().unwrap(),
        std::sync::Arc::new(colonia_core::FixedCombat(CombatResult::AttackerWins)),
    );
    Table {
        engine,
        dutch,
        english,
        colonist,
        soldier,
        artillery,
    }
}

fn state_for(t: &Table, player: PlayerId) -> ServerMessage {
    let view = t.engine.world().view(Some(player));
    let checksum = view_hash(&view).unwrap();
    ServerMessage::GameState { view, checksum }
}

type Client = Orchestrator<UnboundedSender<ClientMessage>>;

fn seated(t: &Table, player: PlayerId, decider: Box<dyn colonia_core::DecisionSource + Send>) -> (Client, UnboundedReceiver<ClientMessage>) {
    let (outbox, sent) = mpsc::unbounded_channel();
    let mut client = Orchestrator::new(outbox, decider);
    client
        .handle(ServerMessage::JoinAccepted {
            player_id: player,
            reconnect_token: "token".into(),
        })
        .unwrap();
    client.handle(state_for(t, player)).unwrap();
    (client, sent)
}

fn drain(sent: &mut UnboundedReceiver<ClientMessage>) -> Vec<ClientMessage> {
    let mut out = Vec::new();
    while let Ok(message) = sent.try_recv() {
        out.push(message);
    }
    out
}

#[test]
fn replica_follows_an_ordinary_move() {
    let mut t = table();
    let view = t.engine.world().view(Some(t.dutch));
    let mut replica = Replica::new(view.clone(), view_hash(&view).unwrap());

    let cs = t
        .engine
        .apply(
            t.dutch,
            &Command::MoveUnit {
                unit: t.colonist,
                direction: Direction::E,
            },
            &mut NoDecisions,
        )
        .unwrap();
    let deltas = cs.build(t.engine.world(), t.dutch);
    let after = t.engine.world().view(Some(t.dutch));
    replica.apply(&deltas, view_hash(&after).unwrap());

    assert_eq!(replica.unit_position(t.colonist), Some(Position::new(2, 1)));
    let server_side = after.units.iter().find(|u| u.id == t.colonist);
    assert_eq!(replica.unit(t.colonist), server_side);
}

#[test]
fn a_destroyed_unit_leaves_the_replica() {
    let mut t = table();
    let view = t.engine.world().view(Some(t.dutch));
    assert!(view.units.iter().any(|u| u.id == t.artillery));
    let mut replica = Replica::new(view.clone(), 0);

    let cs = t
        .engine
        .apply(
            t.dutch,
            &Command::MoveUnit {
                unit: t.soldier,
                direction: Direction::E,
            },
            &mut NoDecisions,
        )
        .unwrap();
    let deltas = cs.build(t.engine.world(), t.dutch);
    assert!(deltas.contains(&Delta::Disposed {
        object: ObjectId::Unit(t.artillery)
    }));
    replica.apply(&deltas, 0);

    assert!(replica.unit(t.artillery).is_none());
    assert!(replica.unit(t.soldier).is_some());
}

#[test]
fn stance_changes_are_symmetric_in_the_replica() {
    let t = table();
    let view = t.engine.world().view(Some(t.dutch));
    let mut replica = Replica::new(view, 0);
    replica.apply(
        &[Delta::Stance {
            player: t.english,
            other: t.dutch,
            stance: Stance::Peace,
        }],
        0,
    );
    assert_eq!(replica.stance(t.dutch, t.english), Stance::Peace);
    assert_eq!(replica.stance(t.english, t.dutch), Stance::Peace);
}

#[test]
fn joining_sets_up_the_turn() {
    let t = table();
    let (mut client, _sent) = seated(&t, t.dutch, Box::new(NoDecisions));
    let events = client.take_events();
    assert_eq!(events[0], ClientEvent::Joined { player: t.dutch });
    assert!(events.contains(&ClientEvent::StateReplaced));
    assert!(events.contains(&ClientEvent::TurnStarted {
        turn: t.engine.world().turn,
        player: t.dutch
    }));
    assert_eq!(client.next_active_unit(), Some(t.colonist.min(t.soldier)));
}

#[test]
fn submissions_carry_the_last_server_checksum_one_at_a_time() {
    let t = table();
    let (mut client, mut sent) = seated(&t, t.dutch, Box::new(NoDecisions));
    let checksum = client.replica().unwrap().server_checksum();

    client.move_unit(t.colonist, Direction::S).unwrap();
    assert_eq!(
        drain(&mut sent),
        vec![ClientMessage::Submit {
            commands: vec![Command::MoveUnit {
                unit: t.colonist,
                direction: Direction::S
            }],
            answers: vec![],
            state_checksum: checksum,
        }]
    );
    assert!(matches!(
        client.move_unit(t.colonist, Direction::S),
        Err(ClientError::SubmissionInFlight)
    ));
}

#[test]
fn other_players_cannot_act() {
    let t = table();
    let (mut client, mut sent) = seated(&t, t.english, Box::new(NoDecisions));
    assert!(matches!(client.end_turn(), Err(ClientError::NotYourTurn)));
    assert!(drain(&mut sent).is_empty());
}

#[test]
fn ending_the_turn_blocks_goto_until_the_next_turn() {
    let t = table();
    let (mut client, _sent) = seated(&t, t.dutch, Box::new(NoDecisions));
    client.end_turn().unwrap();
    assert_eq!(client.move_mode(), MoveMode::EndTurn);
    client.handle(ServerMessage::SubmissionAccepted).unwrap();

    assert!(matches!(
        client.execute_goto_orders(),
        Err(ClientError::TurnEnding)
    ));
    assert_eq!(client.next_active_unit(), None);

    let turn = t.engine.world().turn;
    client
        .handle(ServerMessage::StateDelta {
            deltas: vec![Delta::TurnChanged {
                turn: turn + 1,
                player: t.dutch,
            }],
            checksum: 0,
        })
        .unwrap();
    assert_eq!(client.move_mode(), MoveMode::NextActiveUnit);
}

#[test]
fn an_accepted_move_that_did_not_happen_skips_the_unit() {
    let t = table();
    let (mut client, _sent) = seated(&t, t.dutch, Box::new(NoDecisions));
    client.take_events();

    client.move_unit(t.colonist, Direction::S).unwrap();
    // No deltas arrive before the acknowledgement.
    client.handle(ServerMessage::SubmissionAccepted).unwrap();

    let events = client.take_events();
    assert!(events.contains(&ClientEvent::UnitSkipped(t.colonist)));
    assert_ne!(client.next_active_unit(), Some(t.colonist));
}

#[test]
fn crown_offers_go_to_the_decider_first() {
    let t = table();
    let (mut client, mut sent) = seated(&t, t.dutch, Box::new(PassiveDecisions));
    drain(&mut sent);

    client
        .handle(ServerMessage::DecisionNeeded {
            request: DecisionRequest::MonarchRaiseTax {
                goods: GoodsTypeId::new(0),
                tax: 12,
            },
        })
        .unwrap();
    assert_eq!(
        drain(&mut sent),
        vec![ClientMessage::MonarchAnswer {
            action: MonarchAction::RaiseTax,
            accept: true
        }]
    );
}

#[test]
fn undecided_requests_wait_for_the_player() {
    let t = table();
    let (mut client, mut sent) = seated(&t, t.dutch, Box::new(NoDecisions));
    let request = DecisionRequest::ConfirmHostile {
        unit: t.soldier,
        target: t.english,
    };
    client
        .handle(ServerMessage::DecisionNeeded {
            request: request.clone(),
        })
        .unwrap();
    assert_eq!(client.pending_decision(), Some(&request));
    assert!(client
        .take_events()
        .contains(&ClientEvent::DecisionNeeded(request)));

    client.answer(DecisionAnswer::Confirm(true)).unwrap();
    assert_eq!(
        drain(&mut sent),
        vec![ClientMessage::Answer {
            answer: DecisionAnswer::Confirm(true)
        }]
    );
    assert!(matches!(
        client.answer(DecisionAnswer::Confirm(true)),
        Err(ClientError::NoPendingDecision)
    ));
}

#[test]
fn server_desync_asks_for_a_fresh_state() {
    let t = table();
    let (mut client, mut sent) = seated(&t, t.dutch, Box::new(NoDecisions));
    client.end_turn().unwrap();
    drain(&mut sent);

    client
        .handle(ServerMessage::DesyncDetected {
            expected: 1,
            received: 2,
        })
        .unwrap();
    assert_eq!(drain(&mut sent), vec![ClientMessage::RequestState]);
    assert!(client
        .take_events()
        .contains(&ClientEvent::Desync {
            expected: 1,
            received: 2
        }));
}
