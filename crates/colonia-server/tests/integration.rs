//! Integration tests for the request loop and the TCP transport.
//!
//! Drives [`Server`] directly through its request handler, then once end to
//! end over a real socket.

use colonia_core::{GameEngine, WorldBuilder};
use colonia_protocol::{Command, PlayerId, PlayerKind, Position, Terrain, UnitRole};
use colonia_server::game::GameState;
use colonia_server::protocol::{
    deserialize_server_message, read_frame, serialize_client_message, write_frame, ClientMessage,
    ServerMessage,
};
use colonia_server::transport::accept_loop;
use colonia_server::{server, ClientId, Request, Server, ServerConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver};

struct Harness {
    server: Server,
    dutch: PlayerId,
    english: PlayerId,
}

fn game() -> (GameState, PlayerId, PlayerId) {
    let mut b = WorldBuilder::new(10, 6, Terrain::Plains).unwrap();
    let dutch = b.player("Dutch", PlayerKind::Colonial, true);
    let english = b.player("English", PlayerKind::Colonial, true);
    let sioux = b.player("Sioux", PlayerKind::Native, false);
    b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(1, 1));
    b.unit(english, "free_colonist", UnitRole::Default, Position::new(8, 4));
    b.native_settlement(sioux, "Camp", Position::new(5, 3), true);
    (GameState::new(GameEngine::new(b.build().unwrap())), dutch, english)
}

fn harness() -> Harness {
    let (game, dutch, english) = game();
    let (requests, _receiver) = mpsc::unbounded_channel();
    Harness {
        server: Server::new(ServerConfig::default(), game, requests),
        dutch,
        english,
    }
}

impl Harness {
    fn connect(&mut self, client: ClientId) -> UnboundedReceiver<ServerMessage> {
        let (outbox, inbox) = mpsc::unbounded_channel();
        self.server.handle(Request::Connected { client, outbox });
        inbox
    }

    fn send(&mut self, client: ClientId, message: ClientMessage) {
        self.server.handle(Request::Message { client, message });
    }

    fn join(&mut self, client: ClientId, name: &str) -> UnboundedReceiver<ServerMessage> {
        let mut inbox = self.connect(client);
        self.send(
            client,
            ClientMessage::Join {
                player_name: name.to_string(),
                reconnect_token: None,
            },
        );
        drain(&mut inbox);
        inbox
    }
}

fn drain(inbox: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(message) = inbox.try_recv() {
        out.push(message);
    }
    out
}

/// Joining by name takes that seat and delivers the filtered view.
#[tokio::test]
async fn join_delivers_the_seat_and_its_view() {
    let mut h = harness();
    let mut inbox = h.connect(1);
    h.send(
        1,
        ClientMessage::Join {
            player_name: "English".into(),
            reconnect_token: None,
        },
    );

    let messages = drain(&mut inbox);
    assert!(matches!(
        &messages[0],
        ServerMessage::JoinAccepted { player_id, reconnect_token }
            if *player_id == h.english && !reconnect_token.is_empty()
    ));
    let expected = h.server.game().checksum_for(h.english).unwrap();
    assert!(matches!(
        &messages[1],
        ServerMessage::GameState { view, checksum }
            if *checksum == expected && *view == h.server.game().view_for(h.english)
    ));
}

/// A submission against a stale view is refused and the client resynced.
#[tokio::test]
async fn stale_submission_is_answered_with_a_resync() {
    let mut h = harness();
    let mut inbox = h.join(1, "Dutch");
    let checksum = h.server.game().checksum_for(h.dutch).unwrap();

    h.send(
        1,
        ClientMessage::Submit {
            commands: vec![Command::EndTurn],
            answers: vec![],
            state_checksum: checksum.wrapping_add(1),
        },
    );

    let messages = drain(&mut inbox);
    assert!(matches!(
        messages[0],
        ServerMessage::DesyncDetected { expected, .. } if expected == checksum
    ));
    assert!(matches!(messages[1], ServerMessage::GameState { .. }));
    assert_eq!(h.server.game().current_player(), h.dutch);
}

/// Ending a turn is acknowledged and every seated player gets deltas with
/// their own checksum.
#[tokio::test]
async fn end_turn_reaches_the_other_seat() {
    let mut h = harness();
    let mut dutch_inbox = h.join(1, "Dutch");
    let mut english_inbox = h.join(2, "English");
    let checksum = h.server.game().checksum_for(h.dutch).unwrap();

    h.send(
        1,
        ClientMessage::Submit {
            commands: vec![Command::EndTurn],
            answers: vec![],
            state_checksum: checksum,
        },
    );

    assert!(drain(&mut dutch_inbox).contains(&ServerMessage::SubmissionAccepted));
    assert_eq!(h.server.game().current_player(), h.english);
    let english_checksum = h.server.game().checksum_for(h.english).unwrap();
    assert!(drain(&mut english_inbox).iter().any(|m| matches!(
        m,
        ServerMessage::StateDelta { deltas, checksum }
            if !deltas.is_empty() && *checksum == english_checksum
    )));
}

/// Out-of-turn commands are rejected without touching the game.
#[tokio::test]
async fn out_of_turn_submission_is_rejected() {
    let mut h = harness();
    let mut inbox = h.join(2, "English");

    h.send(
        2,
        ClientMessage::Submit {
            commands: vec![Command::EndTurn],
            answers: vec![],
            state_checksum: 0,
        },
    );

    assert!(matches!(
        drain(&mut inbox)[0],
        ServerMessage::SubmissionRejected { index: 0, .. }
    ));
    assert_eq!(h.server.game().current_player(), h.dutch);
}

/// Dropping the current player's connection passes the turn on, and the
/// reconnect token gets the seat back.
#[tokio::test]
async fn disconnect_passes_the_turn_and_token_restores_the_seat() {
    let mut h = harness();
    let mut inbox = h.connect(1);
    h.send(
        1,
        ClientMessage::Join {
            player_name: "Dutch".into(),
            reconnect_token: None,
        },
    );
    let token = match drain(&mut inbox).remove(0) {
        ServerMessage::JoinAccepted {
            reconnect_token, ..
        } => reconnect_token,
        other => panic!("unexpected {other:?}"),
    };

    h.server.handle(Request::Disconnected { client: 1 });
    assert_eq!(h.server.game().current_player(), h.english);
    assert!(!h.server.seats().is_connected(h.dutch));

    let mut inbox = h.connect(7);
    h.send(
        7,
        ClientMessage::Join {
            player_name: String::new(),
            reconnect_token: Some(token),
        },
    );
    assert!(matches!(
        drain(&mut inbox)[0],
        ServerMessage::JoinAccepted { player_id, .. } if player_id == h.dutch
    ));
    assert_eq!(h.server.seats().client_for_player(h.dutch), Some(7));
}

/// A forged token is turned away.
#[tokio::test]
async fn unknown_token_is_rejected() {
    let mut h = harness();
    let mut inbox = h.connect(3);
    h.send(
        3,
        ClientMessage::Join {
            player_name: "Dutch".into(),
            reconnect_token: Some("not-a-token".into()),
        },
    );
    assert!(matches!(
        drain(&mut inbox)[0],
        ServerMessage::JoinRejected { .. }
    ));
}

/// Ping is answered even before a seat is taken.
#[tokio::test]
async fn ping_is_answered() {
    let mut h = harness();
    let mut inbox = h.connect(4);
    h.send(4, ClientMessage::Ping { timestamp: 99 });
    assert_eq!(
        drain(&mut inbox),
        vec![ServerMessage::Pong { timestamp: 99 }]
    );
}

/// Full round trip over TCP: join and receive the seat.
#[tokio::test]
async fn join_over_tcp() {
    let (game, dutch, _) = game();
    let (requests, receiver) = mpsc::unbounded_channel();
    let srv = Server::new(ServerConfig::default(), game, requests.clone());
    tokio::spawn(server::run(srv, receiver));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(accept_loop(listener, requests));

    let mut stream = TcpStream::connect(address).await.unwrap();
    let join = ClientMessage::Join {
        player_name: "Dutch".into(),
        reconnect_token: None,
    };
    write_frame(&mut stream, &serialize_client_message(&join).unwrap())
        .await
        .unwrap();

    let body = read_frame(&mut stream).await.unwrap().unwrap();
    assert!(matches!(
        deserialize_server_message(&body).unwrap(),
        ServerMessage::JoinAccepted { player_id, .. } if player_id == dutch
    ));
    let body = read_frame(&mut stream).await.unwrap().unwrap();
    assert!(matches!(
        deserialize_server_message(&body).unwrap(),
        ServerMessage::GameState { .. }
    ));
}
