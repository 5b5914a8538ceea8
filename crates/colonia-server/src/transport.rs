//! TCP transport.
//!
//! One reader and one writer task per connection. Readers decode frames into
//! [`Request::Message`]; writers drain the connection's outbox. Neither touches
//! game state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::GameState;
use crate::protocol::{
    deserialize_client_message, read_frame, serialize_server_message, write_frame, ServerMessage,
};
use crate::seats::ClientId;
use crate::server::{run, Request, Server};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

static NEXT_CLIENT: AtomicU64 = AtomicU64::new(1);

/// Builds the game from `config` and serves it until the listener fails.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let game = GameState::from_config(&config)?;
    let listener = TcpListener::bind(config.bind_address).await?;
    info!(address = %listener.local_addr()?, "listening");

    let (requests, receiver) = mpsc::unbounded_channel();
    let server = Server::new(config, game, requests.clone());
    tokio::spawn(run(server, receiver));
    tokio::spawn(tick(requests.clone()));

    accept_loop(listener, requests).await
}

/// Accepts connections and hands each one to its own tasks.
pub async fn accept_loop(
    listener: TcpListener,
    requests: mpsc::UnboundedSender<Request>,
) -> Result<(), ServerError> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let client = NEXT_CLIENT.fetch_add(1, Ordering::Relaxed);
        debug!(client, %peer, "accepted");
        let requests = requests.clone();
        tokio::spawn(async move {
            if let Err(err) = connection(client, stream, requests).await {
                warn!(client, %err, "connection closed with an error");
            }
        });
    }
}

async fn tick(requests: mpsc::UnboundedSender<Request>) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    loop {
        interval.tick().await;
        if requests.send(Request::Tick).is_err() {
            break;
        }
    }
}

async fn connection(
    client: ClientId,
    stream: TcpStream,
    requests: mpsc::UnboundedSender<Request>,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<ServerMessage>();
    requests
        .send(Request::Connected { client, outbox })
        .map_err(|_| ServerError::LoopClosed)?;

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            let body = serialize_server_message(&message)?;
            write_frame(&mut writer, &body).await?;
        }
        Ok::<(), ServerError>(())
    });

    let read_result = async {
        while let Some(body) = read_frame(&mut reader).await? {
            let message = deserialize_client_message(&body)?;
            requests
                .send(Request::Message { client, message })
                .map_err(|_| ServerError::LoopClosed)?;
        }
        Ok::<(), ServerError>(())
    }
    .await;

    let _ = requests.send(Request::Disconnected { client });
    writer_task.abort();
    debug!(client, "disconnected");
    read_result
}
