//! TCP link to a server.
//!
//! Mirrors the server transport: one reader task and one writer task, with
//! channels on the application side.

use colonia_server::protocol::{
    deserialize_server_message, read_frame, serialize_client_message, write_frame,
};
use colonia_server::{ClientMessage, ServerMessage};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ClientError;

pub struct Link {
    /// Usable directly as an orchestrator `Gateway`.
    pub outbox: mpsc::UnboundedSender<ClientMessage>,
    pub inbox: mpsc::UnboundedReceiver<ServerMessage>,
}

pub async fn connect(address: impl ToSocketAddrs) -> Result<Link, ClientError> {
    let stream = TcpStream::connect(address).await.map_err(colonia_server::ServerError::from)?;
    let (mut reader, mut writer) = stream.into_split();
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<ClientMessage>();
    let (incoming, inbox) = mpsc::unbounded_channel::<ServerMessage>();

    tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            let sent = match serialize_client_message(&message) {
                Ok(body) => write_frame(&mut writer, &body).await,
                Err(err) => Err(err),
            };
            if let Err(err) = sent {
                warn!(%err, "send failed");
                break;
            }
        }
    });

    tokio::spawn(async move {
        loop {
            let body = match read_frame(&mut reader).await {
                Ok(Some(body)) => body,
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, "receive failed");
                    break;
                }
            };
            match deserialize_server_message(&body) {
                Ok(message) => {
                    if incoming.send(message).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(%err, "undecodable server message"),
            }
        }
        debug!("server link closed");
    });

    Ok(Link { outbox, inbox })
}
