use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::str;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::greeting::{GreetingRequest, GreetingResponse, GreetingService};
use crate::Error;

// Greetings waiting to be written to the socket, shared by every stream of the connection.
const OUTBOUND_BUFFER: usize = 32;

/// A client connected to the greetings socket. Every text message received starts a new greeting
/// stream; the output of all of them is written back to the same socket until the connection is
/// closed, at which point every stream of the connection is cancelled.
pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    socket: WebSocket,
    greetings: GreetingService,
    // Cancelled when the connection ends. Every greeting stream runs under a child token.
    token: CancellationToken,
}

impl Connection {
    pub fn new(
        socket: WebSocket,
        client_address: SocketAddr,
        greetings: GreetingService,
        token: CancellationToken,
    ) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            client_address,
            socket,
            greetings,
            token,
        }
    }

    #[instrument(
        name = "connection",
        skip(self),
        fields(connection_id = %self.id, client_address = %self.client_address)
    )]
    pub async fn handle(self) -> Result<(), Error> {
        let Connection {
            socket,
            greetings,
            token,
            ..
        } = self;

        let (mut sender, mut receiver) = socket.split();
        let (tx, mut rx) = mpsc::channel::<GreetingResponse>(OUTBOUND_BUFFER);
        let streams = TaskTracker::new();

        let result = loop {
            tokio::select! {
                _ = token.cancelled() => {
                    // Shutting down; let the client know.
                    let _ = sender.send(Message::Close(None)).await;
                    break Ok(());
                }
                Some(greeting) = rx.recv() => {
                    if let Err(e) = sender.send(Message::Text(greeting.message.into())).await {
                        break Err(e.into());
                    }
                }
                message = receiver.next() => {
                    let name = match message {
                        Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                        Some(Ok(Message::Binary(bytes))) => match str::from_utf8(&bytes) {
                            Ok(text) => text.to_string(),
                            Err(e) => break Err(e.into()),
                        },
                        Some(Ok(Message::Close(_))) | None => break Ok(()),
                        // Pings are answered by the socket itself.
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => break Err(e.into()),
                    };

                    info!(name = %name, "Received greeting request");
                    let request = GreetingRequest::new(name);
                    let stream = greetings
                        .clone()
                        .produce(request, tx.clone(), token.child_token());
                    streams.spawn(stream);
                }
            }
        };

        token.cancel();
        streams.close();
        streams.wait().await;
        debug!("Greeting streams stopped");

        info!("Connection closed");
        result
    }
}
