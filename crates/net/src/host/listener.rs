//! TCP listener for the host
//!
//! Accepts sockets, runs the connect handshake and turns each connection's frames into
//! [`InboundEvent`]s for the round coordinator. Transport faults end the connection and
//! surface only as a `Lost` event.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time;

use crate::error::NetError;
use crate::framing::{encode_message, outbound_channel, read_frame, spawn_frame_writer};
use crate::host::registry::{Registration, SharedRegistry};
use crate::log_context::SessionLog;
use crate::protocol::{create_connect_response, Message, PlayerId};

/// What the connection tasks report to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Joined {
        player_id: PlayerId,
        name: String,
        rejoined: bool,
    },
    Message {
        player_id: PlayerId,
        message: Message,
    },
    Lost {
        player_id: PlayerId,
    },
}

/// Check that `host:port` can be bound right now.
pub fn check_tcp_listen_available(host: &str, port: u16) -> std::io::Result<()> {
    let listener = std::net::TcpListener::bind((host, port))?;
    drop(listener);
    Ok(())
}

/// Accept connections until `closing` fires or the listener fails.
pub async fn accept_loop(
    listener: TcpListener,
    registry: SharedRegistry,
    inbound_tx: mpsc::UnboundedSender<InboundEvent>,
    handshake_timeout: Duration,
    mut closing: watch::Receiver<bool>,
    log: SessionLog,
) {
    loop {
        let accepted = tokio::select! {
            _ = crate::wait_for_signal(&mut closing) => break,
            accepted = listener.accept() => accepted,
        };

        let (socket, addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                log.warn(format_args!("accept failed: {}", e));
                continue;
            }
        };

        log.debug(format_args!("connection from {}", addr));

        let registry = registry.clone();
        let inbound_tx = inbound_tx.clone();
        let closing = closing.clone();
        let log = log.clone();
        tokio::spawn(async move {
            if let Err(e) =
                handle_connection(socket, addr, registry, inbound_tx, handshake_timeout, closing, &log)
                    .await
            {
                log.debug(format_args!("connection {} ended: {}", addr, e));
            }
        });
    }
}

async fn handle_connection(
    socket: TcpStream,
    addr: SocketAddr,
    registry: SharedRegistry,
    inbound_tx: mpsc::UnboundedSender<InboundEvent>,
    handshake_timeout: Duration,
    mut closing: watch::Receiver<bool>,
    log: &SessionLog,
) -> Result<(), NetError> {
    let _ = socket.set_nodelay(true);
    let (mut reader, writer) = socket.into_split();

    let first = time::timeout(handshake_timeout, read_frame(&mut reader))
        .await
        .map_err(|_| NetError::Timeout("connect request"))??;

    let name = match first {
        Some(Message::ConnectRequest { player_name }) => player_name,
        Some(other) => {
            log.warn(format_args!(
                "{} sent {:?} before connecting, dropping",
                addr,
                other.kind()
            ));
            return Ok(());
        }
        None => return Ok(()),
    };

    let (tx, rx) = outbound_channel();
    let writer_task = spawn_frame_writer(writer, rx);

    // The response is queued under the write lock so no broadcast can overtake it.
    let (registration, generation) = {
        let mut reg = registry.write().await;
        let (registration, generation) = reg.register(&name, addr, tx.clone());
        let response = match &registration {
            Registration::Joined { player_id } => create_connect_response(player_id, None, false),
            Registration::Rejoined { player_id } => create_connect_response(player_id, None, true),
            Registration::Rejected { reason } => {
                create_connect_response("", Some(reason.clone()), false)
            }
        };
        let _ = tx.try_send(encode_message(&response)?);
        (registration, generation)
    };
    drop(tx);

    let (player_id, rejoined) = match registration {
        Registration::Joined { player_id } => (player_id, false),
        Registration::Rejoined { player_id } => (player_id, true),
        Registration::Rejected { reason } => {
            log.info(format_args!("rejected '{}' from {}: {}", name, addr, reason));
            let _ = writer_task.await;
            return Ok(());
        }
    };

    log.info(format_args!(
        "{} '{}' {} from {}",
        player_id,
        name,
        if rejoined { "rejoined" } else { "joined" },
        addr
    ));
    let _ = inbound_tx.send(InboundEvent::Joined {
        player_id: player_id.clone(),
        name,
        rejoined,
    });

    let result = receive_loop(&mut reader, &player_id, &inbound_tx, &mut closing, log).await;

    if registry.write().await.mark_lost(&player_id, generation) {
        log.info(format_args!("{} disconnected", player_id));
        let _ = inbound_tx.send(InboundEvent::Lost {
            player_id: player_id.clone(),
        });
    }
    result
}

async fn receive_loop(
    reader: &mut tokio::net::tcp::OwnedReadHalf,
    player_id: &str,
    inbound_tx: &mpsc::UnboundedSender<InboundEvent>,
    closing: &mut watch::Receiver<bool>,
    log: &SessionLog,
) -> Result<(), NetError> {
    loop {
        let frame = tokio::select! {
            _ = crate::wait_for_signal(closing) => return Ok(()),
            frame = read_frame(reader) => frame,
        };

        let mut message = match frame {
            Ok(Some(message)) => message,
            Ok(None) => return Ok(()),
            Err(e) if e.is_recoverable() => {
                log.warn(format_args!("{} sent an undecodable frame: {}", player_id, e));
                continue;
            }
            Err(e) => return Err(e),
        };

        if !message.is_client_message() {
            log.warn(format_args!(
                "{} sent unexpected {:?}, ignoring",
                player_id,
                message.kind()
            ));
            continue;
        }

        // The connection decides who a placement belongs to.
        if let Message::PlacedPiece(placed) = &mut message {
            if placed.player_id != player_id {
                log.debug(format_args!(
                    "{} reported placement as '{}'",
                    player_id, placed.player_id
                ));
                placed.player_id = player_id.to_string();
            }
        }

        if inbound_tx
            .send(InboundEvent::Message {
                player_id: player_id.to_string(),
                message,
            })
            .is_err()
        {
            return Ok(());
        }
    }
}
