use crate::assistant::Assistant;
use crate::chat::ConversationEvent;
use crate::cli::Args;
use crate::models::websocket::{ClientMessage, ServerMessage};

use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;

use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use rustls_pemfile::{certs, pkcs8_private_keys};

use governor::{clock::DefaultClock, state::{InMemoryState, NotKeyed}, Quota, RateLimiter};
use lazy_static::lazy_static;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::form_urlencoded;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{error, info, warn};

type HmacSha256 = Hmac<Sha256>;
type WsSink<S> = SplitSink<WebSocketStream<S>, Message>;

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
const MAX_CLOCK_SKEW_SECS: u64 = 300;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(10).unwrap()));
}

/// Hex HMAC-SHA256 of the unix timestamp string, as clients send it in `sig`.
pub fn sign_timestamp(secret: &str, ts: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("Invalid HMAC key: {}", e))?;
    mac.update(ts.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(secret: &str, ts: &str, sig: &str, now: i64) -> Result<(), &'static str> {
    let ts_i: i64 = ts.parse().map_err(|_| "bad timestamp")?;
    if now.abs_diff(ts_i) > MAX_CLOCK_SKEW_SECS {
        return Err("timestamp out of range");
    }
    let sig_bytes = hex::decode(sig).map_err(|_| "bad signature")?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "bad server key")?;
    mac.update(ts.as_bytes());
    mac.verify_slice(&sig_bytes).map_err(|_| "bad signature")
}

fn unauthorized(reason: &str) -> ErrorResponse {
    let mut res = ErrorResponse::new(Some(reason.to_string()));
    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res
}

fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

pub async fn start_ws_server(
    addr: &str,
    assistant: Arc<Assistant>,
    api_key: Option<String>,
    args: Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        info!("TLS not enabled. Running plain WebSocket (WS) server.");
        None
    };

    let listener = TcpListener::bind(addr).await?;
    let protocol = if tls_acceptor.is_some() { "wss" } else { "ws" };
    info!("{} chat server listening on: {}", protocol.to_uppercase(), addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let assistant_clone = Arc::clone(&assistant);
        let required_api_key = api_key.clone();
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(peer, tls_stream, assistant_clone, required_api_key).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, assistant_clone, required_api_key).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    assistant: Arc<Assistant>,
    required_api_key: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let secret = match &required_api_key {
            Some(k) if !k.is_empty() => k,
            _ => return Ok(response),
        };

        let qs = req.uri().query().unwrap_or("");
        let params: HashMap<String, String> =
            form_urlencoded::parse(qs.as_bytes()).into_owned().collect();

        let ts = params.get("ts")
            .or_else(|| params.get("X-Api-Ts"))
            .map(|s| s.as_str());
        let sig = params.get("sig")
            .or_else(|| params.get("X-Api-Sign"))
            .map(|s| s.as_str());

        match (ts, sig) {
            (Some(ts), Some(sig)) => {
                match verify_signature(secret, ts, sig, Utc::now().timestamp()) {
                    Ok(()) => Ok(response),
                    Err(reason) => {
                        warn!("Rejected connection from {}: {}", peer, reason);
                        Err(unauthorized(reason))
                    }
                }
            }
            _ => Err(unauthorized("missing ts/sig")),
        }
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, assistant).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

async fn send_json<S>(tx: &mut WsSink<S>, msg: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json)).await?;
    Ok(())
}

/// One conversation per connection. Client chat frames are submitted to the
/// conversation; its typing and reply events are pushed back as they happen.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    assistant: Arc<Assistant>
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {}", peer);

    if let Err(e) = assistant.reload_knowledge_if_changed().await {
        error!("Failed to reload knowledge: {}", e);
    }

    let (mut tx, mut rx) = websocket.split();
    let conversation = assistant.start_conversation().await;
    let mut events = conversation.subscribe();
    info!("Assigned conversation ID {} to {}", conversation.id(), peer);

    let welcome = ServerMessage::Welcome {
        conversation_id: conversation.id().to_string(),
        content: conversation
            .transcript()
            .first()
            .map(|m| m.text.clone())
            .unwrap_or_default(),
        suggestions: assistant.suggestions().await,
    };
    if let Err(e) = send_json(&mut tx, &welcome).await {
        error!("Error sending welcome to {}: {}", peer, e);
        return;
    }

    loop {
        tokio::select! {
            incoming = rx.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        error!("Error receiving message from {}: {}", peer, e);
                        break;
                    }
                    None => break,
                };

                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::Error {
                        message: "Message too large".to_string(),
                    };
                    if send_json(&mut tx, &error_msg).await.is_err() {
                        error!("Failed to send size limit error to {}", peer);
                    }
                    break;
                }

                match message {
                    Message::Text(text) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Chat { content }) => {
                                match conversation.submit(&content) {
                                    Some(_) => None,
                                    None => Some("Message is empty".to_string()),
                                }
                            }
                            Err(e) => {
                                warn!("Invalid message from {}: {}", peer, e);
                                Some(format!("Invalid message format: {}", e))
                            }
                        };
                        if let Some(message) = reply {
                            if send_json(&mut tx, &ServerMessage::Error { message }).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Client {} closed the connection", peer);
                        break;
                    }
                    _ => {}
                }
            }
            event = events.recv() => {
                let outgoing = match event {
                    Ok(ConversationEvent::Typing) => ServerMessage::Typing,
                    Ok(ConversationEvent::Reply(message)) => ServerMessage::Response {
                        content: message.text,
                        timestamp: message.timestamp,
                    },
                    Ok(ConversationEvent::UserMessage(_)) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Connection {} lagged behind by {} events", peer, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if let Err(e) = send_json(&mut tx, &outgoing).await {
                    error!("Error sending to {}: {}", peer, e);
                    break;
                }
            }
        }
    }

    info!(
        "Connection {} closed after {} messages in conversation {}",
        peer,
        conversation.message_count(),
        conversation.id()
    );
}
