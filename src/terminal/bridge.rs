// ABOUTME: Full-duplex relay between the local terminal and a container's execute socket
// Dials the granted URL, holds raw mode for the session and pumps bytes in both directions

use super::codec::{
    decode_frame, encode_frame, is_normal_close, is_unacknowledged_close, Inbound,
};
use super::error::BridgeError;
use super::tty::{CrosstermTerminal, RawModeGuard, TerminalMode};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

/// How long `run` waits for the losing pump after the session is decided.
const JOIN_GRACE: Duration = Duration::from_millis(250);

type Outcome = Result<(), BridgeError>;

/// Dials execute sockets on behalf of one control plane.
pub struct TerminalBridge {
    origin: String,
}

impl TerminalBridge {
    /// `origin` is the control-plane endpoint, sent as the `Origin` header.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }

    /// Performs the upgrade handshake against a granted `url`.
    pub async fn open(&self, url: &str) -> Result<Session, BridgeError> {
        info!("Dialing execute socket {}", redact_token(url));

        let mut request = url
            .into_client_request()
            .map_err(|e| BridgeError::Dial(e.to_string()))?;
        let origin =
            HeaderValue::from_str(&self.origin).map_err(|e| BridgeError::Dial(e.to_string()))?;
        request.headers_mut().insert(ORIGIN, origin);

        let (socket, response) = connect_async(request).await.map_err(|e| {
            error!("Execute socket handshake failed: {}", e);
            BridgeError::Dial(e.to_string())
        })?;
        debug!("Handshake response status: {:?}", response.status());

        Ok(Session::new(socket))
    }
}

/// An established execute socket waiting to be pumped.
pub struct Session<S = MaybeTlsStream<TcpStream>> {
    socket: WebSocketStream<S>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(socket: WebSocketStream<S>) -> Self {
        Self { socket }
    }

    /// Relays the process's stdin/stdout until either side ends the session.
    pub async fn run(self) -> Result<(), BridgeError> {
        self.run_with(tokio::io::stdin(), tokio::io::stdout(), &CrosstermTerminal)
            .await
    }

    /// Relays `input` to the container and container output to `output`,
    /// holding `terminal` in raw mode for the duration.
    ///
    /// The first pump to finish decides the outcome. The terminal is restored
    /// before this returns, whatever the outcome.
    pub async fn run_with<R, W, T>(self, input: R, output: W, terminal: &T) -> Outcome
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        T: TerminalMode + ?Sized,
    {
        let _raw = RawModeGuard::acquire(terminal);

        let (sink, stream) = self.socket.split();
        // Room for both pumps, so neither ever blocks on signalling
        let (done_tx, mut done_rx) = mpsc::channel::<Outcome>(2);
        let closing = Arc::new(AtomicBool::new(false));

        let outbound_done = done_tx.clone();
        let outbound_closing = closing.clone();
        let outbound = tokio::spawn(async move {
            if let Some(outcome) = pump_outbound(input, sink, &outbound_closing).await {
                let _ = outbound_done.try_send(outcome);
            }
        });
        let inbound = tokio::spawn(async move {
            let outcome = pump_inbound(stream, output, &closing).await;
            let _ = done_tx.try_send(outcome);
        });
        debug!("Terminal pumps started");

        let outcome = done_rx.recv().await.unwrap_or(Ok(()));
        match &outcome {
            Ok(()) => info!("Session ended normally"),
            Err(e) => warn!("Session ended with error: {}", e),
        }

        outbound.abort();
        inbound.abort();
        if timeout(JOIN_GRACE, async {
            let _ = outbound.await;
            let _ = inbound.await;
        })
        .await
        .is_err()
        {
            warn!("Terminal pumps did not stop within {:?}", JOIN_GRACE);
        }

        outcome
    }
}

/// Local → remote. Returns `None` when local input ran dry and a close
/// handshake was started; the inbound pump reports how that ends.
/// `closing` is raised before that close frame goes out.
async fn pump_outbound<R, K>(
    mut input: R,
    mut sink: K,
    closing: &AtomicBool,
) -> Option<Outcome>
where
    R: AsyncRead + Unpin,
    K: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let mut key = [0u8; 1];
    loop {
        match input.read(&mut key).await {
            Ok(0) => {
                debug!("Local input reached EOF, closing session");
                closing.store(true, Ordering::SeqCst);
                let close = Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: Cow::Borrowed(""),
                }));
                return match sink.send(close).await {
                    Err(e) if !is_normal_close(&e) => Some(Err(e.into())),
                    _ => None,
                };
            }
            Ok(_) => {}
            Err(e) => return Some(Err(e.into())),
        }

        if let Err(e) = sink.send(encode_frame(&key)).await {
            return Some(if is_normal_close(&e) {
                Ok(())
            } else {
                Err(e.into())
            });
        }
    }
}

/// Remote → local. Once `closing` is raised, a peer that drops the
/// connection instead of acknowledging our close still ends cleanly.
async fn pump_inbound<St, W>(mut stream: St, mut output: W, closing: &AtomicBool) -> Outcome
where
    St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(next) = stream.next().await {
        let message = match next {
            Ok(message) => message,
            Err(e) if is_normal_close(&e) => return Ok(()),
            Err(e) if is_unacknowledged_close(&e) && closing.load(Ordering::SeqCst) => {
                debug!("Container dropped the connection after our close");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match decode_frame(message)? {
            Inbound::Output(bytes) => {
                output.write_all(&bytes).await?;
                output.flush().await?;
            }
            Inbound::Ignore => {}
            Inbound::Closed => {
                debug!("Container closed the session");
                return Ok(());
            }
        }
    }
    Ok(())
}

fn redact_token(url: &str) -> Cow<'_, str> {
    match url.find("token=") {
        Some(at) => Cow::Owned(format!("{}token=***", &url[..at])),
        None => Cow::Borrowed(url),
    }
}
