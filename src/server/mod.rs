pub mod codec;

use futures::StreamExt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

use crate::executor::ExecutorPool;
use crate::service::{ErrorCode, ErrorResponse, Response, StatusService};

pub use codec::{Frame, RequestCodec};

// -----------------------------------------------------------------------------
// ----- Listener --------------------------------------------------------------

pub fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

/// Accepts until `shutdown` resolves. Each connection is handed to the next
/// execution context and served there.
pub async fn serve<F>(
    listener: TcpListener,
    contexts: Arc<ExecutorPool>,
    service: StatusService,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()>,
{
    info!("listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("listener shutting down");
                break;
            }

            accept_res = listener.accept() => {
                let (stream, peer) = match accept_res {
                    Ok(v) => v,
                    Err(e) => { error!("accept error: {e}"); continue; }
                };

                let _ = stream.set_nodelay(true);

                // The stream is registered with this runtime's reactor; move
                // it across as a std socket and re-register on the context.
                let stream = match stream.into_std() {
                    Ok(s) => s,
                    Err(e) => { error!("client {peer}: detach failed: {e}"); continue; }
                };

                let context = contexts.next();
                let service = service.clone();
                let spawned = context.spawn(async move {
                    let stream = match TcpStream::from_std(stream) {
                        Ok(s) => s,
                        Err(e) => { error!("client {peer}: attach failed: {e}"); return; }
                    };

                    if let Err(e) = serve_connection(stream, &service).await {
                        debug!("client {peer} error: {e}");
                    }
                });

                if let Err(e) = spawned {
                    warn!("client {peer} dropped: {e}");
                }
            }
        }
    }

    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Connection ------------------------------------------------------------

/// One JSON request per line in, one JSON reply per line out. Lines that are
/// not UTF-8 or exceed the length limit are answered with `ErrorJson`.
pub async fn serve_connection(stream: TcpStream, service: &StatusService) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, RequestCodec::new());

    while let Some(frame) = frames.next().await {
        let response = match frame? {
            Frame::Line(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                service.handle_line(line)
            }
            Frame::NotUtf8 => {
                debug!("request line is not valid UTF-8");
                malformed()
            }
            Frame::TooLong => {
                debug!(
                    "request line exceeds {} bytes",
                    frames.decoder().max_length()
                );
                malformed()
            }
        };

        let mut out = serde_json::to_vec(&response).map_err(io::Error::other)?;
        out.push(b'\n');
        write_half.write_all(&out).await?;
    }

    Ok(())
}

fn malformed() -> Response {
    Response::Error(ErrorResponse {
        error: ErrorCode::ErrorJson,
    })
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
