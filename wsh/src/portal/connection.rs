//! Connection to the garden server.
//!
//! The channel is dialed on first use and shared by every later call.

use hyper_util::rt::TokioIo;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use wsh_shared::{Transport, WshResult};

/// Bound on dialing the server. Calls on an established channel are not
/// limited; the session's termination signals cover those.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Lazy connection to the orchestration service.
#[derive(Clone)]
pub struct Connection {
    transport: Transport,
    channel: Arc<OnceCell<Channel>>,
}

impl Connection {
    /// Create a lazy connection (does not connect immediately).
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            channel: Arc::new(OnceCell::new()),
        }
    }

    /// Get or establish the channel.
    pub async fn channel(&self) -> WshResult<Channel> {
        let channel = self
            .channel
            .get_or_try_init(|| async { connect_transport(&self.transport).await })
            .await?;

        Ok(channel.clone())
    }
}

async fn connect_transport(transport: &Transport) -> WshResult<Channel> {
    match transport {
        Transport::Unix { socket_path } => {
            tracing::debug!(socket = %socket_path.display(), "Dialing garden server");
            connect_unix(socket_path).await
        }
        Transport::Tcp { addr } => {
            tracing::debug!(addr = %addr, "Dialing garden server");
            connect_tcp(addr).await
        }
    }
}

async fn connect_unix(socket_path: &std::path::Path) -> WshResult<Channel> {
    let socket_path = socket_path.to_path_buf();

    // The URI is required by tonic but unused; the connector dials the socket.
    let channel = Endpoint::try_from("http://[::]:50051")?
        .connect_timeout(CONNECT_TIMEOUT)
        .connect_with_connector(service_fn(move |_: Uri| {
            let socket_path = socket_path.clone();
            async move {
                let stream = tokio::net::UnixStream::connect(socket_path).await?;
                Ok::<_, std::io::Error>(TokioIo::new(stream))
            }
        }))
        .await?;

    Ok(channel)
}

async fn connect_tcp(addr: &str) -> WshResult<Channel> {
    let channel = Endpoint::try_from(format!("http://{}", addr))?
        .connect_timeout(CONNECT_TIMEOUT)
        .connect()
        .await?;

    Ok(channel)
}
