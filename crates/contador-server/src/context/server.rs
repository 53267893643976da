use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::net::UdpSocket;

use contador_core::protocol::{encode_message, Message};

use crate::config::ServerConfig;
use crate::dispatch::Resource;
use crate::error::{Result, ServerError};
use crate::observe::{ObservedResource, ObserverRegistry};

/// Server lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    Uninitialized = 0,
    /// Address resolved and endpoint bound.
    Bound = 1,
    /// Resource registered, loop active.
    Running = 2,
    Shutdown = 3,
}

impl ServerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ServerState::Bound,
            2 => ServerState::Running,
            3 => ServerState::Shutdown,
            _ => ServerState::Uninitialized,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServerState::Uninitialized => "uninitialized",
            ServerState::Bound => "bound",
            ServerState::Running => "running",
            ServerState::Shutdown => "shutdown",
        }
    }
}

/// Shared view of the lifecycle state (written by the server task only).
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ServerState::Uninitialized as u8),
        }
    }

    pub fn get(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, next: ServerState) {
        let prev = ServerState::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        tracing::debug!(from = prev.as_str(), to = next.as_str(), "server state");
    }
}

/// Server context: owns the UDP endpoint and the registered resource.
pub struct ServerContext {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    max_datagram_bytes: usize,
    next_mid: AtomicU16,
    resource: Option<ObservedResource>,
}

impl ServerContext {
    /// Resolve the listen address (context creation).
    pub fn resolve(cfg: &ServerConfig) -> Result<SocketAddr> {
        cfg.server.listen.parse().map_err(|e| {
            ServerError::Context(format!(
                "invalid listen address {:?}: {e}",
                cfg.server.listen
            ))
        })
    }

    /// Bind the UDP endpoint.
    pub async fn bind(addr: SocketAddr, max_datagram_bytes: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(ServerError::Endpoint)?;
        let local_addr = socket.local_addr().map_err(ServerError::Endpoint)?;
        Ok(Self::from_socket(Arc::new(socket), local_addr, max_datagram_bytes))
    }

    pub fn from_socket(
        socket: Arc<UdpSocket>,
        local_addr: SocketAddr,
        max_datagram_bytes: usize,
    ) -> Self {
        Self {
            socket,
            local_addr,
            max_datagram_bytes,
            next_mid: AtomicU16::new(initial_message_id()),
            resource: None,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn max_datagram_bytes(&self) -> usize {
        self.max_datagram_bytes
    }

    pub fn socket(&self) -> &Arc<UdpSocket> {
        &self.socket
    }

    /// Fresh message id for NON responses and notifications.
    pub fn next_message_id(&self) -> u16 {
        self.next_mid.fetch_add(1, Ordering::Relaxed)
    }

    /// Register the observable resource. Allowed exactly once.
    pub fn register(
        &mut self,
        resource: Arc<dyn Resource>,
        observers: Arc<ObserverRegistry>,
    ) -> Result<()> {
        if let Some(existing) = &self.resource {
            return Err(ServerError::AlreadyRegistered(existing.path().to_string()));
        }
        tracing::info!(path = resource.path(), "resource registered");
        self.resource = Some(ObservedResource::new(resource, observers));
        Ok(())
    }

    /// Remove the resource and drop its observers. Returns the number dropped.
    pub fn unregister(&mut self) -> usize {
        match self.resource.take() {
            Some(res) => {
                let dropped = res.observers().clear();
                tracing::info!(path = res.path(), observers = dropped, "resource deleted");
                dropped
            }
            None => 0,
        }
    }

    pub fn observed(&self) -> Option<&ObservedResource> {
        self.resource.as_ref()
    }

    /// Resource registered under exactly `path`.
    pub fn resource_for(&self, path: &str) -> Option<&ObservedResource> {
        self.resource.as_ref().filter(|r| r.path() == path)
    }

    /// Encode and send one message; failures are logged, never fatal.
    pub async fn send(&self, peer: SocketAddr, msg: &Message) {
        let raw = match encode_message(msg) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(%peer, error = %e, "failed to encode message");
                return;
            }
        };
        if raw.len() > self.max_datagram_bytes {
            tracing::error!(%peer, len = raw.len(), "outgoing message exceeds max_datagram_bytes");
            return;
        }
        if let Err(e) = self.socket.send_to(&raw, peer).await {
            tracing::warn!(%peer, error = %e, "send failed");
        }
    }
}

// Pseudo-random start so ids do not repeat across quick restarts.
fn initial_message_id() -> u16 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos & 0xffff) as u16
}
