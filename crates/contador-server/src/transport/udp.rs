//! CoAP server task.
//!
//! Lifecycle: Uninitialized -> Bound (address resolved, endpoint bound)
//! -> Running (resource registered, loop active) -> Shutdown (stop signal).
//!
//! One task owns the socket and selects, in priority order, between the stop
//! signal, the notification tick and the next datagram. The counter and the
//! observer set are therefore only mutated from this task.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use contador_core::protocol::Message;

use crate::config::ServerConfig;
use crate::context::{Counter, Lifecycle, ServerContext, ServerState};
use crate::dispatch::handle_request;
use crate::error::{Result, ServerError};
use crate::observe::{Notifier, ObserverRegistry};
use crate::services::CounterResource;
use crate::transport::codec::{classify, Inbound};

/// A bound server whose loop has not started yet.
pub struct CoapServer {
    ctx: ServerContext,
    notifier: Notifier,
    path: String,
    counter: Arc<Counter>,
    observers: Arc<ObserverRegistry>,
    lifecycle: Arc<Lifecycle>,
}

impl CoapServer {
    /// Create the context and bind the endpoint.
    pub async fn bind(cfg: &ServerConfig) -> Result<Self> {
        let lifecycle = Arc::new(Lifecycle::new());

        let addr = ServerContext::resolve(cfg)?;
        let ctx = ServerContext::bind(addr, cfg.server.max_datagram_bytes).await?;
        lifecycle.set(ServerState::Bound);
        tracing::info!(listen = %ctx.local_addr(), "coap endpoint bound");

        Ok(Self {
            ctx,
            notifier: Notifier::from_config(cfg),
            path: cfg.counter.resource_path(),
            counter: Arc::new(Counter::new(cfg.counter.initial_value)),
            observers: Arc::new(ObserverRegistry::new(cfg.observe.max_observers)),
            lifecycle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.ctx.local_addr()
    }

    pub fn counter(&self) -> Arc<Counter> {
        Arc::clone(&self.counter)
    }

    pub fn observers(&self) -> Arc<ObserverRegistry> {
        Arc::clone(&self.observers)
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }

    /// Register the resource, run until `stop` turns true, then tear down.
    pub async fn run(self, mut stop: watch::Receiver<bool>) -> Result<()> {
        let CoapServer {
            mut ctx,
            notifier,
            path,
            counter,
            observers,
            lifecycle,
        } = self;

        let resource = CounterResource::new(path, Arc::clone(&counter));
        ctx.register(Arc::new(resource), observers)?;
        lifecycle.set(ServerState::Running);

        // first cycle completes before any datagram is read
        notifier.run_cycle(&counter, Some(&ctx)).await;

        let period = notifier.interval();
        let mut tick = tokio::time::interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // one spare byte detects datagrams above the limit
        let mut buf = vec![0u8; ctx.max_datagram_bytes() + 1];

        loop {
            tokio::select! {
                biased;

                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }

                _ = tick.tick() => {
                    notifier.run_cycle(&counter, Some(&ctx)).await;
                }

                recv = ctx.socket().recv_from(&mut buf) => {
                    match recv {
                        Ok((len, peer)) if len > ctx.max_datagram_bytes() => {
                            tracing::warn!(
                                %peer,
                                len,
                                "datagram exceeds max_datagram_bytes, dropped"
                            );
                        }
                        Ok((len, peer)) => {
                            let raw = Bytes::copy_from_slice(&buf[..len]);
                            handle_datagram(&ctx, peer, raw).await;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "recv failed");
                        }
                    }
                }
            }
        }

        let local = ctx.local_addr();
        ctx.unregister();
        drop(ctx);
        lifecycle.set(ServerState::Shutdown);
        tracing::info!(listen = %local, counter = counter.value(), "coap server stopped");
        Ok(())
    }

    /// Run on a background task.
    pub fn spawn(self) -> ServerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let local_addr = self.local_addr();
        let counter = self.counter();
        let observers = self.observers();
        let lifecycle = self.lifecycle();
        let task = tokio::spawn(self.run(stop_rx));

        ServerHandle {
            local_addr,
            counter,
            observers,
            lifecycle,
            stop: stop_tx,
            task,
        }
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(peer = %peer))]
async fn handle_datagram(ctx: &ServerContext, peer: SocketAddr, raw: Bytes) {
    match classify(raw) {
        Inbound::Request(req) => {
            let resp = handle_request(ctx, peer, &req);
            ctx.send(peer, &resp).await;
        }
        Inbound::Ping { message_id } => {
            ctx.send(peer, &Message::reset(message_id)).await;
        }
        Inbound::Reset { message_id } => {
            if let Some(res) = ctx.observed() {
                if res.observers().deregister_by_reset(peer, message_id).is_some() {
                    tracing::info!(path = res.path(), "observer cancelled by reset");
                }
            }
        }
        Inbound::Ack { message_id } => {
            tracing::debug!(message_id, "unexpected ack ignored");
        }
        Inbound::Ignored(reason) => {
            tracing::debug!(reason, "datagram ignored");
        }
        Inbound::Malformed { error, reset_id } => {
            tracing::debug!(error = %error, "malformed datagram");
            if let Some(mid) = reset_id {
                ctx.send(peer, &Message::reset(mid)).await;
            }
        }
    }
}

/// Handle to a spawned server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    counter: Arc<Counter>,
    observers: Arc<ObserverRegistry>,
    lifecycle: Arc<Lifecycle>,
    stop: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn counter_value(&self) -> i32 {
        self.counter.value()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.get()
    }

    /// Signal the loop to stop and wait for teardown.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.stop.send(true);
        self.task
            .await
            .map_err(|e| ServerError::Task(e.to_string()))?
    }
}

/// Whole task body: bind, register, loop until `stop`.
///
/// Context or endpoint failures are logged and returned without entering the
/// notification loop.
pub async fn run_server_task(cfg: ServerConfig, stop: watch::Receiver<bool>) -> Result<()> {
    let server = match CoapServer::bind(&cfg).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "coap server failed to start");
            return Err(e);
        }
    };
    server.run(stop).await
}
