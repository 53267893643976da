use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::time::timeout;

use contador_core::protocol::{encode_message, Code, Message, MessageType};

use crate::config::ServerConfig;
use crate::context::{Counter, ServerContext};
use crate::observe::ObserverKey;

/// What one notification pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Notifications were attempted for every observer.
    Sent { delivered: usize, failed: usize },
    /// No server context; nothing sent.
    NoContext,
    /// Context has no registered resource; nothing sent.
    NoResource,
    /// Notification could not be built; cycle skipped.
    EncodeFailed,
}

/// Periodic notifier: each cycle increments the counter, then pushes the
/// fixed payload to every observer of the resource.
#[derive(Debug, Clone)]
pub struct Notifier {
    interval: Duration,
    payload: Bytes,
    send_timeout: Duration,
}

impl Notifier {
    pub fn new(interval: Duration, payload: impl Into<Bytes>, send_timeout: Duration) -> Self {
        Self {
            interval,
            payload: payload.into(),
            send_timeout,
        }
    }

    pub fn from_config(cfg: &ServerConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.counter.notify_interval_ms),
            Bytes::from(cfg.counter.notify_payload.clone()),
            Duration::from_millis(cfg.observe.send_timeout_ms),
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// One cycle: increment, log, notify.
    pub async fn run_cycle(&self, counter: &Counter, ctx: Option<&ServerContext>) -> NotifyOutcome {
        let value = counter.increment();
        tracing::info!(counter = value, "incrementing counter");
        self.notify_observers(ctx).await
    }

    /// Broadcast the notification payload to every observer.
    pub async fn notify_observers(&self, ctx: Option<&ServerContext>) -> NotifyOutcome {
        let Some(ctx) = ctx else {
            tracing::error!("coap context is not initialized");
            return NotifyOutcome::NoContext;
        };
        let Some(resource) = ctx.observed() else {
            tracing::warn!("no observable resource registered");
            return NotifyOutcome::NoResource;
        };

        let observers = resource.observers().snapshot();
        let seq = resource.next_seq();
        if observers.is_empty() {
            return NotifyOutcome::Sent { delivered: 0, failed: 0 };
        }

        // Build every datagram first so a bad notification skips the whole cycle.
        let mut outgoing: Vec<(ObserverKey, u16, Bytes)> = Vec::with_capacity(observers.len());
        for key in observers {
            let mid = ctx.next_message_id();
            let mut msg = Message::new(MessageType::NonConfirmable, Code::CONTENT, mid)
                .with_token(key.token.clone())
                .with_payload(self.payload.clone());
            msg.set_observe(seq);
            msg.set_content_format(resource.content_format());

            let raw = match encode_message(&msg) {
                Ok(raw) if raw.len() <= ctx.max_datagram_bytes() => raw,
                Ok(raw) => {
                    tracing::error!(
                        len = raw.len(),
                        "notification exceeds max_datagram_bytes, skipping cycle"
                    );
                    return NotifyOutcome::EncodeFailed;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to create notification, skipping cycle");
                    return NotifyOutcome::EncodeFailed;
                }
            };
            outgoing.push((key, mid, raw));
        }

        let socket = ctx.socket();
        let send_timeout = self.send_timeout;
        let mut futs = FuturesUnordered::new();
        for (key, mid, raw) in outgoing {
            futs.push(async move {
                let sent = timeout(send_timeout, socket.send_to(&raw, key.peer)).await;
                (key, mid, sent)
            });
        }

        let (mut delivered, mut failed) = (0, 0);
        while let Some((key, mid, sent)) = futs.next().await {
            match sent {
                Ok(Ok(_)) => {
                    resource.observers().record_sent(&key, mid);
                    delivered += 1;
                }
                Ok(Err(e)) => {
                    log_send_failure(key.peer, &e.to_string());
                    failed += 1;
                }
                Err(_) => {
                    log_send_failure(key.peer, "timed out");
                    failed += 1;
                }
            }
        }

        tracing::debug!(path = resource.path(), seq, delivered, failed, "observers notified");
        NotifyOutcome::Sent { delivered, failed }
    }
}

fn log_send_failure(peer: SocketAddr, reason: &str) {
    tracing::warn!(%peer, reason, "notification send failed");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::net::UdpSocket;

    use contador_core::protocol::decode_message;

    use super::*;
    use crate::observe::ObserverRegistry;
    use crate::services::CounterResource;

    fn notifier() -> Notifier {
        Notifier::new(
            Duration::from_millis(5000),
            Bytes::from_static(b"aumento identificado"),
            Duration::from_millis(500),
        )
    }

    async fn context(counter: &Arc<Counter>, observers: &Arc<ObserverRegistry>) -> ServerContext {
        let mut ctx = ServerContext::bind(SocketAddr::from(([127, 0, 0, 1], 0)), 1152)
            .await
            .unwrap();
        ctx.register(
            Arc::new(CounterResource::new("/contador", Arc::clone(counter))),
            Arc::clone(observers),
        )
        .unwrap();
        ctx
    }

    #[tokio::test]
    async fn missing_context_skips_broadcast_but_counts() {
        let counter = Counter::new(0);
        let n = notifier();
        for _ in 0..3 {
            assert_eq!(n.run_cycle(&counter, None).await, NotifyOutcome::NoContext);
        }
        assert_eq!(counter.value(), 3);
    }

    #[tokio::test]
    async fn n_cycles_add_n_with_no_observers() {
        let counter = Arc::new(Counter::new(10));
        let observers = Arc::new(ObserverRegistry::new(4));
        let ctx = context(&counter, &observers).await;
        let n = notifier();

        for _ in 0..5 {
            let out = n.run_cycle(&counter, Some(&ctx)).await;
            assert_eq!(out, NotifyOutcome::Sent { delivered: 0, failed: 0 });
        }
        assert_eq!(counter.value(), 15);
    }

    #[tokio::test]
    async fn unregistered_context_reports_no_resource() {
        let ctx = ServerContext::bind(SocketAddr::from(([127, 0, 0, 1], 0)), 1152)
            .await
            .unwrap();
        let counter = Counter::new(0);
        assert_eq!(notifier().run_cycle(&counter, Some(&ctx)).await, NotifyOutcome::NoResource);
        assert_eq!(counter.value(), 1);
    }

    #[tokio::test]
    async fn observer_receives_fixed_payload_with_token_and_sequence() {
        let counter = Arc::new(Counter::new(0));
        let observers = Arc::new(ObserverRegistry::new(4));
        let ctx = context(&counter, &observers).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let key = ObserverKey::new(client.local_addr().unwrap(), Bytes::from_static(&[0xca, 0xfe]));
        observers.register(key.clone());

        let n = notifier();
        assert_eq!(
            n.run_cycle(&counter, Some(&ctx)).await,
            NotifyOutcome::Sent { delivered: 1, failed: 0 }
        );
        assert_eq!(
            n.run_cycle(&counter, Some(&ctx)).await,
            NotifyOutcome::Sent { delivered: 1, failed: 0 }
        );

        let mut buf = [0u8; 256];
        let mut seqs = Vec::new();
        for _ in 0..2 {
            let (len, _) = client.recv_from(&mut buf).await.unwrap();
            let msg = decode_message(Bytes::copy_from_slice(&buf[..len])).unwrap();
            assert_eq!(msg.mtype, MessageType::NonConfirmable);
            assert_eq!(msg.code, Code::CONTENT);
            assert_eq!(&msg.token[..], &[0xca, 0xfe]);
            assert_eq!(&msg.payload[..], b"aumento identificado");
            seqs.push(msg.observe().unwrap().unwrap());
        }
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(counter.value(), 2);
    }

    #[tokio::test]
    async fn oversized_notification_skips_cycle() {
        let counter = Arc::new(Counter::new(0));
        let observers = Arc::new(ObserverRegistry::new(4));
        let mut ctx = ServerContext::bind(SocketAddr::from(([127, 0, 0, 1], 0)), 64)
            .await
            .unwrap();
        ctx.register(
            Arc::new(CounterResource::new("/contador", Arc::clone(&counter))),
            Arc::clone(&observers),
        )
        .unwrap();
        let peer = SocketAddr::from(([127, 0, 0, 1], 9));
        observers.register(ObserverKey::new(peer, Bytes::new()));

        let n = Notifier::new(
            Duration::from_millis(10),
            Bytes::from(vec![b'x'; 200]),
            Duration::from_millis(50),
        );
        assert_eq!(
            n.run_cycle(&counter, Some(&ctx)).await,
            NotifyOutcome::EncodeFailed
        );
        assert_eq!(counter.value(), 1);
    }
}
