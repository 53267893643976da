use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;

/// Observer identity: peer endpoint plus the token it registered with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObserverKey {
    pub peer: SocketAddr,
    pub token: Bytes,
}

impl ObserverKey {
    pub fn new(peer: SocketAddr, token: Bytes) -> Self {
        Self { peer, token }
    }
}

/// Result of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// Same peer and token registered again; the entry is kept, not duplicated.
    Refreshed,
    /// Registry was full; the oldest observer was evicted to make room.
    Replaced(ObserverKey),
}

#[derive(Debug, Clone)]
struct ObserverEntry {
    created_seq: u64,
    last_mid: Option<u16>,
}

/// Observer registry: `(peer, token) -> entry`, bounded by `max_observers`.
#[derive(Debug)]
pub struct ObserverRegistry {
    observers: DashMap<ObserverKey, ObserverEntry>,
    max_observers: usize,
    seq: AtomicU64,
}

impl ObserverRegistry {
    pub fn new(max_observers: usize) -> Self {
        Self {
            observers: DashMap::new(),
            max_observers,
            seq: AtomicU64::new(1),
        }
    }

    pub fn register(&self, key: ObserverKey) -> Registration {
        if let Some(mut e) = self.observers.get_mut(&key) {
            e.last_mid = None;
            return Registration::Refreshed;
        }

        // Peers that vanish never send RST on NON notifications; make room
        // by dropping the longest-registered entry.
        let mut evicted = None;
        while self.observers.len() >= self.max_observers {
            match self.evict_oldest() {
                Some(victim) => evicted = Some(victim),
                None => break,
            }
        }

        let created_seq = self.seq.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            peer = %key.peer,
            observers = self.observers.len() + 1,
            "observer registered"
        );
        self.observers.insert(
            key,
            ObserverEntry {
                created_seq,
                last_mid: None,
            },
        );

        match evicted {
            Some(victim) => Registration::Replaced(victim),
            None => Registration::Added,
        }
    }

    /// Remove the observer with the smallest registration sequence.
    pub fn evict_oldest(&self) -> Option<ObserverKey> {
        let victim = self
            .observers
            .iter()
            .min_by_key(|e| e.value().created_seq)
            .map(|e| e.key().clone())?;
        let (key, _) = self.observers.remove(&victim)?;
        tracing::info!(peer = %key.peer, "oldest observer evicted");
        Some(key)
    }

    pub fn deregister(&self, key: &ObserverKey) -> bool {
        self.observers.remove(key).is_some()
    }

    /// Drop the observer whose latest notification carried `mid` (peer sent RST).
    pub fn deregister_by_reset(&self, peer: SocketAddr, mid: u16) -> Option<ObserverKey> {
        let key = self
            .observers
            .iter()
            .find(|e| e.key().peer == peer && e.value().last_mid == Some(mid))
            .map(|e| e.key().clone())?;
        self.observers.remove(&key).map(|(k, _)| k)
    }

    /// Remember the message id of the latest notification sent to `key`.
    pub fn record_sent(&self, key: &ObserverKey, mid: u16) {
        if let Some(mut e) = self.observers.get_mut(key) {
            e.last_mid = Some(mid);
        }
    }

    /// Observers in registration order.
    pub fn snapshot(&self) -> Vec<ObserverKey> {
        let mut all: Vec<(u64, ObserverKey)> = self
            .observers
            .iter()
            .map(|e| (e.value().created_seq, e.key().clone()))
            .collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, k)| k).collect()
    }

    pub fn contains(&self, key: &ObserverKey) -> bool {
        self.observers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Remove every observer, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let n = self.observers.len();
        self.observers.clear();
        n
    }
}
