//! Generation-fenced remote resource loading.
//!
//! A [`ResourceLoader`] owns the fetch lifecycle for one remote value:
//! `Idle -> Loading -> Ready | Failed`, observable through a watch channel.
//! Every `load` bumps a generation counter; a response whose generation is
//! no longer current is discarded, so the state always reflects the most
//! recently requested key no matter in which order responses arrive.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::error::ApiFailure;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

#[async_trait]
pub trait ResourceFetcher<K, T>: Send + Sync {
    async fn fetch(&self, key: &K) -> Result<T, ApiFailure>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceState<K, T> {
    Idle,
    Loading {
        key: K,
    },
    Ready {
        key: K,
        value: T,
        fetched_at: DateTime<Utc>,
    },
    Failed {
        key: K,
        error: ApiFailure,
    },
}

impl<K, T> ResourceState<K, T> {
    pub fn key(&self) -> Option<&K> {
        match self {
            Self::Idle => None,
            Self::Loading { key } | Self::Ready { key, .. } | Self::Failed { key, .. } => Some(key),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Ready { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiFailure> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::Failed { .. })
    }
}

struct LoaderInner<K, T> {
    fetcher: Arc<dyn ResourceFetcher<K, T>>,
    // Guards the generation counter and every state publication, so a stale
    // completion can never interleave between a newer load's check and send.
    generation: Mutex<u64>,
    state: watch::Sender<ResourceState<K, T>>,
}

pub struct ResourceLoader<K, T> {
    inner: Arc<LoaderInner<K, T>>,
}

impl<K, T> Clone for ResourceLoader<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> ResourceLoader<K, T>
where
    K: Clone + std::fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new(fetcher: Arc<dyn ResourceFetcher<K, T>>) -> Self {
        let (state, _) = watch::channel(ResourceState::Idle);
        Self {
            inner: Arc::new(LoaderInner {
                fetcher,
                generation: Mutex::new(0),
                state,
            }),
        }
    }

    /// Starts a fetch for `key`, superseding any in-flight request.
    ///
    /// Always re-fetches, including for a key that is already `Ready`; there
    /// is no caching across calls. Exactly one network call is made per
    /// invocation, and its result is applied only if no newer `load` or
    /// [`cancel`](Self::cancel) happened in the meantime.
    pub async fn load(&self, key: K) {
        let generation = {
            let mut current = self.inner.generation.lock().await;
            *current += 1;
            self.inner
                .state
                .send_replace(ResourceState::Loading { key: key.clone() });
            *current
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = inner.fetcher.fetch(&key).await;
            let current = inner.generation.lock().await;
            if *current != generation {
                debug!(?key, generation, current = *current, "discarding stale response");
                return;
            }
            let next = match result {
                Ok(value) => ResourceState::Ready {
                    key,
                    value,
                    fetched_at: Utc::now(),
                },
                Err(error) => {
                    warn!(?key, %error, "resource fetch failed");
                    ResourceState::Failed { key, error }
                }
            };
            inner.state.send_replace(next);
        });
    }

    /// Drops interest in any in-flight request and returns to `Idle`. The
    /// request itself is not aborted; its result is discarded on arrival.
    pub async fn cancel(&self) {
        let mut current = self.inner.generation.lock().await;
        *current += 1;
        self.inner.state.send_replace(ResourceState::Idle);
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<K, T>> {
        self.inner.state.subscribe()
    }

    pub fn current(&self) -> ResourceState<K, T> {
        self.inner.state.borrow().clone()
    }

    /// Waits for the next `Ready` or `Failed` state and returns it.
    pub async fn settled(&self) -> ResourceState<K, T> {
        let mut rx = self.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            if state.is_settled() {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.current();
            }
        }
    }
}
