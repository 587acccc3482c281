//! Dependent fetches gated on an upstream loader.
//!
//! The job-detail screen fetches similar jobs only once the primary job has
//! resolved. The coordinator watches the upstream loader's state stream and
//! drives its own [`ResourceLoader`]: it starts a dependent fetch on upstream
//! `Ready` for a key it has not yet started, restarts when the upstream key
//! changes, and cancels when the upstream leaves `Ready`. An upstream failure
//! therefore produces zero dependent calls, and a dependent failure never
//! touches the upstream state.

use std::sync::Arc;

use async_trait::async_trait;
use shared::error::ApiFailure;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::loader::{ResourceFetcher, ResourceLoader, ResourceState};

struct CappedFetcher<K, U> {
    inner: Arc<dyn ResourceFetcher<K, Vec<U>>>,
    cap: usize,
}

#[async_trait]
impl<K, U> ResourceFetcher<K, Vec<U>> for CappedFetcher<K, U>
where
    K: Send + Sync,
    U: Send + Sync,
{
    async fn fetch(&self, key: &K) -> Result<Vec<U>, ApiFailure> {
        let mut items = self.inner.fetch(key).await?;
        items.truncate(self.cap);
        Ok(items)
    }
}

pub struct DependentFetchCoordinator<K, U> {
    loader: ResourceLoader<K, Vec<U>>,
    watch_task: JoinHandle<()>,
}

impl<K, U> DependentFetchCoordinator<K, U>
where
    K: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    /// Spawns a coordinator bound to `upstream`. Dependent results are
    /// truncated to at most `cap` items before being exposed.
    pub fn spawn<T>(
        upstream: watch::Receiver<ResourceState<K, T>>,
        fetcher: Arc<dyn ResourceFetcher<K, Vec<U>>>,
        cap: usize,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let loader = ResourceLoader::new(Arc::new(CappedFetcher {
            inner: fetcher,
            cap,
        }) as Arc<dyn ResourceFetcher<K, Vec<U>>>);
        let watch_task = tokio::spawn(drive(upstream, loader.clone()));
        Self { loader, watch_task }
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<K, Vec<U>>> {
        self.loader.subscribe()
    }

    pub fn current(&self) -> ResourceState<K, Vec<U>> {
        self.loader.current()
    }

    pub async fn settled(&self) -> ResourceState<K, Vec<U>> {
        self.loader.settled().await
    }

    pub async fn cancel(&self) {
        self.loader.cancel().await;
    }
}

impl<K, U> Drop for DependentFetchCoordinator<K, U> {
    fn drop(&mut self) {
        self.watch_task.abort();
    }
}

async fn drive<K, T, U>(
    mut upstream: watch::Receiver<ResourceState<K, T>>,
    loader: ResourceLoader<K, Vec<U>>,
) where
    K: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    let mut started: Option<K> = None;
    loop {
        let state = upstream.borrow_and_update().clone();
        match state {
            ResourceState::Ready { key, .. } => {
                if started.as_ref() != Some(&key) {
                    started = Some(key.clone());
                    loader.load(key).await;
                }
            }
            _ => {
                if started.take().is_some() {
                    loader.cancel().await;
                }
            }
        }
        if upstream.changed().await.is_err() {
            break;
        }
    }
}
