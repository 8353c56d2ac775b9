//! Provider registry
//!
//! Caches one [`ProviderClient`] per [`ProviderKind`]. Clients are created on
//! first use and shared afterwards; they carry no per-request state, so the
//! same instance serves every concurrent request for its kind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::http::{HttpTransport, ReqwestTransport};
use crate::providers::{ProviderClient, create_client};
use crate::types::ProviderKind;

/// Lazily populated cache of provider clients sharing one transport.
pub struct ProviderRegistry {
    transport: Arc<dyn HttpTransport>,
    clients: Mutex<HashMap<ProviderKind, Arc<dyn ProviderClient>>>,
}

impl ProviderRegistry {
    /// Registry whose clients send through `transport`.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Registry backed by the default `reqwest` transport.
    pub fn with_default_transport() -> Self {
        Self::new(Arc::new(ReqwestTransport::new()))
    }

    /// Return the client for `kind`, creating it if needed.
    ///
    /// The first caller creates the client; concurrent callers observe the
    /// same `Arc`.
    pub fn resolve(&self, kind: ProviderKind) -> Arc<dyn ProviderClient> {
        let mut clients = self.lock();
        Arc::clone(clients.entry(kind).or_insert_with(|| {
            tracing::debug!(provider = %kind, "creating provider client");
            create_client(kind, Arc::clone(&self.transport))
        }))
    }

    /// Install a client for `kind`, replacing any cached one.
    pub fn register(&self, client: Arc<dyn ProviderClient>) {
        let kind = client.kind();
        self.lock().insert(kind, client);
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.lock().contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every cached client.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<ProviderKind, Arc<dyn ProviderClient>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_default_transport()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<ProviderKind> = self.lock().keys().copied().collect();
        f.debug_struct("ProviderRegistry")
            .field("clients", &kinds)
            .finish_non_exhaustive()
    }
}
