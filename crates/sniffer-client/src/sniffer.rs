//! Process-wide sniffer service.
//!
//! [`NetworkSniffer::start`] installs the interceptor into the default client
//! configuration exactly once per process. Everything built with
//! [`default_client`](crate::default_client) from then on is recorded into
//! the sniffer's store, including clients created before the call.
//!
//! For a scoped setup that leaves the registry alone, build a sniffer with
//! [`NetworkSniffer::new`] and [`install`](NetworkSniffer::install) it on a
//! single [`ClientBuilder`].

use std::sync::Arc;

use once_cell::sync::OnceCell;

use sniffer_core::{
    CaptureConfig, CaptureStore, FilterRules, HostFilter, StoreSubscription, TrafficRecord,
};

use crate::client::{ClientBuilder, ProtocolHook};
use crate::interceptor::NetworkInterceptor;

static SHARED: OnceCell<NetworkSniffer> = OnceCell::new();

/// Capture store, host filter and interceptor bundled together.
#[derive(Debug)]
pub struct NetworkSniffer {
    config: CaptureConfig,
    store: Arc<CaptureStore>,
    filter: Arc<HostFilter>,
    interceptor: Arc<NetworkInterceptor>,
}

impl NetworkSniffer {
    /// Creates a sniffer that is not registered anywhere yet.
    pub fn new(config: CaptureConfig) -> Self {
        let store = Arc::new(CaptureStore::new());
        let filter = Arc::new(HostFilter::new(config.rules()));
        let interceptor = Arc::new(NetworkInterceptor::new(
            Arc::clone(&filter),
            Arc::clone(&store),
        ));

        Self {
            config,
            store,
            filter,
            interceptor,
        }
    }

    /// Starts the process-wide sniffer.
    ///
    /// The first call wins. Later calls return the running instance and keep
    /// its configuration. An interceptor registered elsewhere under the same
    /// name is evicted so default-client traffic lands in this sniffer.
    pub fn start(config: CaptureConfig) -> &'static NetworkSniffer {
        let mut created = false;
        let sniffer = SHARED.get_or_init(|| {
            created = true;
            let sniffer = NetworkSniffer::new(config.clone());
            if sniffer.interceptor.register_replacing() {
                tracing::warn!("Evicted an interceptor registered outside the network sniffer");
            }
            tracing::info!(
                "Network sniffer started ({} mode, {} patterns)",
                sniffer.config.mode.as_str(),
                sniffer.config.patterns.len()
            );
            sniffer
        });

        if !created && sniffer.config != config {
            tracing::warn!("Network sniffer already started, ignoring new configuration");
        }
        sniffer
    }

    /// Returns the process-wide sniffer if it was started.
    pub fn shared() -> Option<&'static NetworkSniffer> {
        SHARED.get()
    }

    /// Adds this sniffer's interceptor to one client.
    pub fn install(&self, builder: ClientBuilder) -> ClientBuilder {
        builder.hook(Arc::clone(&self.interceptor) as Arc<dyn ProtocolHook>)
    }

    /// Returns the captured records, newest first.
    pub fn snapshot(&self) -> Vec<Arc<TrafficRecord>> {
        self.store.snapshot()
    }

    /// Removes every captured record.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Returns true if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Subscribes to store changes.
    pub fn subscribe(&self) -> StoreSubscription {
        self.store.subscribe()
    }

    /// Returns the capture store.
    pub fn store(&self) -> &Arc<CaptureStore> {
        &self.store
    }

    /// Returns a copy of the filter rules in force.
    ///
    /// The live filter is not exposed, so rules stay fixed once started.
    pub fn rules(&self) -> FilterRules {
        self.filter.rules()
    }

    /// Returns the configuration this sniffer was created with.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}
