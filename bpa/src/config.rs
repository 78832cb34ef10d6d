use crate::{cla::ClaType, routing::AlgorithmKind, storage, Arc};
use brant_bpv7::eid::EndpointId;

/// Node configuration.
///
/// Deserializable so a daemon can read it from a configuration file;
/// storage backends are injected programmatically and never come from
/// configuration.
#[derive(serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// The EID used as this node's address. Seeds `already_sent_to` on
    /// insertion and names this node in Previous Node blocks.
    pub node_id: EndpointId,

    pub store: StoreConfig,
    pub routing: RoutingConfig,

    /// Listeners to open at startup.
    pub listener: Vec<ListenerConfig>,

    pub cron: CronConfig,
    pub quicl: QuiclConfig,

    #[serde(skip)]
    pub metadata_storage: Option<Arc<dyn storage::MetadataStorage>>,

    #[serde(skip)]
    pub bundle_storage: Option<Arc<dyn storage::BundleStorage>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: EndpointId::Null,
            store: StoreConfig::default(),
            routing: RoutingConfig::default(),
            listener: Vec::new(),
            cron: CronConfig::default(),
            quicl: QuiclConfig::default(),
            metadata_storage: None,
            bundle_storage: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("node_id", &self.node_id)
            .field("store", &self.store)
            .field("routing", &self.routing)
            .field("listener", &self.listener)
            .field("cron", &self.cron)
            .field("quicl", &self.quicl)
            .finish()
    }
}

#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for persistent state.
    pub path: std::path::PathBuf,
}

#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub algorithm: AlgorithmKind,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ListenerConfig {
    #[serde(rename = "type")]
    pub cla_type: ClaType,
    pub address: String,
}

/// Periods of the recurring maintenance tasks, in milliseconds.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct CronConfig {
    /// Dispatch tick: scan for dispatchable bundles.
    pub dispatch: u64,
    /// Garbage collection scan.
    pub gc: u64,
    /// Sequence-id keeper cleaning.
    pub id_clean: u64,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            dispatch: 1_000,
            gc: 5_000,
            id_clean: 60 * 60 * 1_000,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct QuiclConfig {
    /// How long a listener waits for the dialer to start the handshake,
    /// in milliseconds.
    pub handshake_timeout: u64,
}

impl Default for QuiclConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: 500,
        }
    }
}
