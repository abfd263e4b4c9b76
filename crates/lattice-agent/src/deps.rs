use std::sync::Arc;

use lattice_coord::CoordStore;
use lattice_core::config::LatticeConfig;
use lattice_llm::ProviderRegistry;
use lattice_mq::BrokerHandle;
use lattice_store::Store;

/// Process-wide resources, initialized once at startup and passed to every
/// handler. Consumers and agents never reach for globals.
#[derive(Clone)]
pub struct Deps {
    pub config: Arc<LatticeConfig>,
    pub store: Arc<Store>,
    pub coord: Arc<CoordStore>,
    pub broker: BrokerHandle,
    pub llm: Arc<ProviderRegistry>,
}
