//! Reload-on-boot chain cache (§3 "Immutable during a run; reloaded at
//! boot"): one `ChainAdapter` per active chain row, keyed by the chain's
//! family, built once at process start.

use std::collections::HashMap;
use std::sync::Arc;

use chainops_chain::{ChainAdapter, EvmAdapter, TronAdapter};
use chainops_common::model::{Chain, ChainFamily};
use chainops_datastore::{ChainProvider, DatastoreError};
use uuid::Uuid;

pub struct ChainRegistry {
    chains: HashMap<Uuid, Chain>,
    adapters: HashMap<Uuid, Arc<dyn ChainAdapter>>,
}

impl ChainRegistry {
    pub async fn load(ds: &dyn ChainProvider) -> Result<Self, DatastoreError> {
        let rows = ds.list_active_chains().await?;
        let mut chains = HashMap::with_capacity(rows.len());
        let mut adapters: HashMap<Uuid, Arc<dyn ChainAdapter>> = HashMap::with_capacity(rows.len());
        for chain in rows {
            let adapter: Arc<dyn ChainAdapter> = match chain.family {
                ChainFamily::Tron => Arc::new(TronAdapter::new(chain.rpc_url.clone(), None)),
                ChainFamily::Evm => Arc::new(EvmAdapter::new(chain.rpc_url.clone())),
            };
            adapters.insert(chain.id, adapter);
            chains.insert(chain.id, chain);
        }
        Ok(Self { chains, adapters })
    }

    pub fn chain(&self, id: Uuid) -> Option<&Chain> {
        self.chains.get(&id)
    }

    pub fn adapter(&self, id: Uuid) -> Option<&Arc<dyn ChainAdapter>> {
        self.adapters.get(&id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Chain> {
        self.chains.values().find(|c| c.name == name)
    }

    pub fn chains(&self) -> impl Iterator<Item = &Chain> {
        self.chains.values()
    }
}
