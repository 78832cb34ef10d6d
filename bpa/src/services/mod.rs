/*!
The application-agent boundary.

Local services register the endpoints they answer for; the pipeline
delivers descriptors of bundles addressed to those endpoints. Sending
goes the other way through [`Node::send`](crate::node::Node::send),
which funnels locally-created bundles into the store and the forwarding
path.
*/

use crate::{async_trait, store::BundleDescriptor, warn, Arc};
use brant_bpv7::eid::EndpointId;
use std::{collections::HashMap, sync::RwLock};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("A service named {0} is already registered")]
    AlreadyRegistered(String),

    #[error("No service named {0} is registered")]
    NoSuchService(String),

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A local application endpoint.
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique name of this service within the node.
    fn name(&self) -> String;

    /// The endpoints this service answers for.
    fn endpoints(&self) -> Vec<EndpointId>;

    /// Hand over a bundle addressed to one of this service's endpoints.
    /// The bundle body can be fetched from the store via the descriptor.
    async fn deliver(&self, descriptor: &BundleDescriptor) -> Result<()>;
}

#[derive(Default)]
pub struct Registry {
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, service: Arc<dyn Service>) -> Result<()> {
        let name = service.name();
        match self
            .services
            .write()
            .expect("service registry lock poisoned")
            .entry(name.clone())
        {
            std::collections::hash_map::Entry::Occupied(_) => {
                Err(Error::AlreadyRegistered(name))
            }
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(service);
                Ok(())
            }
        }
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        self.services
            .write()
            .expect("service registry lock poisoned")
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NoSuchService(name.to_string()))
    }

    /// Every endpoint registered by any service.
    pub fn endpoints(&self) -> Vec<EndpointId> {
        self.services
            .read()
            .expect("service registry lock poisoned")
            .values()
            .flat_map(|s| s.endpoints())
            .collect()
    }

    /// Services answering for `destination`.
    pub fn matching(&self, destination: &EndpointId) -> Vec<Arc<dyn Service>> {
        self.services
            .read()
            .expect("service registry lock poisoned")
            .values()
            .filter(|s| s.endpoints().contains(destination))
            .cloned()
            .collect()
    }

    /// Deliver a descriptor to every matching service. Returns whether
    /// any service matched; per-service failures are logged, not fatal.
    pub async fn deliver(&self, descriptor: &BundleDescriptor) -> bool {
        let matching = self.matching(&descriptor.destination);
        if matching.is_empty() {
            return false;
        }
        for service in matching {
            if let Err(e) = service.deliver(descriptor).await {
                warn!(
                    "service {} failed to take delivery of bundle {}: {e}",
                    service.name(),
                    descriptor.key()
                );
            }
        }
        true
    }

    pub fn shutdown(&self) {
        self.services
            .write()
            .expect("service registry lock poisoned")
            .clear();
    }
}
