//! Collaborators shared by the sweep and profile operations.

use std::sync::Arc;

use crate::interfaces::InterfaceInventory;
use crate::resolver::{ReverseResolver, SystemResolver};
use crate::subnet::SubnetResolver;

/// Handed to each scanner at construction. Cheap to clone; holds no scan state.
#[derive(Clone)]
pub struct DiscoveryContext {
    pub subnets: SubnetResolver,
    pub hostnames: Arc<dyn ReverseResolver>,
}

impl DiscoveryContext {
    pub fn new(inventory: InterfaceInventory, hostnames: Arc<dyn ReverseResolver>) -> Self {
        Self {
            subnets: SubnetResolver::new(inventory),
            hostnames,
        }
    }

    /// OS interfaces and the system resolver.
    pub fn system() -> Self {
        Self::new(InterfaceInventory::system(), Arc::new(SystemResolver))
    }

    pub fn inventory(&self) -> &InterfaceInventory {
        self.subnets.inventory()
    }
}
