use std::sync::Arc;

use crate::service::RegistryService;

#[derive(Clone)]
pub struct RegistryState {
    service: Arc<RegistryService>,
}

impl RegistryState {
    pub fn new(service: Arc<RegistryService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &RegistryService {
        &self.service
    }
}
