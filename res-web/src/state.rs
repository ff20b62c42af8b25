//! Shared, cheaply-cloneable handles passed into every axum handler.

use res_blob::ChunkUploadCoordinator;
use res_core::AuthConfig;
use res_store::{EventRepository, Store, TaskRepository};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub tasks: TaskRepository,
    pub events: EventRepository,
    pub uploads: Arc<ChunkUploadCoordinator>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(store: Store, uploads: Arc<ChunkUploadCoordinator>, auth: AuthConfig) -> Self {
        let tasks = TaskRepository::new(&store);
        let events = EventRepository::new(&store);
        Self { store, tasks, events, uploads, auth: Arc::new(auth) }
    }
}
