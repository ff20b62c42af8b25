//! Connection setup and index declarations.

use crate::error::StoreResult;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};
use res_core::MongoConfig;
use tracing::info;

#[derive(Clone)]
pub struct Store {
    pub db: Database,
}

impl Store {
    pub async fn connect(config: &MongoConfig) -> StoreResult<Self> {
        let client = Client::with_uri_str(&config.url).await?;
        client.database(&config.db_name).run_command(doc! { "ping": 1 }).await?;
        info!(db = %config.db_name, "connected to mongodb");

        let db = client.database(&config.db_name);
        let store = Self { db };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let events = self.db.collection::<mongodb::bson::Document>("events");
        events
            .create_index(IndexModel::builder().keys(doc! { "status": 1 }).build())
            .await?;
        events
            .create_index(IndexModel::builder().keys(doc! { "processingAt": 1 }).build())
            .await?;

        let reservations = self.db.collection::<mongodb::bson::Document>("reservations");
        reservations
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "reservationId": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;
        reservations
            .create_index(IndexModel::builder().keys(doc! { "checkInDate": 1, "checkOutDate": 1 }).build())
            .await?;

        let tasks = self.db.collection::<mongodb::bson::Document>("tasks");
        tasks
            .create_index(IndexModel::builder().keys(doc! { "status": 1 }).build())
            .await?;

        Ok(())
    }
}
