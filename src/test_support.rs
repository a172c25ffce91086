//! Shared fixtures for unit tests: an in-memory SQLite database with the
//! real migrations applied, plus small seeding helpers.

use crate::entities::{Rank, pool_item_entity as items};
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};

/// A single connection keeps the in-memory database alive for the whole test.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("connect in-memory sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

pub struct ItemSeed {
    pub pool_id: String,
    pub name: String,
    pub weight: i64,
    pub rank: Rank,
    pub external_product_id: Option<i64>,
    pub is_active: bool,
    pub image_url: String,
    pub reference_price: i64,
}

impl ItemSeed {
    pub fn new(pool_id: &str, name: &str, weight: i64) -> Self {
        Self {
            pool_id: pool_id.to_string(),
            name: name.to_string(),
            weight,
            rank: Rank::C,
            external_product_id: None,
            is_active: true,
            image_url: format!("https://img.example.com/{name}.png"),
            reference_price: 1000,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn rank(mut self, rank: Rank) -> Self {
        self.rank = rank;
        self
    }

    pub fn external(mut self, product_id: i64) -> Self {
        self.external_product_id = Some(product_id);
        self
    }
}

pub async fn seed_item(db: &DatabaseConnection, seed: ItemSeed) -> items::Model {
    let now = Utc::now();
    items::ActiveModel {
        pool_id: Set(seed.pool_id),
        external_product_id: Set(seed.external_product_id),
        name: Set(seed.name),
        image_url: Set(seed.image_url),
        rank: Set(seed.rank),
        reference_price: Set(seed.reference_price),
        weight: Set(seed.weight),
        is_active: Set(seed.is_active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed pool item")
}
