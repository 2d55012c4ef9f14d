pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod inventory;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use inventory::{EventInventory, InventoryRegistry};
use models::Event;
use services::ledger::BookingLedger;

// Shared state for the whole application
pub struct AppState {
    pub db: database::Database,
    pub cache: cache::CacheService,
    pub registry: InventoryRegistry,
    pub ledger: BookingLedger,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size)
            .await
            .context("failed to connect to database")?;

        db.run_migrations()
            .await
            .context("failed to run migrations")?;

        let redis = redis_client::RedisClient::new(&config.redis.url)
            .await
            .context("failed to connect to redis")?;
        let cache =
            cache::CacheService::new(redis, config.booking.occupancy_cache_ttl_seconds);
        let ledger = BookingLedger::new(db.clone());

        let state = Arc::new(Self {
            db,
            cache,
            registry: InventoryRegistry::new(),
            ledger,
            config,
        });

        // Inventory must agree with the ledger before any claim is
        // adjudicated, so the rebuild runs before the server starts.
        state.rebuild_registry().await?;

        Ok(state)
    }

    /// Rebuilds every event's inventory from the catalog and replays the
    /// active ledger rows: pending holds become reserved seats, paid and
    /// checked-in bookings become sold seats.
    async fn rebuild_registry(&self) -> anyhow::Result<()> {
        let events = sqlx::query_as::<_, Event>("SELECT * FROM events")
            .fetch_all(&self.db.pool)
            .await
            .context("failed to load event catalog")?;

        for event in &events {
            self.registry
                .register(
                    event.id,
                    EventInventory::new(
                        event.seat_rows as u16,
                        event.seat_cols as u16,
                        event.price,
                        event.status,
                    ),
                )
                .await;
        }
        info!("Registered inventory for {} events", events.len());

        let bookings = self
            .ledger
            .active_bookings()
            .await
            .context("failed to load active bookings")?;
        let mut replayed = 0usize;
        for booking in &bookings {
            let seats = match booking.seat_coords() {
                Ok(seats) => seats,
                Err(e) => {
                    warn!("skipping booking {} with corrupt seats: {}", booking.id, e);
                    continue;
                }
            };
            match self
                .registry
                .restore(booking.event_id, &seats, booking.status.seats_are_sold())
                .await
            {
                Ok(()) => replayed += 1,
                Err(e) => warn!("skipping booking {}: {}", booking.id, e),
            }
        }
        info!("Replayed {} active bookings into the inventory", replayed);

        Ok(())
    }
}
