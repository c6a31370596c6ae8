//! Postgres-backed storage collaborator.
//!
//! Enabled with the `postgres` feature. Every table carries a `version` column;
//! saves are compare-and-swap updates on that column, so the optimistic
//! concurrency contract holds across processes, not just threads.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | any other | `Backend` |
//! | Pool / IO / protocol | N/A | `Backend` |
//! | Row decode / range | N/A | `Decode` |
//!
//! A CAS miss (zero rows affected) is reported as `Concurrency`.
//!
//! ## Runtime
//!
//! The store traits are synchronous. `PostgresStorage` drives sqlx through
//! `tokio::runtime::Handle::block_on`, so it must be called from a thread that
//! belongs to a tokio runtime but is not an async worker (e.g. `spawn_blocking`).

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use dronedispatch_core::{AggregateId, AggregateRoot, ExpectedVersion};
use dronedispatch_delivery::{Item, ItemId, Order, OrderId, OrderParts};
use dronedispatch_fleet::{Depot, DepotId, GeoPoint, SerialNumber, Unit, UnitId, UnitStatus};

use super::r#trait::{DepotStore, ItemCatalog, OrderStore, StoreError, UnitStore};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS depots (
        id          UUID PRIMARY KEY,
        latitude    DOUBLE PRECISION NOT NULL,
        longitude   DOUBLE PRECISION NOT NULL,
        version     BIGINT NOT NULL,
        created_seq BIGSERIAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS units (
        id          UUID PRIMARY KEY,
        serial      UUID NOT NULL UNIQUE,
        status      TEXT NOT NULL,
        depot_id    UUID NOT NULL REFERENCES depots (id),
        version     BIGINT NOT NULL,
        created_seq BIGSERIAL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS units_depot_id_idx ON units (depot_id)",
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id          UUID PRIMARY KEY,
        title       TEXT NOT NULL,
        price       BIGINT NOT NULL,
        version     BIGINT NOT NULL,
        created_seq BIGSERIAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id           UUID PRIMARY KEY,
        item_id      UUID NOT NULL REFERENCES items (id),
        address      TEXT NOT NULL,
        placed_at    TIMESTAMPTZ NOT NULL,
        due_at       TIMESTAMPTZ NOT NULL,
        delivered_at TIMESTAMPTZ,
        unit_id      UUID REFERENCES units (id),
        version      BIGINT NOT NULL,
        created_seq  BIGSERIAL,
        CHECK (delivered_at IS NULL OR unit_id IS NOT NULL)
    )
    "#,
];

/// Postgres implementation of every store trait.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a small connection pool against `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for stmt in SCHEMA {
            sqlx::query(stmt)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn fetch_depots(&self) -> Result<Vec<Depot>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, latitude, longitude, version FROM depots ORDER BY created_seq ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_depots", e))?;

        rows.iter().map(depot_from_row).collect()
    }

    async fn count_units(&self, depot_id: DepotId) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM units WHERE depot_id = $1")
            .bind(*depot_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_units_for", e))?;

        let total: i64 = row.try_get("total").map_err(decode_error)?;
        to_u64(total)
    }

    #[instrument(skip(self, depot), fields(depot_id = %depot.id_typed()), err)]
    async fn insert_depot(&self, depot: Depot) -> Result<Depot, StoreError> {
        let location = depot.location();
        let result = sqlx::query(
            r#"
            INSERT INTO depots (id, latitude, longitude, version)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(*depot.id_typed().as_uuid())
        .bind(location.latitude())
        .bind(location.longitude())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_depot", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(format!(
                "depot {} already exists",
                depot.id_typed()
            )));
        }
        Ok(depot.with_version(1))
    }

    async fn fetch_unit(&self, id: UnitId) -> Result<Option<Unit>, StoreError> {
        let row = sqlx::query("SELECT id, serial, status, depot_id, version FROM units WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_unit", e))?;

        row.as_ref().map(unit_from_row).transpose()
    }

    async fn fetch_units(&self) -> Result<Vec<Unit>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, serial, status, depot_id, version FROM units ORDER BY created_seq ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_units", e))?;

        rows.iter().map(unit_from_row).collect()
    }

    #[instrument(skip(self, unit), fields(unit_id = %unit.id_typed(), expected = ?expected), err)]
    async fn save_unit(&self, unit: Unit, expected: ExpectedVersion) -> Result<Unit, StoreError> {
        let id = *unit.id_typed().as_uuid();
        let serial = *unit.serial().as_uuid();
        let status = unit.status().as_str();
        let depot_id = *unit.depot_id().as_uuid();

        let version = match expected {
            ExpectedVersion::Exact(0) => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO units (id, serial, status, depot_id, version)
                    VALUES ($1, $2, $3, $4, 1)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(id)
                .bind(serial)
                .bind(status)
                .bind(depot_id)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("insert_unit", e))?;
                cas_outcome(result.rows_affected(), 1, "unit", &unit)?
            }
            ExpectedVersion::Exact(current) => {
                let result = sqlx::query(
                    r#"
                    UPDATE units
                    SET status = $2, depot_id = $3, version = version + 1
                    WHERE id = $1 AND version = $4
                    "#,
                )
                .bind(id)
                .bind(status)
                .bind(depot_id)
                .bind(to_i64(current)?)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("update_unit", e))?;
                cas_outcome(result.rows_affected(), current + 1, "unit", &unit)?
            }
            ExpectedVersion::Any => {
                let row = sqlx::query(
                    r#"
                    INSERT INTO units (id, serial, status, depot_id, version)
                    VALUES ($1, $2, $3, $4, 1)
                    ON CONFLICT (id) DO UPDATE
                        SET status = EXCLUDED.status,
                            depot_id = EXCLUDED.depot_id,
                            version = units.version + 1
                    RETURNING version
                    "#,
                )
                .bind(id)
                .bind(serial)
                .bind(status)
                .bind(depot_id)
                .fetch_one(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("upsert_unit", e))?;
                to_u64(row.try_get("version").map_err(decode_error)?)?
            }
        };

        Ok(unit.with_version(version))
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, item_id, address, placed_at, due_at, delivered_at, unit_id, version
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_order", e))?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn fetch_orders(&self, pending_only: bool) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, item_id, address, placed_at, due_at, delivered_at, unit_id, version
            FROM orders
            WHERE NOT $1 OR (unit_id IS NULL AND delivered_at IS NULL)
            ORDER BY created_seq ASC
            "#,
        )
        .bind(pending_only)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        rows.iter().map(order_from_row).collect()
    }

    #[instrument(skip(self, order), fields(order_id = %order.id_typed(), expected = ?expected), err)]
    async fn save_order(
        &self,
        order: Order,
        expected: ExpectedVersion,
    ) -> Result<Order, StoreError> {
        let parts = order.to_parts();
        let id = *parts.id.as_uuid();
        let unit_id: Option<Uuid> = parts.unit_id.map(|u| *u.as_uuid());

        let version = match expected {
            ExpectedVersion::Exact(0) => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO orders
                        (id, item_id, address, placed_at, due_at, delivered_at, unit_id, version)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(id)
                .bind(*parts.item_id.as_uuid())
                .bind(&parts.address)
                .bind(parts.placed_at)
                .bind(parts.due_at)
                .bind(parts.delivered_at)
                .bind(unit_id)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("insert_order", e))?;
                cas_outcome(result.rows_affected(), 1, "order", &order)?
            }
            ExpectedVersion::Exact(current) => {
                let result = sqlx::query(
                    r#"
                    UPDATE orders
                    SET delivered_at = $2, unit_id = $3, version = version + 1
                    WHERE id = $1 AND version = $4
                    "#,
                )
                .bind(id)
                .bind(parts.delivered_at)
                .bind(unit_id)
                .bind(to_i64(current)?)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("update_order", e))?;
                cas_outcome(result.rows_affected(), current + 1, "order", &order)?
            }
            ExpectedVersion::Any => {
                let row = sqlx::query(
                    r#"
                    INSERT INTO orders
                        (id, item_id, address, placed_at, due_at, delivered_at, unit_id, version)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
                    ON CONFLICT (id) DO UPDATE
                        SET delivered_at = EXCLUDED.delivered_at,
                            unit_id = EXCLUDED.unit_id,
                            version = orders.version + 1
                    RETURNING version
                    "#,
                )
                .bind(id)
                .bind(*parts.item_id.as_uuid())
                .bind(&parts.address)
                .bind(parts.placed_at)
                .bind(parts.due_at)
                .bind(parts.delivered_at)
                .bind(unit_id)
                .fetch_one(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("upsert_order", e))?;
                to_u64(row.try_get("version").map_err(decode_error)?)?
            }
        };

        Ok(order.with_version(version))
    }

    async fn fetch_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query("SELECT id, title, price, version FROM items WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_item", e))?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query("SELECT id, title, price, version FROM items ORDER BY created_seq ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;

        rows.iter().map(item_from_row).collect()
    }

    async fn insert_item(&self, item: Item) -> Result<Item, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO items (id, title, price, version)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(*item.id_typed().as_uuid())
        .bind(item.title())
        .bind(to_i64(item.price())?)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(format!(
                "item {} already exists",
                item.id_typed()
            )));
        }
        Ok(item.with_version(1))
    }
}

fn block_on<F: Future>(fut: F) -> Result<F::Output, StoreError> {
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Backend(
            "PostgresStorage requires a tokio runtime; call it from spawn_blocking".to_string(),
        )
    })?;
    Ok(handle.block_on(fut))
}

fn cas_outcome<A>(rows_affected: u64, new_version: u64, kind: &str, aggregate: &A) -> Result<u64, StoreError>
where
    A: AggregateRoot,
{
    if rows_affected == 0 {
        return Err(StoreError::Concurrency(format!(
            "{kind} {:?}: stored version is not {}",
            aggregate.id(),
            new_version - 1
        )));
    }
    Ok(new_version)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Duplicate(format!("{operation}: {}", db.message()));
        }
    }
    StoreError::Backend(format!("{operation}: {err}"))
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Decode(err.to_string())
}

fn to_u64(v: i64) -> Result<u64, StoreError> {
    u64::try_from(v).map_err(|_| StoreError::Decode(format!("negative value {v}")))
}

fn to_i64(v: u64) -> Result<i64, StoreError> {
    i64::try_from(v).map_err(|_| StoreError::Backend(format!("value {v} exceeds BIGINT")))
}

fn depot_from_row(row: &PgRow) -> Result<Depot, StoreError> {
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let latitude: f64 = row.try_get("latitude").map_err(decode_error)?;
    let longitude: f64 = row.try_get("longitude").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;

    let location =
        GeoPoint::new(latitude, longitude).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(Depot::new(DepotId::new(AggregateId::from_uuid(id)), location).with_version(to_u64(version)?))
}

fn unit_from_row(row: &PgRow) -> Result<Unit, StoreError> {
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let serial: Uuid = row.try_get("serial").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let depot_id: Uuid = row.try_get("depot_id").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;

    let status = UnitStatus::parse(&status)
        .ok_or_else(|| StoreError::Decode(format!("unknown unit status '{status}'")))?;
    Ok(Unit::restore(
        UnitId::new(AggregateId::from_uuid(id)),
        SerialNumber::from_uuid(serial),
        status,
        DepotId::new(AggregateId::from_uuid(depot_id)),
        to_u64(version)?,
    ))
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let item_id: Uuid = row.try_get("item_id").map_err(decode_error)?;
    let address: String = row.try_get("address").map_err(decode_error)?;
    let placed_at: DateTime<Utc> = row.try_get("placed_at").map_err(decode_error)?;
    let due_at: DateTime<Utc> = row.try_get("due_at").map_err(decode_error)?;
    let delivered_at: Option<DateTime<Utc>> = row.try_get("delivered_at").map_err(decode_error)?;
    let unit_id: Option<Uuid> = row.try_get("unit_id").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;

    Order::from_parts(OrderParts {
        id: OrderId::new(AggregateId::from_uuid(id)),
        item_id: ItemId::new(AggregateId::from_uuid(item_id)),
        address,
        placed_at,
        due_at,
        delivered_at,
        unit_id: unit_id.map(|u| UnitId::new(AggregateId::from_uuid(u))),
        version: to_u64(version)?,
    })
    .map_err(|e| StoreError::Decode(e.to_string()))
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let title: String = row.try_get("title").map_err(decode_error)?;
    let price: i64 = row.try_get("price").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;

    let version = to_u64(version)?;
    Item::new(ItemId::new(AggregateId::from_uuid(id)), title, to_u64(price)?)
        .map(|item| item.with_version(version))
        .map_err(|e| StoreError::Decode(e.to_string()))
}

impl DepotStore for PostgresStorage {
    fn list_all(&self) -> Result<Vec<Depot>, StoreError> {
        block_on(self.fetch_depots())?
    }

    fn count_units_for(&self, depot_id: DepotId) -> Result<u64, StoreError> {
        block_on(self.count_units(depot_id))?
    }

    fn insert(&self, depot: Depot) -> Result<Depot, StoreError> {
        block_on(self.insert_depot(depot))?
    }
}

impl UnitStore for PostgresStorage {
    fn find_by_id(&self, id: UnitId) -> Result<Option<Unit>, StoreError> {
        block_on(self.fetch_unit(id))?
    }

    fn save(&self, unit: Unit, expected: ExpectedVersion) -> Result<Unit, StoreError> {
        block_on(self.save_unit(unit, expected))?
    }

    fn list_all(&self) -> Result<Vec<Unit>, StoreError> {
        block_on(self.fetch_units())?
    }
}

impl OrderStore for PostgresStorage {
    fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        block_on(self.fetch_order(id))?
    }

    fn save(&self, order: Order, expected: ExpectedVersion) -> Result<Order, StoreError> {
        block_on(self.save_order(order, expected))?
    }

    fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        block_on(self.fetch_orders(false))?
    }

    fn list_pending_unassigned(&self) -> Result<Vec<Order>, StoreError> {
        block_on(self.fetch_orders(true))?
    }
}

impl ItemCatalog for PostgresStorage {
    fn find_by_id(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        block_on(self.fetch_item(id))?
    }

    fn list_all(&self) -> Result<Vec<Item>, StoreError> {
        block_on(self.fetch_items())?
    }

    fn insert(&self, item: Item) -> Result<Item, StoreError> {
        block_on(self.insert_item(item))?
    }
}

/// These run against a live database and are skipped unless `DATABASE_URL` is set.
#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    fn connect(rt: &tokio::runtime::Runtime) -> Option<PostgresStorage> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = rt.block_on(PostgresStorage::connect(&url)).unwrap();
        rt.block_on(store.ensure_schema()).unwrap();
        Some(store)
    }

    fn depot(store: &PostgresStorage) -> DepotId {
        let depot = Depot::new(DepotId::generate(), GeoPoint::new(55.41, 12.34).unwrap());
        DepotStore::insert(store, depot).unwrap().id_typed()
    }

    #[test]
    fn save_bumps_version_and_checks_expectation() {
        let rt = runtime();
        let Some(store) = connect(&rt) else { return };
        let _guard = rt.enter();

        let unit = Unit::provision(UnitId::generate(), depot(&store));
        let saved = UnitStore::save(&store, unit, ExpectedVersion::Exact(0)).unwrap();
        assert_eq!(saved.version(), 1);

        let stale = saved.clone();
        let mut fresh = saved;
        fresh.deactivate();
        let fresh = UnitStore::save(&store, fresh, ExpectedVersion::Exact(1)).unwrap();
        assert_eq!(fresh.version(), 2);

        let err = UnitStore::save(&store, stale, ExpectedVersion::Exact(1)).unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));

        let stored = UnitStore::find_by_id(&store, fresh.id_typed()).unwrap().unwrap();
        assert_eq!(stored.status(), UnitStatus::Inactive);
        assert_eq!(stored.version(), 2);
    }

    #[test]
    fn second_insert_of_same_record_is_a_concurrency_miss() {
        let rt = runtime();
        let Some(store) = connect(&rt) else { return };
        let _guard = rt.enter();

        let unit = Unit::provision(UnitId::generate(), depot(&store));
        UnitStore::save(&store, unit.clone(), ExpectedVersion::Exact(0)).unwrap();

        let err = UnitStore::save(&store, unit, ExpectedVersion::Exact(0)).unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    #[test]
    fn any_expectation_overwrites_and_bumps() {
        let rt = runtime();
        let Some(store) = connect(&rt) else { return };
        let _guard = rt.enter();

        let unit = Unit::provision(UnitId::generate(), depot(&store));
        let saved = UnitStore::save(&store, unit, ExpectedVersion::Exact(0)).unwrap();

        let mut retired = saved.clone();
        retired.retire();
        let retired = UnitStore::save(&store, retired, ExpectedVersion::Any).unwrap();
        assert_eq!(retired.version(), 2);

        let stored = UnitStore::find_by_id(&store, saved.id_typed()).unwrap().unwrap();
        assert_eq!(stored.status(), UnitStatus::Retired);
    }

    #[test]
    fn duplicate_serial_maps_to_duplicate() {
        let rt = runtime();
        let Some(store) = connect(&rt) else { return };
        let _guard = rt.enter();

        let depot_id = depot(&store);
        let serial = SerialNumber::generate();
        let a = Unit::restore(UnitId::generate(), serial, UnitStatus::Active, depot_id, 0);
        let b = Unit::restore(UnitId::generate(), serial, UnitStatus::Active, depot_id, 0);

        UnitStore::save(&store, a, ExpectedVersion::Exact(0)).unwrap();
        let err = UnitStore::save(&store, b, ExpectedVersion::Exact(0)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }
}
