//! Postgres-backed inventory store.
//!
//! ## Concurrency control
//!
//! `commit_order` runs in one transaction and takes row locks on every ordered
//! drink with `SELECT ... FOR UPDATE`, always in ascending id order so two
//! commits over overlapping drinks cannot deadlock each other. The stock check
//! runs against the locked rows, and the decrement is additionally guarded by
//! `WHERE inventory >= $n`. Bottles drawn from are locked the same way.
//!
//! ## Error mapping
//!
//! | SQLx error | Postgres code | StoreError |
//! |------------|---------------|------------|
//! | Database | `40001` serialization failure | `Transient` |
//! | Database | `40P01` deadlock detected | `Transient` |
//! | Database | `55P03` lock not available | `Transient` |
//! | Database | `57014` query canceled (statement timeout) | `Transient` |
//! | Database | `53300` too many connections | `Transient` |
//! | Database | class `08` connection exception | `Transient` |
//! | Database | any other | `Internal` |
//! | Io / Tls / PoolTimedOut / PoolClosed / WorkerCrashed | N/A | `Transient` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Internal` |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use pourline_core::{DrinkId, OrderId, PourInventoryId, PourSizeId, TaxCategoryId};
use pourline_events::StockLevel;
use pourline_inventory::{
    Drink, PourInventory, PourSize, PourTransaction, Recipe, RecipeComponent, ServingKind, TaxCategory,
};
use pourline_sales::{Order, OrderItem, OrderLine, OrderStatus};
use pourline_tax::CatalogSnapshot;

use super::plan::{self, ManualPourRows, StockCheck};
use super::{CommitOutcome, CommittedOrder, InventoryStore, PourOutcome, PourRequest, StoreError};
use crate::seed::CatalogSeed;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tax_categories (
        id   UUID PRIMARY KEY,
        name TEXT NOT NULL,
        rate NUMERIC(7, 4) NOT NULL CHECK (rate >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS drinks (
        id              UUID PRIMARY KEY,
        name            TEXT NOT NULL,
        category        TEXT NOT NULL,
        subcategory     TEXT NULL,
        price           BIGINT NOT NULL CHECK (price >= 0),
        inventory       BIGINT NOT NULL CHECK (inventory >= 0),
        sales           BIGINT NOT NULL DEFAULT 0,
        serving         TEXT NOT NULL CHECK (serving IN ('packaged', 'pour', 'cocktail')),
        tax_category_id UUID NULL REFERENCES tax_categories (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS recipe_components (
        drink_id      UUID NOT NULL REFERENCES drinks (id),
        ingredient_id UUID NOT NULL REFERENCES drinks (id),
        position      INTEGER NOT NULL,
        quantity      NUMERIC(10, 3) NOT NULL CHECK (quantity > 0),
        PRIMARY KEY (drink_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pour_sizes (
        id         UUID PRIMARY KEY,
        name       TEXT NOT NULL,
        volume_oz  NUMERIC(10, 3) NOT NULL CHECK (volume_oz > 0),
        is_default BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS pour_sizes_one_default
        ON pour_sizes (is_default) WHERE is_default
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pour_inventory (
        id               UUID PRIMARY KEY,
        drink_id         UUID NOT NULL REFERENCES drinks (id),
        bottle_id        TEXT NOT NULL,
        initial_volume   NUMERIC(10, 3) NOT NULL CHECK (initial_volume > 0),
        remaining_volume NUMERIC(10, 3) NOT NULL CHECK (remaining_volume >= 0),
        active           BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id           UUID PRIMARY KEY,
        status       TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed')),
        subtotal     BIGINT NOT NULL,
        tax          BIGINT NOT NULL,
        total        BIGINT NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL,
        completed_at TIMESTAMPTZ NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        order_id   UUID NOT NULL REFERENCES orders (id),
        line_no    INTEGER NOT NULL,
        drink_id   UUID NOT NULL REFERENCES drinks (id),
        name       TEXT NOT NULL,
        unit_price BIGINT NOT NULL,
        quantity   BIGINT NOT NULL CHECK (quantity > 0),
        PRIMARY KEY (order_id, line_no)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pour_transactions (
        id                UUID PRIMARY KEY,
        pour_inventory_id UUID NULL REFERENCES pour_inventory (id),
        drink_id          UUID NOT NULL REFERENCES drinks (id),
        pour_size_id      UUID NULL REFERENCES pour_sizes (id),
        volume_oz         NUMERIC(10, 3) NOT NULL,
        tax_amount        NUMERIC(20, 6) NOT NULL,
        order_id          UUID NULL REFERENCES orders (id),
        staff_id          UUID NULL,
        created_at        TIMESTAMPTZ NOT NULL
    )
    "#,
];

const DRINK_COLUMNS: &str =
    "id, name, category, subcategory, price, inventory, sales, serving, tax_category_id";

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect a pool of at most `max_connections`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables that do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    /// Insert the seed rows, skipping any that already exist.
    #[instrument(skip(self, seed), fields(drinks = seed.drinks.len()), err)]
    pub async fn load_seed(&self, seed: &CatalogSeed) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        for c in &seed.tax_categories {
            sqlx::query("INSERT INTO tax_categories (id, name, rate) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING")
                .bind(c.id.as_uuid())
                .bind(&c.name)
                .bind(c.rate)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("seed_tax_category", e))?;
        }
        for s in &seed.pour_sizes {
            sqlx::query(
                "INSERT INTO pour_sizes (id, name, volume_oz, is_default) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
            )
            .bind(s.id.as_uuid())
            .bind(&s.name)
            .bind(s.volume_oz)
            .bind(s.is_default)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_pour_size", e))?;
        }
        for d in &seed.drinks {
            sqlx::query(&format!(
                "INSERT INTO drinks ({DRINK_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) ON CONFLICT (id) DO NOTHING"
            ))
            .bind(d.id.as_uuid())
            .bind(&d.name)
            .bind(&d.category)
            .bind(&d.subcategory)
            .bind(d.price)
            .bind(d.inventory)
            .bind(d.sales)
            .bind(d.serving.as_str())
            .bind(d.tax_category_id.map(Uuid::from))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_drink", e))?;
        }
        for r in &seed.recipes {
            for (position, component) in r.components.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO recipe_components (drink_id, ingredient_id, position, quantity) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
                )
                .bind(r.drink_id.as_uuid())
                .bind(component.ingredient_id.as_uuid())
                .bind(position as i32)
                .bind(component.quantity)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("seed_recipe", e))?;
            }
        }
        for b in &seed.bottles {
            sqlx::query(
                "INSERT INTO pour_inventory (id, drink_id, bottle_id, initial_volume, remaining_volume, active) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING",
            )
            .bind(b.id.as_uuid())
            .bind(b.drink_id.as_uuid())
            .bind(&b.bottle_id)
            .bind(b.initial_volume)
            .bind(b.remaining_volume)
            .bind(b.active)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_bottle", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    /// Everything the tax calculator needs for `drinks`, read inside `tx`.
    async fn load_catalog(
        tx: &mut Transaction<'_, Postgres>,
        drinks: &HashMap<DrinkId, Drink>,
    ) -> Result<CatalogSnapshot, StoreError> {
        let mut catalog = CatalogSnapshot {
            drinks: drinks.clone(),
            ..CatalogSnapshot::default()
        };

        let cocktail_ids: Vec<Uuid> = drinks
            .values()
            .filter(|d| d.serving == ServingKind::Cocktail)
            .map(|d| *d.id.as_uuid())
            .collect();
        if !cocktail_ids.is_empty() {
            let rows = sqlx::query(
                r#"
                SELECT drink_id, ingredient_id, quantity
                FROM recipe_components
                WHERE drink_id = ANY($1)
                ORDER BY drink_id, position
                "#,
            )
            .bind(&cocktail_ids)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("load_recipes", e))?;

            for row in rows {
                let drink_id = DrinkId::from_uuid(row.try_get("drink_id").map_err(row_error)?);
                let component = RecipeComponent {
                    ingredient_id: DrinkId::from_uuid(row.try_get("ingredient_id").map_err(row_error)?),
                    quantity: row.try_get("quantity").map_err(row_error)?,
                };
                catalog
                    .recipes
                    .entry(drink_id)
                    .or_insert_with(|| Recipe { drink_id, components: Vec::new() })
                    .components
                    .push(component);
            }

            let ingredient_ids: Vec<Uuid> = catalog
                .recipes
                .values()
                .flat_map(|r| r.components.iter().map(|c| *c.ingredient_id.as_uuid()))
                .filter(|id| !catalog.drinks.contains_key(&DrinkId::from_uuid(*id)))
                .collect();
            if !ingredient_ids.is_empty() {
                let rows = sqlx::query(&format!("SELECT {DRINK_COLUMNS} FROM drinks WHERE id = ANY($1)"))
                    .bind(&ingredient_ids)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| map_sqlx_error("load_ingredients", e))?;
                for row in rows {
                    let drink = DrinkRow::from_row(&row).map_err(row_error)?.into_drink()?;
                    catalog.drinks.insert(drink.id, drink);
                }
            }
        }

        let category_ids: Vec<Uuid> = catalog
            .drinks
            .values()
            .filter_map(|d| d.tax_category_id.map(Uuid::from))
            .collect();
        if !category_ids.is_empty() {
            let rows = sqlx::query("SELECT id, name, rate FROM tax_categories WHERE id = ANY($1)")
                .bind(&category_ids)
                .fetch_all(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("load_tax_categories", e))?;
            for row in rows {
                let category = tax_category_from_row(&row)?;
                catalog.tax_categories.insert(category.id, category);
            }
        }

        catalog.default_pour_size = Self::default_pour_size(tx).await?;
        Ok(catalog)
    }

    async fn default_pour_size(tx: &mut Transaction<'_, Postgres>) -> Result<Option<PourSize>, StoreError> {
        let row = sqlx::query("SELECT id, name, volume_oz, is_default FROM pour_sizes WHERE is_default LIMIT 1")
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("load_default_pour_size", e))?;
        row.as_ref().map(pour_size_from_row).transpose()
    }

    async fn insert_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, status, subtotal, tax, total, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.subtotal)
        .bind(order.tax)
        .bind(order.total)
        .bind(order.created_at)
        .bind(order.completed_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, drink_id, name, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(line_no as i32 + 1)
            .bind(item.drink_id.as_uuid())
            .bind(&item.name)
            .bind(item.unit_price)
            .bind(item.quantity)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }
        Ok(())
    }

    async fn insert_pour(tx: &mut Transaction<'_, Postgres>, pour: &PourTransaction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pour_transactions (
                id, pour_inventory_id, drink_id, pour_size_id, volume_oz,
                tax_amount, order_id, staff_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(pour.id.as_uuid())
        .bind(pour.pour_inventory_id.map(Uuid::from))
        .bind(pour.drink_id.as_uuid())
        .bind(pour.pour_size_id.map(Uuid::from))
        .bind(pour.volume_oz)
        .bind(pour.tax_amount)
        .bind(pour.order_id.map(Uuid::from))
        .bind(pour.staff_id.map(Uuid::from))
        .bind(pour.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_pour_transaction", e))?;
        Ok(())
    }

    async fn update_bottle(tx: &mut Transaction<'_, Postgres>, bottle: &PourInventory) -> Result<(), StoreError> {
        sqlx::query("UPDATE pour_inventory SET remaining_volume = $2, active = $3 WHERE id = $1")
            .bind(bottle.id.as_uuid())
            .bind(bottle.remaining_volume)
            .bind(bottle.active)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("update_bottle", e))?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self), err)]
    async fn list_drinks(&self) -> Result<Vec<Drink>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {DRINK_COLUMNS} FROM drinks ORDER BY category, name"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_drinks", e))?;
        rows.iter()
            .map(|row| DrinkRow::from_row(row).map_err(row_error)?.into_drink())
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn list_pour_sizes(&self) -> Result<Vec<PourSize>, StoreError> {
        let rows = sqlx::query("SELECT id, name, volume_oz, is_default FROM pour_sizes ORDER BY volume_oz")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_pour_sizes", e))?;
        rows.iter().map(pour_size_from_row).collect()
    }

    #[instrument(skip(self, drink_ids), fields(drink_count = drink_ids.len()), err)]
    async fn load_tax_catalog(&self, drink_ids: &[DrinkId]) -> Result<CatalogSnapshot, StoreError> {
        let mut tx = self.begin().await?;

        let ids: Vec<Uuid> = drink_ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!("SELECT {DRINK_COLUMNS} FROM drinks WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_drinks", e))?;

        let mut drinks = HashMap::with_capacity(rows.len());
        for row in &rows {
            let drink = DrinkRow::from_row(row).map_err(row_error)?.into_drink()?;
            drinks.insert(drink.id, drink);
        }

        let catalog = Self::load_catalog(&mut tx, &drinks).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(catalog)
    }

    #[instrument(
        skip(self, lines),
        fields(
            order_id = %order_id,
            line_count = lines.len(),
            insufficient = tracing::field::Empty,
            pour_count = tracing::field::Empty,
        ),
        err
    )]
    async fn commit_order(
        &self,
        order_id: OrderId,
        lines: &[OrderLine],
        at: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        let span = Span::current();
        let mut tx = self.begin().await?;

        // Lock ordered drinks in id order.
        let ids: Vec<Uuid> = lines.iter().map(|l| *l.drink_id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {DRINK_COLUMNS} FROM drinks WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_drinks", e))?;

        let mut drinks = HashMap::with_capacity(rows.len());
        for row in &rows {
            let drink = DrinkRow::from_row(row).map_err(row_error)?.into_drink()?;
            drinks.insert(drink.id, drink);
        }

        match plan::check_stock(lines, &drinks) {
            StockCheck::Available => {}
            StockCheck::Unknown(ids) => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Ok(CommitOutcome::UnknownDrinks(ids));
            }
            StockCheck::Insufficient(items) => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                span.record("insufficient", items.len());
                return Ok(CommitOutcome::Insufficient(items));
            }
        }

        let catalog = Self::load_catalog(&mut tx, &drinks).await?;
        let (order, breakdown) = plan::build_order(order_id, lines, &catalog, at)?;

        let mut stock = Vec::with_capacity(lines.len());
        for line in lines {
            let row = sqlx::query(
                r#"
                UPDATE drinks
                SET inventory = inventory - $2, sales = sales + $2
                WHERE id = $1 AND inventory >= $2
                RETURNING id, name, inventory, sales
                "#,
            )
            .bind(line.drink_id.as_uuid())
            .bind(line.quantity)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("decrement_inventory", e))?;

            let Some(row) = row else {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::Internal(format!(
                    "inventory of locked drink {} changed during commit",
                    line.drink_id
                )));
            };
            stock.push(StockLevel {
                drink_id: DrinkId::from_uuid(row.try_get("id").map_err(row_error)?),
                name: row.try_get("name").map_err(row_error)?,
                inventory: row.try_get("inventory").map_err(row_error)?,
                sales: row.try_get("sales").map_err(row_error)?,
            });
        }

        Self::insert_order(&mut tx, &order).await?;

        let poured: Vec<Uuid> = breakdown.pours.iter().map(|p| *p.drink_id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, drink_id, bottle_id, initial_volume, remaining_volume, active
            FROM pour_inventory
            WHERE drink_id = ANY($1) AND active
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&poured)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_bottles", e))?;
        let mut bottles = rows.iter().map(bottle_from_row).collect::<Result<Vec<_>, _>>()?;
        let before: HashMap<PourInventoryId, Decimal> =
            bottles.iter().map(|b| (b.id, b.remaining_volume)).collect();

        let pours = plan::bind_pours(&breakdown.pours, &mut bottles, order_id, at);
        for bottle in bottles.iter().filter(|b| before.get(&b.id) != Some(&b.remaining_volume)) {
            Self::update_bottle(&mut tx, bottle).await?;
        }
        for pour in &pours {
            Self::insert_pour(&mut tx, pour).await?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;

        span.record("pour_count", pours.len());
        Ok(CommitOutcome::Committed(CommittedOrder { order, stock, pours }))
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    async fn complete_order(&self, order_id: OrderId, at: DateTime<Utc>) -> Result<Order, StoreError> {
        let updated = sqlx::query(
            "UPDATE orders SET status = 'completed', completed_at = $2 WHERE id = $1 AND status = 'pending'",
        )
        .bind(order_id.as_uuid())
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("complete_order", e))?;

        let order = self
            .get_order(order_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        if updated.rows_affected() == 0 && order.status != OrderStatus::Completed {
            return Err(StoreError::Internal(format!(
                "order {order_id} is {} and cannot be completed",
                order.status.as_str()
            )));
        }
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let Some(row) = sqlx::query(
            "SELECT id, status, subtotal, tax, total, created_at, completed_at FROM orders WHERE id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_order", e))?
        else {
            return Ok(None);
        };

        let items = sqlx::query(
            "SELECT drink_id, name, unit_price, quantity FROM order_items WHERE order_id = $1 ORDER BY line_no",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_order_items", e))?
        .iter()
        .map(|r| {
            Ok(OrderItem {
                drink_id: DrinkId::from_uuid(r.try_get("drink_id").map_err(row_error)?),
                name: r.try_get("name").map_err(row_error)?,
                unit_price: r.try_get("unit_price").map_err(row_error)?,
                quantity: r.try_get("quantity").map_err(row_error)?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

        let status: String = row.try_get("status").map_err(row_error)?;
        Ok(Some(Order {
            id: OrderId::from_uuid(row.try_get("id").map_err(row_error)?),
            status: OrderStatus::parse(&status)
                .ok_or_else(|| StoreError::Internal(format!("unknown order status '{status}'")))?,
            items,
            subtotal: row.try_get("subtotal").map_err(row_error)?,
            tax: row.try_get("tax").map_err(row_error)?,
            total: row.try_get("total").map_err(row_error)?,
            created_at: row.try_get("created_at").map_err(row_error)?,
            completed_at: row.try_get("completed_at").map_err(row_error)?,
        }))
    }

    #[instrument(
        skip(self, request),
        fields(bottle = %request.pour_inventory_id, pour_size = %request.pour_size_id),
        err
    )]
    async fn record_pour(&self, request: PourRequest, at: DateTime<Utc>) -> Result<PourOutcome, StoreError> {
        let mut tx = self.begin().await?;

        let bottle = sqlx::query(
            r#"
            SELECT id, drink_id, bottle_id, initial_volume, remaining_volume, active
            FROM pour_inventory
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(request.pour_inventory_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_bottle", e))?
        .as_ref()
        .map(bottle_from_row)
        .transpose()?;

        let size = sqlx::query("SELECT id, name, volume_oz, is_default FROM pour_sizes WHERE id = $1")
            .bind(request.pour_size_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_pour_size", e))?
            .as_ref()
            .map(pour_size_from_row)
            .transpose()?;

        let mut rows = ManualPourRows {
            bottle,
            size,
            default_size: Self::default_pour_size(&mut tx).await?,
            ..ManualPourRows::default()
        };

        if let Some(drink_id) = rows.bottle.as_ref().map(|b| b.drink_id) {
            let row = sqlx::query(
                r#"
                SELECT d.id, d.name, d.category, d.subcategory, d.price, d.inventory, d.sales,
                       d.serving, d.tax_category_id, COALESCE(t.rate, 0) AS rate
                FROM drinks d
                LEFT JOIN tax_categories t ON t.id = d.tax_category_id
                WHERE d.id = $1
                "#,
            )
            .bind(drink_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_bottle_drink", e))?;
            if let Some(row) = row {
                rows.rate = row.try_get("rate").map_err(row_error)?;
                rows.drink = Some(DrinkRow::from_row(&row).map_err(row_error)?.into_drink()?);
            }
        }

        let outcome = plan::plan_manual_pour(request, rows, at)?;
        match &outcome {
            PourOutcome::Recorded { transaction, bottle } => {
                Self::update_bottle(&mut tx, bottle).await?;
                Self::insert_pour(&mut tx, transaction).await?;
                tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
            }
            PourOutcome::Refused(_) => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            }
        }
        Ok(outcome)
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some(code) if is_transient_code(code) => StoreError::Transient(msg),
                _ => StoreError::Internal(msg),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            StoreError::Transient(format!("connection failure in {}: {}", operation, err))
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {}", operation)),
        _ => StoreError::Internal(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Postgres SQLSTATEs after which retrying the whole transaction is safe.
fn is_transient_code(code: &str) -> bool {
    matches!(code, "40001" | "40P01" | "55P03" | "57014" | "53300") || code.starts_with("08")
}

fn row_error(err: sqlx::Error) -> StoreError {
    StoreError::Internal(format!("failed to decode row: {}", err))
}

// SQLx row types

#[derive(Debug)]
struct DrinkRow {
    id: Uuid,
    name: String,
    category: String,
    subcategory: Option<String>,
    price: i64,
    inventory: i64,
    sales: i64,
    serving: String,
    tax_category_id: Option<Uuid>,
}

impl<'r> FromRow<'r, PgRow> for DrinkRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(DrinkRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            subcategory: row.try_get("subcategory")?,
            price: row.try_get("price")?,
            inventory: row.try_get("inventory")?,
            sales: row.try_get("sales")?,
            serving: row.try_get("serving")?,
            tax_category_id: row.try_get("tax_category_id")?,
        })
    }
}

impl DrinkRow {
    fn into_drink(self) -> Result<Drink, StoreError> {
        let serving = ServingKind::parse(&self.serving)
            .ok_or_else(|| StoreError::Internal(format!("unknown serving kind '{}'", self.serving)))?;
        Ok(Drink {
            id: DrinkId::from_uuid(self.id),
            name: self.name,
            category: self.category,
            subcategory: self.subcategory,
            price: self.price,
            inventory: self.inventory,
            sales: self.sales,
            serving,
            tax_category_id: self.tax_category_id.map(TaxCategoryId::from_uuid),
        })
    }
}

fn tax_category_from_row(row: &PgRow) -> Result<TaxCategory, StoreError> {
    Ok(TaxCategory {
        id: TaxCategoryId::from_uuid(row.try_get("id").map_err(row_error)?),
        name: row.try_get("name").map_err(row_error)?,
        rate: row.try_get("rate").map_err(row_error)?,
    })
}

fn pour_size_from_row(row: &PgRow) -> Result<PourSize, StoreError> {
    Ok(PourSize {
        id: PourSizeId::from_uuid(row.try_get("id").map_err(row_error)?),
        name: row.try_get("name").map_err(row_error)?,
        volume_oz: row.try_get("volume_oz").map_err(row_error)?,
        is_default: row.try_get("is_default").map_err(row_error)?,
    })
}

fn bottle_from_row(row: &PgRow) -> Result<PourInventory, StoreError> {
    Ok(PourInventory {
        id: PourInventoryId::from_uuid(row.try_get("id").map_err(row_error)?),
        drink_id: DrinkId::from_uuid(row.try_get("drink_id").map_err(row_error)?),
        bottle_id: row.try_get("bottle_id").map_err(row_error)?,
        initial_volume: row.try_get("initial_volume").map_err(row_error)?,
        remaining_volume: row.try_get("remaining_volume").map_err(row_error)?,
        active: row.try_get("active").map_err(row_error)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failures_are_transient() {
        let io = sqlx::Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
        assert!(map_sqlx_error("commit_order", io).is_transient());
        assert!(map_sqlx_error("commit_order", sqlx::Error::PoolTimedOut).is_transient());
        assert!(map_sqlx_error("commit_order", sqlx::Error::PoolClosed).is_transient());
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        match map_sqlx_error("get_order", sqlx::Error::RowNotFound) {
            StoreError::NotFound(msg) if msg.contains("get_order") => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn serialization_and_deadlock_codes_are_transient() {
        for code in ["40001", "40P01", "55P03", "57014", "53300", "08006", "08003"] {
            assert!(is_transient_code(code), "{code}");
        }
        for code in ["23505", "23503", "23514", "42P01"] {
            assert!(!is_transient_code(code), "{code}");
        }
    }

    #[test]
    fn drink_row_rejects_unknown_serving_kind() {
        let row = DrinkRow {
            id: Uuid::now_v7(),
            name: "Cola".into(),
            category: "soft".into(),
            subcategory: None,
            price: 250,
            inventory: 10,
            sales: 0,
            serving: "fountain".into(),
            tax_category_id: None,
        };
        assert!(matches!(row.into_drink(), Err(StoreError::Internal(_))));
    }

    // The tests below need a scratch Postgres database:
    // DATABASE_URL=postgres://... cargo test -p pourline-infra -- --ignored
    use crate::seed::demo_catalog;

    async fn seeded_store() -> (Arc<PostgresInventoryStore>, CatalogSeed) {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
        let store = PostgresInventoryStore::connect(&url, 8).await.unwrap();
        store.ensure_schema().await.unwrap();
        // Fresh ids on every run, so runs never share drink rows.
        let seed = demo_catalog().unwrap();
        store.load_seed(&seed).await.unwrap();
        (Arc::new(store), seed)
    }

    async fn inventory_of(store: &PostgresInventoryStore, id: DrinkId) -> i64 {
        store.list_drinks().await.unwrap().into_iter().find(|d| d.id == id).unwrap().inventory
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_commits_on_one_drink_never_oversell() {
        let (store, seed) = seeded_store().await;
        let bourbon = seed.drink_named("Bourbon").unwrap().id;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .commit_order(OrderId::new(), &[OrderLine { drink_id: bourbon, quantity: 20 }], Utc::now())
                        .await
                })
            })
            .collect();

        let mut committed = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                CommitOutcome::Committed(_) => committed += 1,
                CommitOutcome::Insufficient(items) => {
                    assert_eq!((items[0].requested, items[0].available), (20, 10));
                    insufficient += 1;
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!((committed, insufficient), (1, 1));
        assert_eq!(inventory_of(&store, bourbon).await, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires DATABASE_URL"]
    async fn opposite_line_orders_do_not_deadlock() {
        let (store, seed) = seeded_store().await;
        let rum = seed.drink_named("White Rum").unwrap().id;
        let bourbon = seed.drink_named("Bourbon").unwrap().id;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let mut lines =
                    vec![OrderLine { drink_id: rum, quantity: 1 }, OrderLine { drink_id: bourbon, quantity: 1 }];
                if i % 2 == 1 {
                    lines.reverse();
                }
                tokio::spawn(async move { store.commit_order(OrderId::new(), &lines, Utc::now()).await })
            })
            .collect();

        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Ok(CommitOutcome::Committed(_))));
        }
        assert_eq!(inventory_of(&store, rum).await, 40 - 8);
        assert_eq!(inventory_of(&store, bourbon).await, 30 - 8);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn committed_order_is_stored_pending_until_completed() {
        let (store, seed) = seeded_store().await;
        let mojito = seed.drink_named("Mojito").unwrap().id;
        let order_id = OrderId::new();

        let outcome = store
            .commit_order(order_id, &[OrderLine { drink_id: mojito, quantity: 2 }], Utc::now())
            .await
            .unwrap();
        let CommitOutcome::Committed(committed) = outcome else {
            panic!("expected a committed order");
        };
        assert_eq!(committed.pours.len(), 2);

        let stored = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        let completed = store.complete_order(order_id, Utc::now()).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
        assert_eq!(inventory_of(&store, mojito).await, 25 - 2);
    }
}
