//! PostgreSQL-backed store.

use crate::error::StoreError;
use crate::store::EndpointStore;
use async_trait::async_trait;
use endpointd_protocol::Endpoint;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

const SELECT_ALL: &str =
    "SELECT id, organization_id, url, COALESCE(schema, '') AS schema FROM endpoints";

const SELECT_BY_ID: &str = "SELECT id, organization_id, url, COALESCE(schema, '') AS schema \
     FROM endpoints WHERE id = $1 LIMIT 1";

const INSERT: &str = "INSERT INTO endpoints (organization_id, url) VALUES ($1, $2) \
     RETURNING id, organization_id, url, COALESCE(schema, '') AS schema";

#[derive(Debug, sqlx::FromRow)]
struct EndpointRow {
    id: String,
    organization_id: String,
    url: String,
    schema: String,
}

impl From<EndpointRow> for Endpoint {
    fn from(row: EndpointRow) -> Self {
        Endpoint::new(row.id, row.organization_id, row.url).with_schema(row.schema)
    }
}

/// Store backed by the `endpoints` table.
#[derive(Debug, Clone)]
pub struct PgEndpointStore {
    pool: PgPool,
}

impl PgEndpointStore {
    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Creates the `endpoints` table if it does not exist.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl EndpointStore for PgEndpointStore {
    async fn list_all(&self) -> Result<Vec<Endpoint>, StoreError> {
        self.check_open()?;
        let rows = sqlx::query_as::<_, EndpointRow>(SELECT_ALL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Endpoint::from).collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Endpoint, StoreError> {
        self.check_open()?;
        let row = sqlx::query_as::<_, EndpointRow>(SELECT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => row.into(),
            None => Endpoint::not_found(id),
        })
    }

    async fn create(&self, organization_id: &str, url: &str) -> Result<Endpoint, StoreError> {
        self.check_open()?;
        let row = sqlx::query_as::<_, EndpointRow>(INSERT)
            .bind(organization_id)
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        tracing::debug!("Created endpoint {} for {}", row.id, row.organization_id);
        Ok(row.into())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_open()?;
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
