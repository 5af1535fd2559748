use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::part::{Part, Skill};

#[async_trait]
pub trait PartCatalog: Send + Sync {
    /// Parts for the given ids. Unknown ids are simply absent from the result.
    async fn get_parts(&self, ids: &[i32]) -> Result<Vec<Part>>;

    async fn skill_map(&self, ids: &[i32]) -> Result<HashMap<i32, Skill>> {
        Ok(self
            .get_parts(ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.skill))
            .collect())
    }
}

#[derive(Clone)]
pub struct PgPartCatalog {
    pool: PgPool,
}

impl PgPartCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PartCatalog for PgPartCatalog {
    async fn get_parts(&self, ids: &[i32]) -> Result<Vec<Part>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let parts = sqlx::query_as::<_, Part>(
            "SELECT id, number, skill, name FROM parts WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(parts)
    }
}
