use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::articles::dto::ArticleRequest;

/// The public projection of an article row. The `is_deleted` column stays in
/// the database: every query below filters on it, none selects it, and
/// soft-deleted rows are never physically removed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn insert(db: &PgPool, req: &ArticleRequest) -> Result<Article, sqlx::Error> {
    sqlx::query_as::<_, Article>(
        r#"
        INSERT INTO articles (name, description, price, stock, is_active)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, description, price, stock, is_active, created_at
        "#,
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.stock)
    .bind(req.is_active)
    .fetch_one(db)
    .await
}

pub async fn list_active(db: &PgPool) -> Result<Vec<Article>, sqlx::Error> {
    sqlx::query_as::<_, Article>(
        r#"
        SELECT id, name, description, price, stock, is_active, created_at
        FROM articles
        WHERE is_deleted = FALSE
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn find_active(db: &PgPool, id: i32) -> Result<Option<Article>, sqlx::Error> {
    sqlx::query_as::<_, Article>(
        r#"
        SELECT id, name, description, price, stock, is_active, created_at
        FROM articles
        WHERE id = $1 AND is_deleted = FALSE
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Overwrites all five mutable fields unconditionally. The `is_deleted = FALSE`
/// predicate makes the fetch-check-write a single conditional statement, so a
/// concurrent soft delete cannot resurrect or partially update the row.
pub async fn update_active(db: &PgPool, id: i32, req: &ArticleRequest) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE articles
        SET name = $2, description = $3, price = $4, stock = $5, is_active = $6
        WHERE id = $1 AND is_deleted = FALSE
        "#,
    )
    .bind(id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.stock)
    .bind(req.is_active)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Flips the soft-delete flag. Conditional on the row still being live, so a
/// second delete of the same id reports not-found instead of succeeding twice.
pub async fn soft_delete(db: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE articles
        SET is_deleted = TRUE
        WHERE id = $1 AND is_deleted = FALSE
        "#,
    )
    .bind(id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article() -> Article {
        Article {
            id: 1,
            name: "Pen".into(),
            description: Some("Blue ballpoint".into()),
            price: Decimal::new(150, 2),
            stock: 100,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn projection_never_exposes_is_deleted() {
        let json = serde_json::to_string(&sample_article()).unwrap();
        assert!(!json.contains("isDeleted"));
        assert!(!json.contains("is_deleted"));
    }

    #[test]
    fn serialization_uses_camel_case_fields() {
        let json = serde_json::to_string(&sample_article()).unwrap();
        assert!(json.contains("\"isActive\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"price\":\"1.50\""));
    }
}
