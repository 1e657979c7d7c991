//! Lookups against `settings_endpoints`, the table of service base URLs the
//! Manager dispatches to and hands to the Agent for its callback.

use sqlx::PgPool;

use crate::DbError;

/// Returns the endpoint URL stored under `id`, trailing `/` removed.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn fetch_endpoint(pool: &PgPool, id: i32) -> Result<String, DbError> {
    let value = sqlx::query_scalar::<_, String>(
        "SELECT endpoint_value FROM settings_endpoints WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(value.trim_end_matches('/').to_string())
}

/// Inserts or replaces the endpoint stored under `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_endpoint(pool: &PgPool, id: i32, value: &str) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO settings_endpoints (id, endpoint_value) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET endpoint_value = EXCLUDED.endpoint_value",
    )
    .bind(id)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
