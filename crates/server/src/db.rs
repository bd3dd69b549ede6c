//! Database connection pool management.

use anyhow::{Context, Result};
use sea_query::{Value, Values};
use sqlx::Arguments;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};

use crate::config::Config;

/// Create a PostgreSQL connection pool.
///
/// A request that cannot obtain a connection within the configured acquire
/// timeout fails instead of queueing indefinitely.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.database_acquire_timeout)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Apply pending schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    Ok(())
}

/// Check if the database connection is healthy.
pub async fn check_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Convert the values collected by a sea-query statement into positional
/// PostgreSQL arguments, in order.
pub fn pg_arguments(values: &Values) -> Result<PgArguments> {
    let mut args = PgArguments::default();

    for value in &values.0 {
        let added = match value {
            Value::Bool(v) => args.add(*v),
            Value::TinyInt(v) => args.add(v.map(i16::from)),
            Value::SmallInt(v) => args.add(*v),
            Value::Int(v) => args.add(*v),
            Value::BigInt(v) => args.add(*v),
            Value::TinyUnsigned(v) => args.add(v.map(i16::from)),
            Value::SmallUnsigned(v) => args.add(v.map(i32::from)),
            Value::Unsigned(v) => args.add(v.map(i64::from)),
            Value::BigUnsigned(v) => {
                let v = v
                    .map(i64::try_from)
                    .transpose()
                    .context("unsigned query value out of range")?;
                args.add(v)
            }
            Value::Float(v) => args.add(*v),
            Value::Double(v) => args.add(*v),
            Value::String(v) => args.add(v.as_deref().cloned()),
            Value::Char(v) => args.add(v.map(|c| c.to_string())),
            Value::Bytes(v) => args.add(v.as_deref().cloned()),
            #[allow(unreachable_patterns)]
            other => anyhow::bail!("unsupported query value: {other:?}"),
        };
        added.map_err(|e| anyhow::anyhow!("failed to bind query value: {e}"))?;
    }

    Ok(args)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn binds_every_value_in_order() {
        let values = Values(vec![
            Value::Bool(Some(true)),
            Value::String(Some(Box::new("anillos".to_string()))),
            Value::BigUnsigned(Some(50)),
            Value::BigUnsigned(Some(0)),
        ]);

        let args = pg_arguments(&values).unwrap();
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn rejects_unsigned_overflow() {
        let values = Values(vec![Value::BigUnsigned(Some(u64::MAX))]);
        assert!(pg_arguments(&values).is_err());
    }
}
