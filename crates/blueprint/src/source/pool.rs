//! PostgreSQL connection pool.

use crate::error::{BlueprintError, BlueprintResult};
use crate::source::{ConnectionConfig, Driver};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

/// Create a deadpool pool from a PostgreSQL [`ConnectionConfig`].
///
/// Connections are opened lazily, so this never touches the network. Wrap a
/// checked-out client in [`PgSource`](crate::source::PgSource) to run statements.
///
/// ```ignore
/// let pool = blueprint::source::create_pool(&config)?;
/// let source = PgSource::new(pool.get().await?);
/// ```
pub fn create_pool(config: &ConnectionConfig) -> BlueprintResult<Pool> {
    config.validate()?;
    if config.driver != Driver::Postgres {
        return Err(BlueprintError::configuration(format!(
            "cannot create a PostgreSQL pool for driver '{}'",
            config.driver
        )));
    }

    let mut pg_config = tokio_postgres::Config::new();
    pg_config
        .host(&config.host)
        .port(config.port())
        .dbname(&config.database)
        .user(&config.user)
        .password(&config.password);

    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, manager_config);
    Pool::builder(mgr)
        .max_size(config.max_pool_size)
        .build()
        .map_err(|e| BlueprintError::Pool(e.to_string()))
}
