use crate::cli::ConfigCheckArgs;
use anyhow::Context;
use blueprint::query::Bindings;
use blueprint::source::{PgSource, Source};
use blueprint::{ConnectionConfig, Driver};

pub async fn run(args: ConfigCheckArgs) -> anyhow::Result<()> {
    // Values referenced as ${VAR} may live in a local .env file.
    dotenvy::dotenv().ok();

    let config = ConnectionConfig::load(&args.config)
        .with_context(|| format!("config check failed for {}", args.config.display()))?;
    println!("{}", summary(&config)?);

    if args.connect {
        ping(&config).await?;
        println!("connection: ok");
    }
    Ok(())
}

pub fn summary(config: &ConnectionConfig) -> anyhow::Result<String> {
    let timeout = match config.query_timeout() {
        Some(t) => format!("{}ms", t.as_millis()),
        None => "none".to_string(),
    };
    Ok(format!(
        "driver: {}\nurl: {}\nmax_pool_size: {}\nquery_timeout: {timeout}",
        config.driver,
        config.redacted_url()?,
        config.max_pool_size,
    ))
}

async fn ping(config: &ConnectionConfig) -> anyhow::Result<()> {
    const PING: &str = "SELECT 1 AS ok";
    let bindings = Bindings::new();

    match config.driver {
        Driver::Postgres => {
            let pool = blueprint::create_pool(config)?;
            let client = pool.get().await.context("failed to get a pooled connection")?;
            let mut source = PgSource::new(client);
            if let Some(timeout) = config.query_timeout() {
                source = source.with_timeout(timeout);
            }
            source.fetch_one(PING, &bindings).await?;
        }
        #[cfg(feature = "mysql")]
        Driver::MySql => {
            let source = blueprint::MySqlSource::connect(config).await?;
            source.fetch_one(PING, &bindings).await?;
        }
        #[cfg(not(feature = "mysql"))]
        Driver::MySql => {
            anyhow::bail!("MySQL connections need the `mysql` feature of blueprint-cli");
        }
    }
    let url = config.redacted_url()?;
    tracing::debug!(%url, "connection check passed");
    Ok(())
}
