use anyhow::{bail, Result};
use clickhouse::Client;

/// ClickHouse client wrapper for the append-only position history
#[derive(Clone)]
pub struct ClickHouseClient {
    client: Client,
}

impl ClickHouseClient {
    /// Fails fast when the URL or database is empty; no connection is opened here.
    pub fn new(url: &str, database: &str, username: &str, password: &str) -> Result<Self> {
        if url.is_empty() {
            bail!("clickhouse url must be set");
        }
        if database.is_empty() {
            bail!("clickhouse database must be set");
        }

        let client = Client::default()
            .with_url(url)
            .with_database(database)
            .with_user(username)
            .with_password(password)
            .with_compression(clickhouse::Compression::Lz4);

        Ok(Self { client })
    }

    pub async fn ping(&self) -> Result<()> {
        self.client.query("SELECT 1").fetch_one::<u8>().await?;
        Ok(())
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}
