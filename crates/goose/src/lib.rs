use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Subcommands of the goose CLI that the service drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationCommand {
    Up,
    Down,
    Status,
}

impl MigrationCommand {
    fn as_arg(self) -> &'static str {
        match self {
            MigrationCommand::Up => "up",
            MigrationCommand::Down => "down",
            MigrationCommand::Status => "status",
        }
    }
}

/// Migration runner for goose-compatible databases.
///
/// Spawns the goose binary as `goose -dir <migrations_dir> <driver> <dsn> <command>`.
/// Both stores used by the tracker (PostgreSQL for current positions,
/// ClickHouse for history) are migrated through this one runner.
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    /// Path to the goose binary (e.g., "goose" if in PATH, or absolute path)
    goose_binary_path: String,

    /// Directory containing SQL migration files
    migrations_dir: String,

    /// Database driver name (e.g., "postgres", "clickhouse")
    driver: String,

    /// Database connection string - format depends on the driver
    dsn: String,
}

impl MigrationRunner {
    pub fn new(
        goose_binary_path: String,
        migrations_dir: String,
        driver: String,
        dsn: String,
    ) -> Self {
        Self {
            goose_binary_path,
            migrations_dir,
            driver,
            dsn,
        }
    }

    /// Applies all pending migrations
    pub async fn run_migrations(&self) -> Result<()> {
        let stdout = self.execute(MigrationCommand::Up).await?;
        info!(driver = %self.driver, "migrations applied");
        debug!("goose output:\n{}", stdout);
        Ok(())
    }

    /// Rolls back the most recent migration
    pub async fn rollback_migration(&self) -> Result<()> {
        let stdout = self.execute(MigrationCommand::Down).await?;
        debug!("rollback completed:\n{}", stdout);
        Ok(())
    }

    /// Returns goose's status report
    pub async fn migration_status(&self) -> Result<String> {
        self.execute(MigrationCommand::Status).await
    }

    fn args(&self, command: MigrationCommand) -> [&str; 5] {
        [
            "-dir",
            &self.migrations_dir,
            &self.driver,
            &self.dsn,
            command.as_arg(),
        ]
    }

    async fn execute(&self, command: MigrationCommand) -> Result<String> {
        debug!(
            driver = %self.driver,
            migrations_dir = %self.migrations_dir,
            command = command.as_arg(),
            "running goose"
        );

        let output = Command::new(&self.goose_binary_path)
            .args(self.args(command))
            .output()
            .await
            .with_context(|| format!("failed to spawn goose at {}", self.goose_binary_path))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "goose {} failed for {}.\nstdout: {}\nstderr: {}",
                command.as_arg(),
                self.driver,
                stdout,
                stderr
            );
        }

        Ok(stdout)
    }
}
