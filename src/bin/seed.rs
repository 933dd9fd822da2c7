//! Fill the configured store with demo books and users

use anyhow::Context;
use rand::{rngs::StdRng, SeedableRng};

use library_server::{config::AppConfig, repository::Repository, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::try_init().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let repository = Repository::connect(&config.database)
        .await
        .context("Failed to open storage")?;

    let mut rng = StdRng::from_entropy();
    let report = seed::run(&repository, seed::SeedPlan::default(), &mut rng)
        .await
        .context("Seeding failed")?;

    tracing::info!(
        books = report.books_inserted,
        users = report.users_inserted,
        admin = seed::ADMIN_EMAIL,
        "Done"
    );

    Ok(())
}
