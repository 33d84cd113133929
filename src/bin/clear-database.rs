use cms_loader::app::clear_all;
use cms_loader::config::{Config, StoreConfig};
use cms_loader::infra::SupabaseStore;
use cms_loader::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let config = Config::load(None)?;
    let store_config = StoreConfig::from_env(config.request_timeout())?;

    println!("⚠️  WARNING: This will delete ALL rows from providers, deficiencies and quality_measures at {}!", store_config.base_url);
    println!("Press Enter to continue or Ctrl+C to cancel...");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    println!("🗑️  Clearing database...");
    let store = SupabaseStore::new(store_config)?;
    clear_all(&store).await?;

    println!("✅ Database cleared successfully!");
    Ok(())
}
