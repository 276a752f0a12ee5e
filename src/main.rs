use anyhow::Result;

use worker::config::Settings;
use worker::instrumentation::{self, InstrumentationSettings};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Must run before anything else is constructed.
    let instrumentation = instrumentation::init(&InstrumentationSettings::from_env()?);

    let settings = Settings::from_env()?;
    worker::bootstrap::run(&instrumentation, settings).await
}
