//! Create-api-key command implementation

use anyhow::Result;
use litellm_sync::{create_api_key, HttpGateway, Settings};

/// Run the create-api-key command; the key is the only stdout output
pub async fn run(settings: &Settings, email: &str, alias: Option<&str>) -> Result<()> {
    let gateway = HttpGateway::new(settings)?;
    let issued = create_api_key(&gateway, email, alias).await?;
    println!("{}", issued.key);
    Ok(())
}
