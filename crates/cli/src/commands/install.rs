use anyhow::Result;
use pw_agent::ContextConfig;
use tracing::info;

pub async fn execute(config: &ContextConfig) -> Result<()> {
	info!(target = "pw", channel = %config.install_channel(), "install browser");
	let channel = pw_agent::install::install_browser(config).await?;
	println!("Browser {channel} installed");
	Ok(())
}
