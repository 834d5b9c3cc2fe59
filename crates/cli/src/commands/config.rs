use anyhow::Result;
use pw_agent::{ContextConfig, SessionStrategy};

pub fn execute(config: &ContextConfig, strategy_only: bool) -> Result<()> {
	let strategy = SessionStrategy::resolve(config)?;
	if !strategy_only {
		println!("{}", serde_json::to_string_pretty(config)?);
	}
	println!("Session: {strategy}");
	Ok(())
}
