//! Snapshot-and-reference browser driving for step-by-step agents.
//!
//! A [`Context`] owns a lazily created browser session and the tabs opened
//! in it. Every step runs against one [`Tab`] and may capture a
//! [`PageSnapshot`]: a YAML accessibility tree in which each element carries
//! a ref. Later steps hand those refs back and [`PageSnapshot::resolve`]
//! turns them into live elements, across nested frames.
//!
//! The browser itself is reached only through the object traits in
//! [`engine`], so any automation driver can sit underneath.
//!
//! ```ignore
//! let mut context = Context::new(engine, ContextConfig::default());
//! let report = actions::navigate(&mut context, "https://example.com", true).await;
//! println!("{}", report.text_content());
//! ```

pub mod actions;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod install;
pub mod report;
pub mod session;
pub mod snapshot;
pub mod tab;
mod wait;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ContextConfig, Timeouts};
pub use context::{Context, TabHandle};
pub use error::{Error, Result};
pub use pw_agent_protocol as protocol;
pub use report::{Content, Report};
pub use session::SessionStrategy;
pub use snapshot::PageSnapshot;
pub use tab::{RunOptions, Tab};
