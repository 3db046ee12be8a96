//! grabdocs-e2e: end-to-end browser suite for the GrabDocs document platform
//!
//! The suite logs in once per test through a small state machine, finds UI
//! controls through ordered candidate selectors across every frame, and
//! verifies features by accepting any one of several observable outcomes.
//!
//! # Examples
//!
//! ```ignore
//! use grabdocs_e2e::{E2eConfig, Harness, flows};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     grabdocs_e2e::init_tracing();
//!     let harness = Harness::launch(E2eConfig::from_env()?).await?;
//!     harness.login().await?;
//!
//!     let ctx = harness.flow_context();
//!     let report = harness
//!         .run("upload", || flows::files::upload(&ctx, "fixtures/sample.pdf".as_ref()))
//!         .await?;
//!     println!("upload passed via {:?}", report.signal);
//!
//!     harness.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Everything is read from `E2E_*` environment variables; see [`E2eConfig`].
//! Set `RUST_LOG=grabdocs_e2e=debug` to see every candidate check.

pub mod config;
pub mod error;
pub mod flows;
pub mod harness;
pub mod locator;
pub mod outcome;
pub mod session;
pub mod surface;

pub use config::{BrowserChannel, Credentials, E2eConfig, OtpMode, SelectorOverrides};
pub use error::{Error, Result};
pub use flows::{FlowContext, FlowReport};
pub use harness::{Harness, init_tracing};
pub use locator::{Candidates, KeywordScan, Resolver};
pub use outcome::{Outcome, Signal, UrlPattern};
pub use session::{AuthPath, LoginState, SessionEstablisher, StageEvent, transition};
pub use surface::{FrameRef, PlaywrightSurface, Surface, Target};
