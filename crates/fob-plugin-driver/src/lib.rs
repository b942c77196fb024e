#![cfg_attr(docsrs, feature(doc_cfg))]

//! # fob-plugin-driver
//!
//! Runs fob plugins.
//!
//! Plugins implement [`Plugin`] and declare the hooks they take part in. The
//! [`PluginDriver`] orders them per hook (`pre`, unordered, `post`), gives each
//! one a [`PluginContext`] and runs hooks with the scheduling each hook calls
//! for: first result wins, parallel, sequential, or folded.
//!
//! ```
//! use std::borrow::Cow;
//! use std::sync::Arc;
//! use fob_plugin_driver::{
//!     HookDeclaration, HookName, HookTransformArgs, HookTransformOutput, Plugin, PluginContext,
//!     PluginDriver,
//! };
//!
//! struct Uppercase;
//!
//! #[async_trait::async_trait]
//! impl Plugin for Uppercase {
//!     fn name(&self) -> Cow<'static, str> {
//!         Cow::Borrowed("uppercase")
//!     }
//!
//!     fn hook(&self, hook: HookName) -> Option<HookDeclaration> {
//!         matches!(hook, HookName::Transform).then_some(HookDeclaration::Handler)
//!     }
//!
//!     async fn transform(
//!         &self,
//!         _ctx: &PluginContext,
//!         args: &HookTransformArgs,
//!     ) -> anyhow::Result<Option<HookTransformOutput>> {
//!         Ok(Some(args.code.to_uppercase().into()))
//!     }
//! }
//!
//! # async fn run() -> fob_plugin_driver::Result<()> {
//! let driver = PluginDriver::builder().plugin(Arc::new(Uppercase)).build();
//! let module = driver.transform("main.js", "hello".to_string()).await?;
//! assert_eq!(module.code, "HELLO");
//! # Ok(()) }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod plugin;
pub mod sorter;
pub mod types;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{init_logging, init_logging_from_env};

pub use cache::{CacheEntry, PluginCache, PluginCacheHandle, SharedPluginCache};
pub use config::{DriverOptions, OutputConfig};
pub use context::{ContextMeta, PluginContext, ResolveOptions};
pub use driver::{HookAction, PluginDriver, PluginDriverBuilder};
pub use error::{DriverError, Result};
pub use hooks::{HookDeclaration, HookHandler, HookName, HookOrder};
pub use loader::{ModuleLoader, Parser, SharedModuleLoader, SharedParser};
pub use plugin::{HookNoopReturn, Plugin, RegisteredPlugin, SharedPlugin};
pub use sorter::{HookSorter, SortedHook};
pub use types::*;

pub use fob_emitter::{
    AssetSource, BuildPhase, EmittedAsset, EmittedChunk, EmittedFile, EmittedPrebuiltChunk, Log,
    LogHandler, LogLevel, LogPosition, OutputBundle, ReferenceId,
};
