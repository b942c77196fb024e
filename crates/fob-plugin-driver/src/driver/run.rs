use super::PluginDriver;
use crate::context::PluginContext;
use crate::error::{DriverError, Result};
use crate::hooks::HookName;
use crate::plugin::Plugin;
use std::future::Future;
use std::sync::atomic::Ordering;

/// A hook invocation that has started but not settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookAction {
    pub plugin: String,
    pub hook: HookName,
    /// Debug rendering of the hook arguments.
    pub args: String,
}

impl std::fmt::Display for HookAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(\"{}\") [plugin {}] {}", self.hook, self.plugin, self.args)
    }
}

impl PluginDriver {
    /// The plugin at `index` with its context.
    pub(crate) fn plugin_at(&self, index: usize) -> (&dyn Plugin, PluginContext) {
        (self.plugins[index].plugin.as_ref(), self.contexts[index].clone())
    }

    /// Await one handler, tracking it as unfulfilled until it settles.
    ///
    /// If the returned future is dropped before completion the action stays
    /// in the unfulfilled set.
    pub(crate) async fn run_hook<T, Fut>(
        &self,
        hook: HookName,
        plugin: usize,
        args: &str,
        handler: Fut,
    ) -> Result<T>
    where
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let action = self.next_action.fetch_add(1, Ordering::Relaxed);
        self.actions.lock().insert(
            action,
            HookAction {
                plugin: self.plugins[plugin].name.clone(),
                hook,
                args: args.to_string(),
            },
        );
        tracing::trace!(plugin = %self.plugins[plugin].name, %hook, "Running hook");

        let result = handler.await;
        self.actions.lock().shift_remove(&action);
        result.map_err(|error| self.hook_error(hook, plugin, error))
    }

    /// Call a synchronous handler.
    pub(crate) fn run_hook_sync<T>(
        &self,
        hook: HookName,
        plugin: usize,
        handler: impl FnOnce() -> anyhow::Result<T>,
    ) -> Result<T> {
        handler().map_err(|error| self.hook_error(hook, plugin, error))
    }

    fn hook_error(&self, hook: HookName, plugin: usize, error: anyhow::Error) -> DriverError {
        let error = DriverError::plugin(&self.plugins[plugin].name, hook.as_str(), error);
        tracing::debug!(%hook, plugin = %self.plugins[plugin].name, "Hook failed: {}", error);
        error
    }
}
