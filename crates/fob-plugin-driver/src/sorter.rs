//! Per-hook plugin ordering.

use crate::error::{DriverError, Result};
use crate::hooks::{HookHandler, HookName, HookOrder};
use crate::plugin::RegisteredPlugin;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A plugin's place in one hook's execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedHook {
    /// Index into the driver's plugin list.
    pub plugin: usize,
    pub handler: HookHandler,
    pub order: Option<HookOrder>,
    pub sequential: bool,
}

/// Orders plugins for each hook: `pre`, then unordered, then `post`,
/// registration order within each bucket. Output plugins are left out of
/// input hooks.
///
/// Results are computed on first use and kept for the driver's lifetime.
/// A failed validation is not cached and fails again on the next call.
#[derive(Debug, Default)]
pub struct HookSorter {
    sorted: Mutex<FxHashMap<HookName, Arc<[SortedHook]>>>,
}

impl HookSorter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sorted(&self, hook: HookName, plugins: &[RegisteredPlugin]) -> Result<Arc<[SortedHook]>> {
        if let Some(sorted) = self.sorted.lock().get(&hook) {
            return Ok(Arc::clone(sorted));
        }
        // Plugins are asked outside the lock; a concurrent sort of the same
        // hook produces the same list and the first insert wins.
        let sorted: Arc<[SortedHook]> = sort_plugins(hook, plugins)?.into();
        Ok(Arc::clone(self.sorted.lock().entry(hook).or_insert(sorted)))
    }
}

pub fn sort_plugins(hook: HookName, plugins: &[RegisteredPlugin]) -> Result<Vec<SortedHook>> {
    let mut pre = Vec::new();
    let mut normal = Vec::new();
    let mut post = Vec::new();

    for (index, entry) in plugins.iter().enumerate() {
        if entry.is_output() && hook.is_input_hook() {
            continue;
        }
        let Some(declaration) = entry.plugin.hook(hook) else {
            continue;
        };
        let normalized = declaration.normalize();
        if matches!(normalized.handler, HookHandler::Value(_)) && !hook.accepts_value() {
            return Err(DriverError::InvalidHook {
                plugin: entry.name.clone(),
                hook: hook.as_str().to_string(),
                reason: "expected a function hook or an object with a \"handler\" function."
                    .to_string(),
            });
        }
        let sorted = SortedHook {
            plugin: index,
            handler: normalized.handler,
            order: normalized.order,
            sequential: normalized.sequential,
        };
        match sorted.order {
            Some(HookOrder::Pre) => pre.push(sorted),
            Some(HookOrder::Post) => post.push(sorted),
            None => normal.push(sorted),
        }
    }

    pre.extend(normal);
    pre.extend(post);
    Ok(pre)
}
