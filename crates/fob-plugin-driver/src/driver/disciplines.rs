//! How handlers of one hook are scheduled and how their results combine.
//!
//! Every discipline takes an `invoke` closure that calls the right method on
//! a plugin. Asynchronous handlers are tracked as unfulfilled actions while
//! they run. Handlers are never spawned: parallel handlers are interleaved on
//! the caller's task.

use super::PluginDriver;
use crate::context::PluginContext;
use crate::error::Result;
use crate::hooks::{HookHandler, HookName};
use crate::plugin::{HookNoopReturn, Plugin, RegisteredPlugin};
use futures::future::join_all;
use rustc_hash::FxHashSet;
use std::fmt::Debug;
use std::future::Future;

type HookArgs<'a> = &'a (dyn Debug + Sync);

impl PluginDriver {
    /// Run handlers in order until one returns a value.
    ///
    /// Plugins in `skipped` are not asked. Returns the value and the index of
    /// the plugin that produced it.
    pub async fn hook_first<'s, T, F, Fut>(
        &'s self,
        hook: HookName,
        args: HookArgs<'_>,
        skipped: Option<&FxHashSet<usize>>,
        invoke: F,
    ) -> Result<Option<(T, usize)>>
    where
        F: Fn(&'s dyn Plugin, PluginContext) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        let sorted = self.sorted(hook)?;
        let args = format!("{:?}", args);
        for entry in sorted.iter() {
            if skipped.is_some_and(|skipped| skipped.contains(&entry.plugin)) {
                continue;
            }
            let (plugin, ctx) = self.plugin_at(entry.plugin);
            if let Some(value) = self
                .run_hook(hook, entry.plugin, &args, invoke(plugin, ctx))
                .await?
            {
                return Ok(Some((value, entry.plugin)));
            }
        }
        Ok(None)
    }

    /// Synchronous [`hook_first`](Self::hook_first).
    pub fn hook_first_sync<T>(
        &self,
        hook: HookName,
        invoke: impl Fn(&dyn Plugin, &PluginContext) -> anyhow::Result<Option<T>>,
    ) -> Result<Option<(T, usize)>> {
        let sorted = self.sorted(hook)?;
        for entry in sorted.iter() {
            let (plugin, ctx) = self.plugin_at(entry.plugin);
            if let Some(value) = self.run_hook_sync(hook, entry.plugin, || invoke(plugin, &ctx))? {
                return Ok(Some((value, entry.plugin)));
            }
        }
        Ok(None)
    }

    /// Run handlers concurrently.
    ///
    /// A `sequential` handler waits for every handler started before it, runs
    /// alone, and only then are later handlers started. When a handler fails,
    /// the rest of its batch still settles and the first error is returned.
    pub async fn hook_parallel<'s, F, Fut>(
        &'s self,
        hook: HookName,
        args: HookArgs<'_>,
        invoke: F,
    ) -> Result<()>
    where
        F: Fn(&'s dyn Plugin, PluginContext) -> Fut,
        Fut: Future<Output = HookNoopReturn>,
    {
        let sorted = self.sorted(hook)?;
        let args = format!("{:?}", args);
        let mut batch = Vec::new();
        for entry in sorted.iter() {
            let (plugin, ctx) = self.plugin_at(entry.plugin);
            if !entry.sequential {
                batch.push(self.run_hook(hook, entry.plugin, &args, invoke(plugin, ctx)));
                continue;
            }
            settle(join_all(batch.drain(..)).await)?;
            self.run_hook(hook, entry.plugin, &args, invoke(plugin, ctx))
                .await?;
        }
        settle(join_all(batch).await)?;
        Ok(())
    }

    /// Run handlers one after another.
    pub async fn hook_seq<'s, F, Fut>(
        &'s self,
        hook: HookName,
        args: HookArgs<'_>,
        invoke: F,
    ) -> Result<()>
    where
        F: Fn(&'s dyn Plugin, PluginContext) -> Fut,
        Fut: Future<Output = HookNoopReturn>,
    {
        let sorted = self.sorted(hook)?;
        let args = format!("{:?}", args);
        for entry in sorted.iter() {
            let (plugin, ctx) = self.plugin_at(entry.plugin);
            self.run_hook(hook, entry.plugin, &args, invoke(plugin, ctx))
                .await?;
        }
        Ok(())
    }

    /// Thread a value through the handlers in order.
    ///
    /// Each handler receives the current value; `reduce` combines it with the
    /// handler's result into the value passed to the next handler.
    pub async fn hook_reduce_arg0<'s, T, V, F, Fut, R>(
        &'s self,
        hook: HookName,
        args: HookArgs<'_>,
        initial: T,
        invoke: F,
        mut reduce: R,
    ) -> Result<T>
    where
        T: Clone,
        F: Fn(&'s dyn Plugin, PluginContext, T) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<V>>>,
        R: FnMut(&PluginContext, T, Option<V>, &RegisteredPlugin) -> T,
    {
        let sorted = self.sorted(hook)?;
        let args = format!("{:?}", args);
        let mut value = initial;
        for entry in sorted.iter() {
            let (plugin, ctx) = self.plugin_at(entry.plugin);
            let result = self
                .run_hook(hook, entry.plugin, &args, invoke(plugin, ctx.clone(), value.clone()))
                .await?;
            value = reduce(&ctx, value, result, &self.plugins[entry.plugin]);
        }
        Ok(value)
    }

    /// Synchronous [`hook_reduce_arg0`](Self::hook_reduce_arg0).
    pub fn hook_reduce_arg0_sync<T, V>(
        &self,
        hook: HookName,
        initial: T,
        invoke: impl Fn(&dyn Plugin, &PluginContext, &T) -> anyhow::Result<Option<V>>,
        mut reduce: impl FnMut(&PluginContext, T, Option<V>, &RegisteredPlugin) -> T,
    ) -> Result<T> {
        let sorted = self.sorted(hook)?;
        let mut value = initial;
        for entry in sorted.iter() {
            let (plugin, ctx) = self.plugin_at(entry.plugin);
            let result = self.run_hook_sync(hook, entry.plugin, || invoke(plugin, &ctx, &value))?;
            value = reduce(&ctx, value, result, &self.plugins[entry.plugin]);
        }
        Ok(value)
    }

    /// Collect a string from every handler and fold them in plugin order.
    ///
    /// Handlers declared as a static value contribute that value. Scheduling
    /// follows [`hook_parallel`](Self::hook_parallel).
    pub async fn hook_reduce_value<'s, F, Fut, R>(
        &'s self,
        hook: HookName,
        args: HookArgs<'_>,
        initial: String,
        invoke: F,
        mut reduce: R,
    ) -> Result<String>
    where
        F: Fn(&'s dyn Plugin, PluginContext) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<String>>>,
        R: FnMut(String, String, &RegisteredPlugin) -> String,
    {
        let sorted = self.sorted(hook)?;
        let args = format!("{:?}", args);
        let mut values: Vec<Option<String>> = vec![None; sorted.len()];
        let mut batch = Vec::new();
        let mut slots = Vec::new();
        for (slot, entry) in sorted.iter().enumerate() {
            if let HookHandler::Value(value) = &entry.handler {
                values[slot] = Some(value.clone());
                continue;
            }
            let (plugin, ctx) = self.plugin_at(entry.plugin);
            if !entry.sequential {
                slots.push(slot);
                batch.push(self.run_hook(hook, entry.plugin, &args, invoke(plugin, ctx)));
                continue;
            }
            let results = join_all(batch.drain(..)).await;
            fill(&mut values, slots.drain(..), results)?;
            values[slot] = self
                .run_hook(hook, entry.plugin, &args, invoke(plugin, ctx))
                .await?;
        }
        let results = join_all(batch).await;
        fill(&mut values, slots.into_iter(), results)?;

        let mut reduced = initial;
        for (entry, value) in sorted.iter().zip(values) {
            if let Some(value) = value {
                reduced = reduce(reduced, value, &self.plugins[entry.plugin]);
            }
        }
        Ok(reduced)
    }

    /// Synchronous [`hook_reduce_value`](Self::hook_reduce_value).
    pub fn hook_reduce_value_sync(
        &self,
        hook: HookName,
        initial: String,
        invoke: impl Fn(&dyn Plugin, &PluginContext) -> anyhow::Result<Option<String>>,
        mut reduce: impl FnMut(String, String, &RegisteredPlugin) -> String,
    ) -> Result<String> {
        let sorted = self.sorted(hook)?;
        let mut reduced = initial;
        for entry in sorted.iter() {
            let value = match &entry.handler {
                HookHandler::Value(value) => Some(value.clone()),
                HookHandler::Function => {
                    let (plugin, ctx) = self.plugin_at(entry.plugin);
                    self.run_hook_sync(hook, entry.plugin, || invoke(plugin, &ctx))?
                }
            };
            if let Some(value) = value {
                reduced = reduce(reduced, value, &self.plugins[entry.plugin]);
            }
        }
        Ok(reduced)
    }
}

/// First error of a settled batch, in plugin order.
fn settle(results: Vec<Result<()>>) -> Result<()> {
    results.into_iter().collect()
}

fn fill<T>(
    values: &mut [Option<T>],
    slots: impl Iterator<Item = usize>,
    results: Vec<Result<Option<T>>>,
) -> Result<()> {
    let mut first_error = None;
    for (slot, result) in slots.zip(results) {
        match result {
            Ok(value) => values[slot] = value,
            Err(error) => {
                first_error.get_or_insert(error);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}
