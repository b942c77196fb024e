//! Integration tests for plugin contexts

mod helpers;

use fob_emitter::log::{DEPRECATED_FEATURE, INVALID_LOG_POSITION, PLUGIN_LOG, PLUGIN_WARNING};
use fob_plugin_driver::{
    BuildPhase, DriverError, DriverOptions, EmittedAsset, EmittedChunk, HookDeclaration, HookName,
    HookResolveIdArgs, HookTransformArgs, HookTransformOutput, Log, LogLevel, LogPosition,
    ParseOptions, Plugin, PluginCache, PluginContext, PluginDriver, ResolveOptions, ResolvedId,
};
use helpers::{CollectingLogHandler, EmptyProgramParser, Recorder, StaticLoader, events, module};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::Arc;

struct Named {
    name: &'static str,
    cache_key: Option<&'static str>,
}

#[async_trait::async_trait]
impl Plugin for Named {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.name)
    }

    fn cache_key(&self) -> Option<Cow<'static, str>> {
        self.cache_key.map(Cow::Borrowed)
    }

    fn hook(&self, _hook: HookName) -> Option<HookDeclaration> {
        None
    }
}

fn named(name: &'static str) -> Arc<dyn Plugin> {
    Arc::new(Named {
        name,
        cache_key: None,
    })
}

fn recording_driver(options: DriverOptions) -> (Arc<PluginDriver>, Arc<CollectingLogHandler>) {
    let logs = Arc::new(CollectingLogHandler::default());
    let driver = PluginDriver::builder()
        .plugin(named("logger"))
        .options(options)
        .log_handler(logs.clone())
        .build();
    (driver, logs)
}

#[test]
fn test_cache_requires_unique_name_or_key() {
    let driver = PluginDriver::builder()
        .plugin(named("dup"))
        .plugin(named("dup"))
        .plugin(Arc::new(Named {
            name: "dup",
            cache_key: Some("dup-keyed"),
        }))
        .plugin(named(""))
        .build();

    let cache = |index: usize| driver.context(index).unwrap().cache().clone();

    cache(0).set("k", "first").unwrap();
    assert_eq!(cache(0).get_as::<String>("k").unwrap().as_deref(), Some("first"));

    let err = cache(1).set("k", "second").unwrap_err();
    assert!(matches!(err, DriverError::UncacheablePlugin(ref name) if name == "dup"));

    cache(2).set("k", "keyed").unwrap();
    assert_eq!(cache(0).get_as::<String>("k").unwrap().as_deref(), Some("first"));

    assert_eq!(driver.context(3).unwrap().name(), "at position 4");
    assert!(cache(3).has("k").is_err());
}

#[test]
fn test_disabled_cache_is_a_no_op() {
    let driver = PluginDriver::builder()
        .plugin(named(""))
        .options(DriverOptions::new().cache(false))
        .build();
    let cache = driver.context(0).unwrap().cache();
    cache.set("k", 1).unwrap();
    assert_eq!(cache.get("k").unwrap(), None);
    assert!(driver.cache_snapshot().is_none());
}

#[test]
fn test_cache_survives_into_next_build() {
    let first = PluginDriver::builder().plugin(named("p")).build();
    first.context(0).unwrap().cache().set("answer", 42).unwrap();
    let snapshot = first.cache_snapshot().unwrap();

    let second = PluginDriver::builder()
        .plugin(named("p"))
        .cache(snapshot.shared())
        .build();
    let cache = second.context(0).unwrap().cache();
    assert_eq!(cache.get_as::<u32>("answer").unwrap(), Some(42));
}

#[test]
fn test_unused_cache_entries_expire() {
    let store = PluginCache::new().shared();
    let options = DriverOptions::new().cache_expiry(2);
    let build = || {
        PluginDriver::builder()
            .plugin(named("p"))
            .options(options.clone())
            .cache(store.clone())
            .build()
    };

    build().context(0).unwrap().cache().set("stale", true).unwrap();
    let _ = build().cache_snapshot();
    let third = build();
    let snapshot = third.cache_snapshot().unwrap();
    assert!(snapshot.is_empty());
}

#[test]
fn test_logs_are_tagged_and_gated() {
    let (driver, logs) = recording_driver(DriverOptions::new().log_level(LogLevel::Warn));
    let ctx = driver.context(0).unwrap();

    ctx.info("hidden");
    ctx.debug("hidden");
    ctx.warn(Log::new("careful").with_code("MY_CODE"));

    let logs = logs.logs();
    assert_eq!(logs.len(), 1);
    let (level, log) = &logs[0];
    assert_eq!(*level, LogLevel::Warn);
    assert_eq!(log.message, "careful");
    assert_eq!(log.code.as_deref(), Some(PLUGIN_WARNING));
    assert_eq!(log.plugin_code.as_deref(), Some("MY_CODE"));
    assert_eq!(log.plugin.as_deref(), Some("logger"));
}

#[test]
fn test_debug_uses_plugin_log_code() {
    let (driver, logs) = recording_driver(DriverOptions::new().log_level(LogLevel::Debug));
    driver.context(0).unwrap().debug("details");
    assert_eq!(logs.codes(), [PLUGIN_LOG]);
}

#[test]
fn test_position_outside_transform_is_reported() {
    let (driver, logs) = recording_driver(DriverOptions::new());
    driver
        .context(0)
        .unwrap()
        .warn_at("look here", LogPosition { line: 1, column: 4 });

    let logs = logs.logs();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].1.code.as_deref(), Some(INVALID_LOG_POSITION));
    assert!(logs[0].1.message.contains("\"logger\""));
    assert_eq!(logs[1].1.message, "look here");
    assert_eq!(logs[1].1.pos, None);
}

#[tokio::test]
async fn test_transform_context_tags_logs_and_records_dependencies() {
    struct Imports;

    #[async_trait::async_trait]
    impl Plugin for Imports {
        fn name(&self) -> Cow<'static, str> {
            Cow::Borrowed("imports")
        }

        fn hook(&self, hook: HookName) -> Option<HookDeclaration> {
            matches!(hook, HookName::Transform).then_some(HookDeclaration::Handler)
        }

        async fn transform(
            &self,
            ctx: &PluginContext,
            args: &HookTransformArgs,
        ) -> anyhow::Result<Option<HookTransformOutput>> {
            ctx.add_watch_file("/styles/theme.css")?;
            ctx.warn_at("unused import", LogPosition { line: 2, column: 0 });
            Ok(Some(HookTransformOutput {
                code: args.code.clone(),
                map: Some("{\"version\":3}".into()),
            }))
        }
    }

    let logs = Arc::new(CollectingLogHandler::default());
    let driver = PluginDriver::builder()
        .plugin(Arc::new(Imports))
        .log_handler(logs.clone())
        .build();

    let module = driver.transform("/main.js", "code".into()).await.unwrap();
    assert_eq!(module.dependencies, ["/styles/theme.css"]);
    assert_eq!(module.maps, ["{\"version\":3}"]);
    assert_eq!(driver.watch_files(), ["/styles/theme.css"]);

    let logs = logs.logs();
    assert_eq!(logs.len(), 1);
    let log = &logs[0].1;
    assert_eq!(log.id.as_deref(), Some("/main.js"));
    assert_eq!(log.hook.as_deref(), Some("transform"));
    assert_eq!(log.pos, Some(LogPosition { line: 2, column: 0 }));

    // Outside a transform the same context doesn't record dependencies.
    driver.context(0).unwrap().add_watch_file("/other.css").unwrap();
    assert_eq!(driver.watch_files(), ["/styles/theme.css", "/other.css"]);
}

#[test]
fn test_watch_files_rejected_while_generating() {
    let driver = PluginDriver::builder().plugin(named("p")).build();
    let ctx = driver.context(0).unwrap();
    ctx.add_watch_file("/a.css").unwrap();

    driver.set_phase(BuildPhase::Generate);
    assert!(matches!(
        ctx.add_watch_file("/b.css"),
        Err(DriverError::InvalidPhaseForWatchFile)
    ));
    assert_eq!(ctx.get_watch_files(), ["/a.css"]);
}

/// Wraps whatever the rest of the pipeline resolves `specifier` to.
struct Proxy {
    calls: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Plugin for Proxy {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("proxy")
    }

    fn hook(&self, hook: HookName) -> Option<HookDeclaration> {
        matches!(hook, HookName::ResolveId).then_some(HookDeclaration::Handler)
    }

    async fn resolve_id(
        &self,
        ctx: &PluginContext,
        args: &HookResolveIdArgs,
    ) -> anyhow::Result<Option<ResolvedId>> {
        self.calls.lock().push(args.specifier.clone());
        let resolved = ctx
            .resolve(&args.specifier, args.importer.as_deref(), ResolveOptions::skip_self())
            .await?;
        Ok(resolved.map(|resolved| ResolvedId::new(format!("{}?proxied", resolved.id))))
    }
}

#[tokio::test]
async fn test_resolve_skip_self() {
    let log = events();
    let proxy = Arc::new(Proxy {
        calls: Mutex::new(Vec::new()),
    });
    let driver = PluginDriver::builder()
        .plugin(proxy.clone())
        .plugin(
            Recorder::new("real", &log)
                .on(HookName::ResolveId, HookDeclaration::Handler)
                .resolves("dep", "/node_modules/dep/index.js")
                .shared(),
        )
        .build();

    let resolved = driver
        .resolve_id(&HookResolveIdArgs::new("dep", Some("/main.js")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, "/node_modules/dep/index.js?proxied");
    assert_eq!(*proxy.calls.lock(), ["dep"]);

    // A different specifier still reaches the proxy.
    let other = driver
        .resolve_id(&HookResolveIdArgs::new("other", Some("/main.js")))
        .await
        .unwrap();
    assert!(other.is_none());
    assert_eq!(*proxy.calls.lock(), ["dep", "other"]);
}

#[tokio::test]
async fn test_resolve_and_load_through_module_loader() {
    let loader = Arc::new(StaticLoader {
        fallback: Some("/fs".into()),
        modules: vec![module("/fs/util.js")],
        ..Default::default()
    });
    let driver = PluginDriver::builder()
        .plugin(named("p"))
        .module_loader(loader.clone())
        .build();
    let ctx = driver.context(0).unwrap();

    let resolved = ctx
        .resolve("util.js", Some("/main.js"), ResolveOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, "/fs/util.js");

    let info = ctx.load(&resolved).await.unwrap();
    assert_eq!(info.id, "/fs/util.js");
    assert_eq!(ctx.get_module_info("/fs/util.js"), Some(module("/fs/util.js")));
    assert_eq!(ctx.get_module_ids(), ["/fs/util.js"]);

    let missing = ctx.load(&ResolvedId::new("/fs/missing.js")).await.unwrap_err();
    assert!(matches!(missing, DriverError::Loader { operation: "load", .. }));

    ctx.emit_file(EmittedChunk::new("/fs/util.js")).unwrap();
    assert_eq!(*loader.chunks.lock(), ["/fs/util.js"]);
}

#[tokio::test]
async fn test_missing_collaborators() {
    let driver = PluginDriver::builder().plugin(named("p")).build();
    let ctx = driver.context(0).unwrap();

    assert!(
        ctx.resolve("x", None, ResolveOptions::default())
            .await
            .unwrap()
            .is_none()
    );
    assert!(matches!(
        ctx.load(&ResolvedId::new("x")).await,
        Err(DriverError::NoModuleLoader(_))
    ));
    assert!(matches!(
        ctx.parse("1", &ParseOptions::default()),
        Err(DriverError::NoParser)
    ));
    assert!(ctx.get_module_ids().is_empty());
}

#[test]
fn test_parse_delegates_to_parser() {
    let driver = PluginDriver::builder()
        .plugin(named("p"))
        .parser(Arc::new(EmptyProgramParser))
        .build();
    let ctx = driver.context(0).unwrap();

    let ast = ctx.parse("let a = 1", &ParseOptions::default()).unwrap();
    assert_eq!(ast["type"], "Program");
    assert!(matches!(
        ctx.parse("syntax error", &ParseOptions::default()),
        Err(DriverError::Parse(_))
    ));
}

#[test]
fn test_meta_and_deprecated_module_ids() {
    let logs = Arc::new(CollectingLogHandler::default());
    let driver = PluginDriver::builder()
        .plugin(named("old"))
        .options(DriverOptions::new().watch_mode(true))
        .module_loader(Arc::new(StaticLoader {
            modules: vec![module("/a.js")],
            ..Default::default()
        }))
        .log_handler(logs.clone())
        .build();
    let ctx = driver.context(0).unwrap();

    let meta = ctx.meta();
    assert_eq!(meta.version, env!("CARGO_PKG_VERSION"));
    assert!(meta.watch_mode);

    #[allow(deprecated)]
    let ids = ctx.module_ids();
    assert_eq!(ids, ["/a.js"]);
    assert_eq!(logs.codes(), [DEPRECATED_FEATURE]);
}

#[tokio::test]
async fn test_context_outliving_driver() {
    let driver = PluginDriver::builder().plugin(named("p")).build();
    let ctx = driver.context(0).unwrap().clone();
    drop(driver);

    let err = ctx.resolve("x", None, ResolveOptions::default()).await.unwrap_err();
    assert!(matches!(err, DriverError::DriverDropped(ref name) if name == "p"));
}

#[test]
fn test_error_outside_transform_is_plain_message() {
    let driver = PluginDriver::builder().plugin(named("p")).build();
    let err = driver.context(0).unwrap().error("bad input");
    assert_eq!(err.to_string(), "bad input");
}

#[test]
fn test_emit_file_through_context() {
    let driver = PluginDriver::builder().plugin(named("p")).build();
    let ctx = driver.context(0).unwrap();

    let id = ctx.emit_file(EmittedAsset::named("logo.svg", "<svg/>")).unwrap();
    assert!(ctx.get_file_name(&id).is_err());
    assert!(ctx.set_asset_source(&id, "<svg></svg>").is_err());
    assert!(ctx.with_output_bundle(|bundle| bundle.len()).is_none());
}
