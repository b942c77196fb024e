//! Hook names and the shapes a plugin can declare them in.

use std::fmt;

/// Every hook the driver knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookName {
    // Build hooks
    BuildStart,
    ResolveId,
    ResolveDynamicImport,
    Load,
    Transform,
    ShouldTransformCachedModule,
    ModuleParsed,
    BuildEnd,
    WatchChange,
    CloseWatcher,
    // Output generation hooks
    OutputOptions,
    RenderStart,
    Banner,
    Footer,
    Intro,
    Outro,
    RenderChunk,
    AugmentChunkHash,
    ResolveFileUrl,
    ResolveImportMeta,
    GenerateBundle,
    WriteBundle,
    RenderError,
    CloseBundle,
}

impl HookName {
    pub const ALL: [HookName; 24] = [
        HookName::BuildStart,
        HookName::ResolveId,
        HookName::ResolveDynamicImport,
        HookName::Load,
        HookName::Transform,
        HookName::ShouldTransformCachedModule,
        HookName::ModuleParsed,
        HookName::BuildEnd,
        HookName::WatchChange,
        HookName::CloseWatcher,
        HookName::OutputOptions,
        HookName::RenderStart,
        HookName::Banner,
        HookName::Footer,
        HookName::Intro,
        HookName::Outro,
        HookName::RenderChunk,
        HookName::AugmentChunkHash,
        HookName::ResolveFileUrl,
        HookName::ResolveImportMeta,
        HookName::GenerateBundle,
        HookName::WriteBundle,
        HookName::RenderError,
        HookName::CloseBundle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::BuildStart => "build_start",
            HookName::ResolveId => "resolve_id",
            HookName::ResolveDynamicImport => "resolve_dynamic_import",
            HookName::Load => "load",
            HookName::Transform => "transform",
            HookName::ShouldTransformCachedModule => "should_transform_cached_module",
            HookName::ModuleParsed => "module_parsed",
            HookName::BuildEnd => "build_end",
            HookName::WatchChange => "watch_change",
            HookName::CloseWatcher => "close_watcher",
            HookName::OutputOptions => "output_options",
            HookName::RenderStart => "render_start",
            HookName::Banner => "banner",
            HookName::Footer => "footer",
            HookName::Intro => "intro",
            HookName::Outro => "outro",
            HookName::RenderChunk => "render_chunk",
            HookName::AugmentChunkHash => "augment_chunk_hash",
            HookName::ResolveFileUrl => "resolve_file_url",
            HookName::ResolveImportMeta => "resolve_import_meta",
            HookName::GenerateBundle => "generate_bundle",
            HookName::WriteBundle => "write_bundle",
            HookName::RenderError => "render_error",
            HookName::CloseBundle => "close_bundle",
        }
    }

    /// Hooks that only run while the module graph is built.
    ///
    /// `close_bundle` runs from the input driver once all outputs are written.
    pub fn is_input_hook(&self) -> bool {
        matches!(
            self,
            HookName::BuildStart
                | HookName::ResolveId
                | HookName::ResolveDynamicImport
                | HookName::Load
                | HookName::Transform
                | HookName::ShouldTransformCachedModule
                | HookName::ModuleParsed
                | HookName::BuildEnd
                | HookName::WatchChange
                | HookName::CloseWatcher
                | HookName::CloseBundle
        )
    }

    /// Addon hooks may be declared as a plain string instead of a handler.
    pub fn accepts_value(&self) -> bool {
        matches!(
            self,
            HookName::Banner | HookName::Footer | HookName::Intro | HookName::Outro
        )
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket a hook runs in relative to other plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookOrder {
    Pre,
    Post,
}

/// What runs when the hook fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookHandler {
    /// The matching method on the plugin.
    Function,
    /// A static value used as the hook's result.
    Value(String),
}

/// How a plugin declares a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDeclaration {
    /// Run the plugin's method with default ordering.
    Handler,
    /// Use a static string as the result.
    Value(String),
    /// Explicit handler with ordering options.
    Object {
        handler: HookHandler,
        order: Option<HookOrder>,
        /// In parallel hooks, wait for earlier handlers and run alone.
        sequential: bool,
    },
}

impl HookDeclaration {
    pub fn ordered(order: HookOrder) -> Self {
        HookDeclaration::Object {
            handler: HookHandler::Function,
            order: Some(order),
            sequential: false,
        }
    }

    pub fn sequential() -> Self {
        HookDeclaration::Object {
            handler: HookHandler::Function,
            order: None,
            sequential: true,
        }
    }

    pub(crate) fn normalize(self) -> NormalizedHook {
        match self {
            HookDeclaration::Handler => NormalizedHook {
                handler: HookHandler::Function,
                order: None,
                sequential: false,
            },
            HookDeclaration::Value(value) => NormalizedHook {
                handler: HookHandler::Value(value),
                order: None,
                sequential: false,
            },
            HookDeclaration::Object {
                handler,
                order,
                sequential,
            } => NormalizedHook {
                handler,
                order,
                sequential,
            },
        }
    }
}

impl From<HookOrder> for HookDeclaration {
    fn from(order: HookOrder) -> Self {
        HookDeclaration::ordered(order)
    }
}

/// A declaration reduced to `(handler, order, sequential)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedHook {
    pub handler: HookHandler,
    pub order: Option<HookOrder>,
    pub sequential: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_names_are_distinct() {
        let names: rustc_hash::FxHashSet<_> = HookName::ALL.iter().map(|h| h.as_str()).collect();
        assert_eq!(names.len(), HookName::ALL.len());
    }

    #[test]
    fn test_normalize_shapes() {
        assert_eq!(
            HookDeclaration::Handler.normalize(),
            NormalizedHook {
                handler: HookHandler::Function,
                order: None,
                sequential: false
            }
        );
        assert_eq!(
            HookDeclaration::Value("/* banner */".into()).normalize().handler,
            HookHandler::Value("/* banner */".into())
        );
        let post = HookDeclaration::from(HookOrder::Post).normalize();
        assert_eq!(post.order, Some(HookOrder::Post));
        assert!(HookDeclaration::sequential().normalize().sequential);
    }

    #[test]
    fn test_input_hooks() {
        assert!(HookName::Transform.is_input_hook());
        assert!(HookName::CloseBundle.is_input_hook());
        assert!(!HookName::RenderChunk.is_input_hook());
        assert!(!HookName::GenerateBundle.is_input_hook());
    }
}
