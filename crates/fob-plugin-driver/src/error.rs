use fob_emitter::EmitterError;
use miette::Diagnostic;

/// Error types for plugin driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// A plugin hook returned an error.
    #[error("[plugin {plugin}] Error in \"{hook}\" hook: {source}")]
    Plugin {
        plugin: String,
        hook: String,
        #[source]
        source: anyhow::Error,
    },

    /// A plugin declared a hook in a shape the hook doesn't accept.
    #[error("Error running plugin hook \"{hook}\" for plugin \"{plugin}\", {reason}")]
    InvalidHook {
        plugin: String,
        hook: String,
        reason: String,
    },

    /// Emitting or naming a file failed.
    #[error(transparent)]
    Emitter(#[from] EmitterError),

    /// The plugin's cache was used although it cannot have one.
    #[error(
        "A plugin is trying to use the cache, but it has no unique name or cache key. The plugin \"{0}\" cannot use the cache."
    )]
    UncacheablePlugin(String),

    /// `load` or `resolve` was called but no module loader is installed.
    #[error("No module loader is available to {0}.")]
    NoModuleLoader(&'static str),

    /// `parse` was called but no parser is installed.
    #[error("No parser is available.")]
    NoParser,

    /// The module loader failed on behalf of a plugin.
    #[error("Module loader failed to {operation}: {source}")]
    Loader {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The parser rejected the code.
    #[error("Parse error: {0}")]
    Parse(#[source] anyhow::Error),

    /// A plugin context outlived its driver.
    #[error("The plugin driver for \"{0}\" has been dropped.")]
    DriverDropped(String),

    /// A watch file was added after the build finished.
    #[error("Cannot call \"add_watch_file\" after the build has finished.")]
    InvalidPhaseForWatchFile,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for plugin driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

impl DriverError {
    pub(crate) fn plugin(plugin: &str, hook: &str, source: anyhow::Error) -> Self {
        // Errors that already carry plugin context pass through unchanged.
        match source.downcast::<DriverError>() {
            Ok(inner @ DriverError::Plugin { .. }) => inner,
            Ok(inner) => DriverError::Plugin {
                plugin: plugin.to_string(),
                hook: hook.to_string(),
                source: inner.into(),
            },
            Err(source) => DriverError::Plugin {
                plugin: plugin.to_string(),
                hook: hook.to_string(),
                source,
            },
        }
    }

    /// Name of the plugin the error is attributed to, if any.
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            DriverError::Plugin { plugin, .. } | DriverError::InvalidHook { plugin, .. } => {
                Some(plugin)
            }
            DriverError::UncacheablePlugin(plugin) | DriverError::DriverDropped(plugin) => {
                Some(plugin)
            }
            _ => None,
        }
    }

    /// Name of the hook the error is attributed to, if any.
    pub fn hook_name(&self) -> Option<&str> {
        match self {
            DriverError::Plugin { hook, .. } | DriverError::InvalidHook { hook, .. } => Some(hook),
            _ => None,
        }
    }
}

impl Diagnostic for DriverError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            DriverError::Emitter(inner) => inner.code(),
            _ => Some(Box::new(match self {
                DriverError::Plugin { .. } => "PLUGIN_ERROR",
                DriverError::InvalidHook { .. } => "INVALID_PLUGIN_HOOK",
                DriverError::UncacheablePlugin(_) => "ANONYMOUS_PLUGIN_CACHE",
                DriverError::NoModuleLoader(_) | DriverError::NoParser => "MISSING_COLLABORATOR",
                DriverError::Loader { .. } => "MODULE_LOADER_ERROR",
                DriverError::Parse(_) => "PARSE_ERROR",
                DriverError::DriverDropped(_) => "DRIVER_DROPPED",
                DriverError::InvalidPhaseForWatchFile => "INVALID_PHASE",
                DriverError::InvalidConfig(_) => "INVALID_CONFIG",
                DriverError::Emitter(_) => "EMITTER_ERROR",
            })),
        }
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            DriverError::Emitter(inner) => inner.help(),
            DriverError::InvalidHook { .. } => Some(Box::new(
                "Hooks are declared as a handler, or as an object with a handler plus optional \"order\" and \"sequential\". Only banner, footer, intro and outro accept a string.",
            )),
            DriverError::UncacheablePlugin(_) => Some(Box::new(
                "Give the plugin a unique name or set a cache key.",
            )),
            DriverError::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your configuration file for syntax errors.\nError: {}",
                msg
            ))),
            _ => None,
        }
    }
}
