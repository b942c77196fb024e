use crate::bundle::OutputBundle;
use crate::error::Result;
use crate::file::AssetSource;
use crate::pattern::{DEFAULT_HASH_SIZE, extname, render_name_pattern, sanitize_file_name};
use std::fmt;
use std::sync::Arc;

/// Default pattern for asset file names.
pub const DEFAULT_ASSET_FILE_NAMES: &str = "assets/[name]-[hash][extname]";

/// What a dynamic `asset_file_names` function sees.
#[derive(Debug, Clone, Copy)]
pub struct PreRenderedAsset<'a> {
    pub name: Option<&'a str>,
    pub source: &'a AssetSource,
    /// Always `"asset"`.
    pub kind: &'static str,
}

type PatternFn = dyn Fn(&PreRenderedAsset<'_>) -> String + Send + Sync;
type SanitizeFn = dyn Fn(&str) -> String + Send + Sync;

/// Asset file name pattern: a template or a function producing one.
#[derive(Clone)]
pub enum FileNamePattern {
    Static(String),
    Dynamic(Arc<PatternFn>),
}

impl FileNamePattern {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&PreRenderedAsset<'_>) -> String + Send + Sync + 'static,
    {
        FileNamePattern::Dynamic(Arc::new(f))
    }

    fn resolve(&self, asset: &PreRenderedAsset<'_>) -> String {
        match self {
            FileNamePattern::Static(pattern) => pattern.clone(),
            FileNamePattern::Dynamic(f) => f(asset),
        }
    }
}

impl Default for FileNamePattern {
    fn default() -> Self {
        FileNamePattern::Static(DEFAULT_ASSET_FILE_NAMES.to_string())
    }
}

impl From<&str> for FileNamePattern {
    fn from(value: &str) -> Self {
        FileNamePattern::Static(value.to_string())
    }
}

impl From<String> for FileNamePattern {
    fn from(value: String) -> Self {
        FileNamePattern::Static(value)
    }
}

impl fmt::Debug for FileNamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileNamePattern::Static(pattern) => f.debug_tuple("Static").field(pattern).finish(),
            FileNamePattern::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

/// How names are cleaned before they are substituted into a pattern.
#[derive(Clone, Default)]
pub enum SanitizeFileName {
    /// Replace characters that are invalid in file names with `_`.
    #[default]
    Default,
    Disabled,
    Custom(Arc<SanitizeFn>),
}

impl SanitizeFileName {
    pub fn apply(&self, name: &str) -> String {
        match self {
            SanitizeFileName::Default => sanitize_file_name(name),
            SanitizeFileName::Disabled => name.to_string(),
            SanitizeFileName::Custom(f) => f(name),
        }
    }
}

impl From<bool> for SanitizeFileName {
    fn from(enabled: bool) -> Self {
        if enabled {
            SanitizeFileName::Default
        } else {
            SanitizeFileName::Disabled
        }
    }
}

impl fmt::Debug for SanitizeFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanitizeFileName::Default => f.write_str("Default"),
            SanitizeFileName::Disabled => f.write_str("Disabled"),
            SanitizeFileName::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

/// Output options that affect emitted asset names.
#[derive(Debug, Clone, Default)]
pub struct AssetOutputOptions {
    pub asset_file_names: FileNamePattern,
    pub sanitize_file_name: SanitizeFileName,
}

impl AssetOutputOptions {
    pub fn new(asset_file_names: impl Into<FileNamePattern>) -> Self {
        Self {
            asset_file_names: asset_file_names.into(),
            ..Default::default()
        }
    }

    pub fn sanitize_file_name(mut self, sanitize: impl Into<SanitizeFileName>) -> Self {
        self.sanitize_file_name = sanitize.into();
        self
    }

    /// Render the output file name for an asset and make it unique in `bundle`.
    pub(crate) fn asset_file_name(
        &self,
        name: Option<&str>,
        source: &AssetSource,
        source_hash: &str,
        bundle: &OutputBundle,
    ) -> Result<String> {
        let emitted_name = self.sanitize_file_name.apply(name.unwrap_or("asset"));
        let ext = extname(&emitted_name);
        let stem = &emitted_name[..emitted_name.len() - ext.len()];

        let pattern = self.asset_file_names.resolve(&PreRenderedAsset {
            name,
            source,
            kind: "asset",
        });
        let rendered = render_name_pattern(&pattern, "output.assetFileNames", |kind, size| {
            match kind {
                "ext" => Some(ext.trim_start_matches('.').to_string()),
                "extname" => Some(ext.to_string()),
                "hash" => {
                    let size = size.unwrap_or(DEFAULT_HASH_SIZE).min(source_hash.len());
                    Some(source_hash[..size].to_string())
                }
                "name" => Some(stem.to_string()),
                _ => None,
            }
        })?;
        Ok(bundle.make_unique(&rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "4d3c2b1a00000000000000000000000000000000000000000000000000000000";

    #[test]
    fn test_default_pattern() {
        let options = AssetOutputOptions::default();
        let name = options
            .asset_file_name(Some("logo.png"), &"x".into(), HASH, &OutputBundle::new())
            .unwrap();
        assert_eq!(name, "assets/logo-4d3c2b1a.png");
    }

    #[test]
    fn test_unnamed_asset_uses_asset_stem() {
        let options = AssetOutputOptions::new("[name].[hash:4][extname]");
        let name = options
            .asset_file_name(None, &"x".into(), HASH, &OutputBundle::new())
            .unwrap();
        assert_eq!(name, "asset.4d3c");
    }

    #[test]
    fn test_dynamic_pattern_sees_asset() {
        let options = AssetOutputOptions::new(FileNamePattern::dynamic(|asset| {
            assert_eq!(asset.kind, "asset");
            if asset.source.len() > 3 {
                "big/[name][extname]".to_string()
            } else {
                "small/[name][extname]".to_string()
            }
        }));
        let bundle = OutputBundle::new();
        assert_eq!(
            options
                .asset_file_name(Some("a.bin"), &vec![0u8; 10].into(), HASH, &bundle)
                .unwrap(),
            "big/a.bin"
        );
        assert_eq!(
            options
                .asset_file_name(Some("a.bin"), &"xy".into(), HASH, &bundle)
                .unwrap(),
            "small/a.bin"
        );
    }

    #[test]
    fn test_sanitize_modes() {
        let bundle = OutputBundle::new();
        let options = AssetOutputOptions::new("[name][extname]");
        assert_eq!(
            options
                .asset_file_name(Some("a?b.txt"), &"x".into(), HASH, &bundle)
                .unwrap(),
            "a_b.txt"
        );

        let options = options.sanitize_file_name(false);
        assert_eq!(
            options
                .asset_file_name(Some("a?b.txt"), &"x".into(), HASH, &bundle)
                .unwrap(),
            "a?b.txt"
        );

        let options = options.sanitize_file_name(SanitizeFileName::Custom(Arc::new(|name| {
            name.to_uppercase()
        })));
        assert_eq!(
            options
                .asset_file_name(Some("a.txt"), &"x".into(), HASH, &bundle)
                .unwrap(),
            "A.TXT"
        );
    }
}
