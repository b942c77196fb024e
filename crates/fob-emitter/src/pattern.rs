//! File name patterns such as `assets/[name]-[hash][extname]`.

use crate::error::{EmitterError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Characters of `[hash]` used when the pattern gives no explicit size.
pub const DEFAULT_HASH_SIZE: usize = 8;

/// Length of a hex encoded SHA-256 digest.
pub const MAX_HASH_SIZE: usize = 64;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\w+)(:\d+)?\]").expect("placeholder regex is valid"));

static INVALID_CHAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"[\x00-\x1F"#$%&*+,:;<=>?\[\]^`{|}\x7F]"##).expect("invalid char regex is valid")
});

static DRIVE_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]:").expect("drive letter regex is valid"));

static ABSOLUTE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:/|(?:[A-Za-z]:)?[/\\|])").expect("absolute path regex is valid"));

/// Replace characters that are invalid in file names with `_`.
///
/// A leading drive letter (`C:`) is kept intact.
pub fn sanitize_file_name(name: &str) -> String {
    let drive = DRIVE_LETTER.find(name).map_or("", |m| m.as_str());
    let rest = &name[drive.len()..];
    format!("{}{}", drive, INVALID_CHAR.replace_all(rest, "_"))
}

pub fn is_absolute(path: &str) -> bool {
    ABSOLUTE_PATH.is_match(path)
}

/// Whether `name` is an absolute or relative path rather than a plain file name.
pub fn is_path_fragment(name: &str) -> bool {
    name.starts_with('/')
        || name.starts_with("./")
        || name.starts_with("..")
        || (sanitize_file_name(name) == name && is_absolute(name))
}

/// Extension of the last path segment including the dot, or `""`.
pub fn extname(path: &str) -> &str {
    let base = path.rfind('/').map_or(path, |i| &path[i + 1..]);
    match base.rfind('.') {
        None | Some(0) => "",
        Some(i) => &base[i..],
    }
}

/// Expand `[placeholder]` and `[placeholder:size]` tokens in `pattern`.
///
/// `replace` returns `None` for placeholders it doesn't know. Only `hash`
/// accepts a size. `option` names the setting the pattern came from and is
/// used in error messages.
pub fn render_name_pattern<F>(pattern: &str, option: &str, mut replace: F) -> Result<String>
where
    F: FnMut(&str, Option<usize>) -> Option<String>,
{
    if is_path_fragment(pattern) {
        return Err(EmitterError::validation(format!(
            "Invalid pattern \"{}\" for \"{}\", patterns can be neither absolute nor relative paths. \
             If you want your files to be stored in a subdirectory, write its name without a leading slash like this: subdirectory/pattern.",
            pattern, option
        )));
    }

    let mut rendered = String::with_capacity(pattern.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(pattern) {
        let Some(whole) = caps.get(0) else { continue };
        let kind = &caps[1];
        let size_token = caps.get(2).map(|m| m.as_str());

        let invalid = || {
            EmitterError::validation(format!(
                "\"[{}{}]\" is not a valid placeholder in the \"{}\" pattern.",
                kind,
                size_token.unwrap_or(""),
                option
            ))
        };

        if size_token.is_some() && kind != "hash" {
            return Err(invalid());
        }
        let size = match size_token {
            Some(token) => Some(token[1..].parse::<usize>().map_err(|_| invalid())?),
            None => None,
        };
        if let Some(size) = size.filter(|size| *size > MAX_HASH_SIZE) {
            return Err(EmitterError::validation(format!(
                "Hashes cannot be longer than {} characters, received {}. Check the \"{}\" option.",
                MAX_HASH_SIZE, size, option
            )));
        }

        let replacement = replace(kind, size).ok_or_else(invalid)?;
        if is_path_fragment(&replacement) {
            return Err(EmitterError::validation(format!(
                "Invalid substitution \"{}\" for placeholder \"[{}]\" in \"{}\" pattern, can be neither absolute nor relative path.",
                replacement, kind, option
            )));
        }

        rendered.push_str(&pattern[last..whole.start()]);
        rendered.push_str(&replacement);
        last = whole.end();
    }
    rendered.push_str(&pattern[last..]);
    Ok(rendered)
}
