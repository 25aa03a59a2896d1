use std::sync::OnceLock;

use regex::Regex;

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// Supports an optional default via `{{ env.VAR | default("fallback") }}`.
/// Lines starting with `#` (TOML comments) pass through unchanged.
pub fn expand_env(input: &str) -> Result<String, String> {
    fn re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        // Group 1: variable name, group 2: optional default value
        RE.get_or_init(|| {
            Regex::new(r#"\{\{\s*env\.([A-Za-z0-9_]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
                .expect("must be valid regex")
        })
    }

    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut last_end = 0;

        for captures in re().captures_iter(line) {
            let overall = captures.get(0).expect("capture 0 always present");
            let var_name = captures.get(1).expect("group 1 required by pattern").as_str();
            let default_value = captures.get(2).map(|m| m.as_str());

            output.push_str(&line[last_end..overall.start()]);

            match std::env::var(var_name) {
                Ok(value) => output.push_str(&value),
                Err(_) => match default_value {
                    Some(default) => output.push_str(default),
                    None => return Err(format!("environment variable not found: `{var_name}`")),
                },
            }

            last_end = overall.end();
        }

        output.push_str(&line[last_end..]);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(expand_env("key = \"value\"").unwrap(), "key = \"value\"");
    }

    #[test]
    fn missing_variable_without_default_fails() {
        let err = expand_env("key = \"{{ env.ATELIER_DOES_NOT_EXIST }}\"").unwrap_err();
        assert!(err.contains("ATELIER_DOES_NOT_EXIST"));
    }

    #[test]
    fn default_used_when_variable_unset() {
        let expanded =
            expand_env("key = \"{{ env.ATELIER_DOES_NOT_EXIST | default(\"fallback\") }}\"").unwrap();
        assert_eq!(expanded, "key = \"fallback\"");
    }

    #[test]
    fn comment_lines_are_untouched() {
        let raw = "# {{ env.NOT_EXPANDED }}\nkey = 1";
        assert_eq!(expand_env(raw).unwrap(), raw);
    }
}
