use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, warn};
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};

use crate::core::error::{ManifoldError, Result};

/// Free-form options mapping handed to a reporter at construction time.
pub type ReporterOptions = Map<String, Value>;

/// Reporter enabled when the configuration names none.
pub const DEFAULT_REPORTER: &str = "text";

/// Token replaced by output overrides in option values.
pub const OUTPUT_PLACEHOLDER: &str = "{id}";

/// Canonical output-override key.
pub const OUTPUT_KEY: &str = "manifoldOutput";

/// Accepted for configurations written against the old crate name.
pub const LEGACY_OUTPUT_KEY: &str = "multiplexOutput";

const ENABLED_KEY: &str = "reporterEnabled";
const COMMON_OPTIONS_KEY: &str = "reporterOptions";
const CONFIG_FILE_KEY: &str = "configFile";
const OPTIONS_SUFFIX: &str = "ReporterOptions";

const DEFAULT_CONFIG: &str = include_str!("../../config.json");

/// Inline options passed by the hosting harness when it constructs the
/// fan-out. The mapping may carry `reporterEnabled`, `configFile`, an
/// output override, a common `reporterOptions` block and any number of
/// `<name>ReporterOptions` blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiReporterOptions {
    #[serde(default)]
    pub reporter_options: ReporterOptions,
}

impl MultiReporterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the enabled-reporters value (comma-separated names).
    pub fn with_enabled(mut self, list: &str) -> Self {
        self.reporter_options
            .insert(ENABLED_KEY.to_string(), Value::String(list.to_string()));
        self
    }

    /// Point at a custom configuration file.
    pub fn with_config_file(mut self, path: &str) -> Self {
        self.reporter_options
            .insert(CONFIG_FILE_KEY.to_string(), Value::String(path.to_string()));
        self
    }

    /// Set the output override (`name+key+value` entries joined by `:`).
    pub fn with_output_override(mut self, spec: &str) -> Self {
        self.reporter_options
            .insert(OUTPUT_KEY.to_string(), Value::String(spec.to_string()));
        self
    }

    /// Set one key inside the common `reporterOptions` block.
    pub fn with_common_option(mut self, key: &str, value: Value) -> Self {
        let common = self
            .reporter_options
            .entry(COMMON_OPTIONS_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = common {
            map.insert(key.to_string(), value);
        }
        self
    }
}

/// Resolve the configuration for a run: bundled defaults, then the custom
/// layer (a configuration file, or the inline mapping itself), then the
/// caller's output override on top under the canonical key.
pub fn resolve_options(inline: &ReporterOptions) -> Result<Map<String, Value>> {
    debug!("options (inline): {:?}", inline);

    let override_value = inline
        .get(OUTPUT_KEY)
        .or_else(|| inline.get(LEGACY_OUTPUT_KEY))
        .cloned();

    let mut resolved = default_options()?;
    let custom = custom_options(inline)?;
    deep_merge(&mut resolved, &custom);

    if let Some(value) = override_value {
        resolved.insert(OUTPUT_KEY.to_string(), value);
    }

    debug!("options (resolved): {:?}", resolved);
    Ok(resolved)
}

/// Parse the bundled default configuration.
fn default_options() -> Result<Map<String, Value>> {
    serde_json::from_str(DEFAULT_CONFIG).map_err(|e| {
        error!("bundled default configuration is invalid: {}", e);
        ManifoldError::ConfigError(format!("bundled default configuration is invalid: {}", e))
    })
}

/// Load the custom configuration layer. A `configFile` entry selects a
/// file; without one the inline mapping itself is the custom layer.
fn custom_options(inline: &ReporterOptions) -> Result<Map<String, Value>> {
    let file = match inline.get(CONFIG_FILE_KEY) {
        None => return Ok(inline.clone()),
        Some(Value::String(path)) => path.clone(),
        Some(other) => {
            warn!("configFile must be a string, found {}; ignoring it", other);
            return Ok(inline.clone());
        }
    };

    let path = absolute_path(Path::new(&file))?;
    debug!("options file (custom): {}", path.display());

    load_config_file(&path).map_err(|e| {
        error!("failed to load custom configuration {}: {}", path.display(), e);
        e
    })
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Read and parse a configuration file, dispatching on its extension:
/// `.toml` parses as TOML, anything else as JSON. The document must be a
/// mapping.
fn load_config_file(path: &Path) -> Result<Map<String, Value>> {
    let contents = fs::read_to_string(path)?;

    let value: Value = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
        toml::from_str(&contents).map_err(|e| {
            ManifoldError::ConfigError(format!("invalid TOML in {}: {}", path.display(), e))
        })?
    } else {
        serde_json::from_str(&contents).map_err(|e| {
            ManifoldError::ConfigError(format!("invalid JSON in {}: {}", path.display(), e))
        })?
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ManifoldError::ConfigError(format!(
            "configuration in {} must be a mapping",
            path.display()
        ))),
    }
}

/// Right-biased merge: overlay wins key by key, recursing into nested
/// mappings and replacing everything else wholesale.
pub fn deep_merge(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(nested)), Value::Object(incoming)) => {
                deep_merge(nested, incoming);
            }
            (_, incoming) => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Ordered list of enabled reporter names. Accepts a comma-separated string
/// or an array of names; every name is trimmed, and empty names pass
/// through for the loader to report.
pub fn enabled_reporters(resolved: &Map<String, Value>) -> Vec<String> {
    match resolved.get(ENABLED_KEY) {
        None => vec![DEFAULT_REPORTER.to_string()],
        Some(Value::String(list)) => list.split(',').map(|n| n.trim().to_string()).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|n| n.trim().to_string())
            .collect(),
        Some(other) => {
            warn!(
                "reporterEnabled must be a string or an array, found {}; falling back to \"{}\"",
                other, DEFAULT_REPORTER
            );
            vec![DEFAULT_REPORTER.to_string()]
        }
    }
}

/// Options for one reporter: the common `reporterOptions` block overlaid by
/// the reporter's `<camelCasedName>ReporterOptions` block, with output
/// overrides substituted into matching string values.
pub fn reporter_options(resolved: &Map<String, Value>, name: &str) -> ReporterOptions {
    let mut options = match resolved.get(COMMON_OPTIONS_KEY) {
        Some(Value::Object(common)) => common.clone(),
        _ => Map::new(),
    };
    debug!("reporter options (common) {}: {:?}", name, options);

    let overlay_key = format!("{}{}", camel_case(name), OPTIONS_SUFFIX);
    if let Some(Value::Object(overlay)) = resolved.get(&overlay_key) {
        debug!("reporter options (overlay) {}: {:?}", name, overlay);
        deep_merge(&mut options, overlay);
    }

    for (target, key, output) in output_overrides(resolved) {
        if target != name {
            continue;
        }
        let substituted = match options.get(&key) {
            Some(Value::String(value)) => value.replace(OUTPUT_PLACEHOLDER, &output),
            _ => continue,
        };
        options.insert(key, Value::String(substituted));
    }

    debug!("reporter options (resolved) {}: {:?}", name, options);
    options
}

/// Output overrides as `(target, key, value)` triples. Accepts either a
/// pre-structured array of triples or a `name+key+value` string with
/// entries joined by `:`. Malformed entries are skipped; parts beyond the
/// third are ignored.
fn output_overrides(resolved: &Map<String, Value>) -> Vec<(String, String, String)> {
    let raw = resolved
        .get(OUTPUT_KEY)
        .or_else(|| resolved.get(LEGACY_OUTPUT_KEY));

    match raw {
        Some(Value::String(spec)) => spec
            .split(':')
            .filter_map(|entry| {
                let mut parts = entry.split('+');
                Some((
                    parts.next()?.to_string(),
                    parts.next()?.to_string(),
                    parts.next()?.to_string(),
                ))
            })
            .collect(),
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| {
                let parts = entry.as_array()?;
                Some((
                    parts.first()?.as_str()?.to_string(),
                    parts.get(1)?.as_str()?.to_string(),
                    parts.get(2)?.as_str()?.to_string(),
                ))
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Lowercase-camel form of a reporter name: `json-stream` → `jsonStream`.
/// Splits on `-`, `_`, space and `.`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut first = true;
    for segment in name.split(|c: char| matches!(c, '-' | '_' | ' ' | '.')) {
        if segment.is_empty() {
            continue;
        }
        let lower = segment.to_lowercase();
        if first {
            out.push_str(&lower);
            first = false;
        } else {
            let mut chars = lower.chars();
            if let Some(c) = chars.next() {
                out.extend(c.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_deep_merge_is_right_biased() {
        let mut base = map(json!({"x": 1, "y": 2}));
        deep_merge(&mut base, &map(json!({"y": 3})));
        deep_merge(&mut base, &map(json!({"y": 4, "z": 5})));
        assert_eq!(Value::Object(base), json!({"x": 1, "y": 4, "z": 5}));
    }

    #[test]
    fn test_deep_merge_recurses_into_mappings() {
        let mut base = map(json!({"o": {"a": 1, "b": 2}, "k": 1}));
        deep_merge(&mut base, &map(json!({"o": {"b": 3, "c": 4}})));
        assert_eq!(
            Value::Object(base),
            json!({"o": {"a": 1, "b": 3, "c": 4}, "k": 1})
        );
    }

    #[test]
    fn test_deep_merge_replaces_arrays_wholesale() {
        let mut base = map(json!({"list": [1, 2, 3], "scalar": {"a": 1}}));
        deep_merge(&mut base, &map(json!({"list": [9], "scalar": 7})));
        assert_eq!(Value::Object(base), json!({"list": [9], "scalar": 7}));
    }

    #[test]
    fn test_enabled_reporters_splits_and_trims() {
        let resolved = map(json!({"reporterEnabled": "a, b ,c"}));
        assert_eq!(enabled_reporters(&resolved), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_enabled_reporters_keeps_empty_names() {
        let resolved = map(json!({"reporterEnabled": "a,,b"}));
        assert_eq!(enabled_reporters(&resolved), vec!["a", "", "b"]);
    }

    #[test]
    fn test_enabled_reporters_accepts_array() {
        let resolved = map(json!({"reporterEnabled": [" text", "json ", 7]}));
        assert_eq!(enabled_reporters(&resolved), vec!["text", "json"]);
    }

    #[test]
    fn test_enabled_reporters_default() {
        assert_eq!(enabled_reporters(&Map::new()), vec![DEFAULT_REPORTER]);

        let resolved = map(json!({"reporterEnabled": 7}));
        assert_eq!(enabled_reporters(&resolved), vec![DEFAULT_REPORTER]);
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("json"), "json");
        assert_eq!(camel_case("json-stream"), "jsonStream");
        assert_eq!(camel_case("mocha-junit-reporter"), "mochaJunitReporter");
        assert_eq!(camel_case("Custom_Reporter"), "customReporter");
        assert_eq!(camel_case("a.b c"), "aBC");
        assert_eq!(camel_case(""), "");
    }

    #[test]
    fn test_reporter_options_overlay_wins_for_named_reporter() {
        let resolved = map(json!({
            "reporterOptions": {"output": "out", "verbose": true},
            "jsonReporterOptions": {"output": "json-out"}
        }));

        let json_options = reporter_options(&resolved, "json");
        assert_eq!(json_options.get("output"), Some(&json!("json-out")));
        assert_eq!(json_options.get("verbose"), Some(&json!(true)));

        let csv_options = reporter_options(&resolved, "csv");
        assert_eq!(csv_options.get("output"), Some(&json!("out")));
    }

    #[test]
    fn test_reporter_options_camel_cases_the_overlay_key() {
        let resolved = map(json!({
            "jsonStreamReporterOptions": {"buffered": true}
        }));
        let options = reporter_options(&resolved, "json-stream");
        assert_eq!(options.get("buffered"), Some(&json!(true)));
    }

    #[test]
    fn test_output_substitution_from_string_spec() {
        let resolved = map(json!({
            "reporterOptions": {"output": "report-{id}.xml", "other": "keep-{id}"},
            "manifoldOutput": "json+output+42"
        }));

        let json_options = reporter_options(&resolved, "json");
        assert_eq!(json_options.get("output"), Some(&json!("report-42.xml")));
        // Other keys and other reporters stay untouched.
        assert_eq!(json_options.get("other"), Some(&json!("keep-{id}")));
        let csv_options = reporter_options(&resolved, "csv");
        assert_eq!(csv_options.get("output"), Some(&json!("report-{id}.xml")));
    }

    #[test]
    fn test_output_substitution_from_structured_spec() {
        let resolved = map(json!({
            "reporterOptions": {"output": "run-{id}.json"},
            "manifoldOutput": [["json", "output", "7"]]
        }));
        let options = reporter_options(&resolved, "json");
        assert_eq!(options.get("output"), Some(&json!("run-7.json")));
    }

    #[test]
    fn test_output_substitution_multiple_entries() {
        let resolved = map(json!({
            "reporterOptions": {"output": "{id}.out"},
            "manifoldOutput": "csv+output+1:json+output+2"
        }));
        assert_eq!(
            reporter_options(&resolved, "csv").get("output"),
            Some(&json!("1.out"))
        );
        assert_eq!(
            reporter_options(&resolved, "json").get("output"),
            Some(&json!("2.out"))
        );
    }

    #[test]
    fn test_malformed_output_overrides_are_skipped() {
        let resolved = map(json!({
            "reporterOptions": {"output": "x-{id}"},
            "manifoldOutput": "json+output"
        }));
        assert_eq!(
            reporter_options(&resolved, "json").get("output"),
            Some(&json!("x-{id}"))
        );

        let resolved = map(json!({
            "reporterOptions": {"output": "x-{id}"},
            "manifoldOutput": [["json", "output"], [1, 2, 3]]
        }));
        assert_eq!(
            reporter_options(&resolved, "json").get("output"),
            Some(&json!("x-{id}"))
        );

        let resolved = map(json!({
            "reporterOptions": {"output": "x-{id}"},
            "manifoldOutput": 42
        }));
        assert_eq!(
            reporter_options(&resolved, "json").get("output"),
            Some(&json!("x-{id}"))
        );
    }

    #[test]
    fn test_output_override_extra_parts_ignored() {
        let resolved = map(json!({
            "reporterOptions": {"output": "x-{id}"},
            "manifoldOutput": "json+output+9+zzz"
        }));
        assert_eq!(
            reporter_options(&resolved, "json").get("output"),
            Some(&json!("x-9"))
        );
    }

    #[test]
    fn test_substitution_only_touches_string_values() {
        let resolved = map(json!({
            "reporterOptions": {"output": 5},
            "manifoldOutput": "json+output+9"
        }));
        assert_eq!(
            reporter_options(&resolved, "json").get("output"),
            Some(&json!(5))
        );
    }

    #[test]
    fn test_legacy_output_key_is_coalesced() {
        let inline = map(json!({"multiplexOutput": "json+output+3"}));
        let resolved = resolve_options(&inline).unwrap();
        assert_eq!(resolved.get(OUTPUT_KEY), Some(&json!("json+output+3")));
    }

    #[test]
    fn test_legacy_output_key_read_from_resolved_config() {
        // A file-sourced legacy key is never coalesced; the per-reporter
        // resolver still honors it.
        let resolved = map(json!({
            "reporterOptions": {"output": "x-{id}"},
            "multiplexOutput": "json+output+4"
        }));
        assert_eq!(
            reporter_options(&resolved, "json").get("output"),
            Some(&json!("x-4"))
        );
    }

    #[test]
    fn test_resolve_options_inline_overrides_defaults() {
        let inline = map(json!({"reporterEnabled": "json,csv", "extra": 1}));
        let resolved = resolve_options(&inline).unwrap();
        assert_eq!(resolved.get("reporterEnabled"), Some(&json!("json,csv")));
        assert_eq!(resolved.get("extra"), Some(&json!(1)));
    }

    #[test]
    fn test_resolve_options_defaults_fill_gaps() {
        let resolved = resolve_options(&Map::new()).unwrap();
        assert_eq!(resolved.get("reporterEnabled"), Some(&json!("text")));
    }

    #[test]
    fn test_options_builders_place_keys() {
        let options = MultiReporterOptions::new()
            .with_enabled("text,json")
            .with_config_file("custom.json")
            .with_output_override("json+output+1")
            .with_common_option("verbose", json!(true));

        let inline = &options.reporter_options;
        assert_eq!(inline.get("reporterEnabled"), Some(&json!("text,json")));
        assert_eq!(inline.get("configFile"), Some(&json!("custom.json")));
        assert_eq!(inline.get(OUTPUT_KEY), Some(&json!("json+output+1")));
        assert_eq!(
            inline.get("reporterOptions"),
            Some(&json!({"verbose": true}))
        );
    }

    #[test]
    fn test_options_deserialize_from_camel_case() {
        let options: MultiReporterOptions = serde_json::from_value(json!({
            "reporterOptions": {"reporterEnabled": "csv"}
        }))
        .unwrap();
        assert_eq!(
            options.reporter_options.get("reporterEnabled"),
            Some(&json!("csv"))
        );
    }
}
