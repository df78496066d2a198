// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/agentcore/config.yaml"));

    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("agentcore/config.yaml"));
    }

    paths.push(PathBuf::from(".agentcore.yaml"));
    paths.push(PathBuf::from("agentcore.yaml"));

    paths
}

/// Load configuration by merging all discovered YAML files, then an explicit
/// path (e.g. the `--config` CLI flag or `AGENTCORE_CONFIG` env var), in
/// ascending priority order. Missing files are skipped silently except for
/// the explicit path, which must exist if given.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

/// Environment variables always win over file-based config (see spec §6).
fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("HOOK_ALLOWLIST") {
        config.hooks.allowlist = Some(split_csv(&v));
    }
    if let Ok(v) = std::env::var("TOOL_ALLOWLIST") {
        config.tools.allowlist = Some(split_csv(&v));
    }
    if let Ok(v) = std::env::var("TOOL_MODULES") {
        config.tools.modules = split_csv(&v);
    }
    if let Ok(v) = std::env::var("GPTME_SHELL_TIMEOUT") {
        if let Ok(secs) = v.parse() {
            config.agent.shell_timeout_secs = secs;
        }
    }
    if let Ok(v) = std::env::var("GPTME_BREAK_ON_TOOLUSE") {
        config.agent.break_on_tooluse = v != "0";
    }
}

fn split_csv(v: &str) -> Vec<String> {
    v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        let src = val("x: 2");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val("model:\n  provider: mock\n  name: a");
        let src = val("model:\n  name: b");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["model"]["provider"].as_str(), Some("mock"));
        assert_eq!(dst["model"]["name"].as_str(), Some("b"));
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/agentcore_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_with_no_extra_path_returns_defaults() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.model.provider, "mock");
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "model:\n  provider: anthropic\n  name: test-model").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.model.provider, "anthropic");
        assert_eq!(cfg.model.name, "test-model");
    }

    #[test]
    fn env_override_wins_over_file() {
        std::env::set_var("TOOL_ALLOWLIST", "shell,save");
        let cfg = load(None).unwrap();
        assert_eq!(cfg.tools.allowlist, Some(vec!["shell".to_string(), "save".to_string()]));
        std::env::remove_var("TOOL_ALLOWLIST");
    }
}
