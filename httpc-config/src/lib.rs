//! Loader for `httpc::Config` with YAML + environment overlays.
//!
//! Recognizes a flat or nested YAML document matching [`httpc::config::Config`]'s
//! shape (`timeouts`, `pool`, `tls`, `retry`, `redirect`, `security`, `proxy`,
//! plus the top-level scalars), expands `${VAR}` placeholders in string
//! values before deserializing, and layers `HTTPC_`-prefixed environment
//! variables over the file.

use config::{Config as RawConfig, ConfigError, Environment, File};
use httpc::Config;
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides) behind
/// the loader pattern the workspace already uses for structured config.
pub struct HttpcConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    preset: Config,
}

impl Default for HttpcConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpcConfigLoader {
    /// Start with sensible defaults: the `Default` preset, overridable by
    /// an attached file and then by `HTTPC_`-prefixed env vars.
    ///
    /// ```
    /// use httpc_config::HttpcConfigLoader;
    ///
    /// let config = HttpcConfigLoader::new()
    ///     .with_yaml_str("user_agent: my-app/1.0")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.user_agent, "my-app/1.0");
    /// ```
    pub fn new() -> Self {
        let builder =
            RawConfig::builder().add_source(Environment::with_prefix("HTTPC").separator("__"));
        Self {
            builder,
            preset: Config::default(),
        }
    }

    /// Start from a named preset instead of [`Config::default`] before
    /// applying file/env overlays.
    pub fn with_preset(mut self, preset: Config) -> Self {
        self.preset = preset;
        self
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self.builder.add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use httpc_config::HttpcConfigLoader;
    ///
    /// let config = HttpcConfigLoader::new()
    ///     .with_yaml_str("max_response_body: 1048576\nretry:\n  max_attempts: 5")
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.max_response_body, 1048576);
    /// assert_eq!(config.retry.max_attempts, 5);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into
    /// [`httpc::Config`], overlaying onto the chosen preset.
    ///
    /// ```
    /// use httpc_config::HttpcConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOWNSTREAM_PROXY", "http://proxy.internal:8080"); }
    ///
    /// let config = HttpcConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// proxy:
    ///   url: "${DOWNSTREAM_PROXY}"
    ///   enable_system_proxy: false
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.proxy.url.as_deref(), Some("http://proxy.internal:8080"));
    ///
    /// unsafe { std::env::remove_var("DOWNSTREAM_PROXY"); }
    /// ```
    pub fn load(self) -> Result<Config, ConfigError> {
        let raw = self.builder.build()?;

        let mut preset_value = serde_json::to_value(&self.preset)
            .map_err(|e| ConfigError::Message(format!("failed to serialize preset: {e}")))?;
        let overlay_value: Value = raw.try_deserialize()?;
        merge_json(&mut preset_value, &overlay_value);
        expand_env_in_value(&mut preset_value);

        serde_json::from_value(preset_value)
            .map_err(|e| ConfigError::Message(format!("failed to deserialize config: {e}")))
    }
}

/// Deep-merge `overlay` onto `base`: objects merge key-by-key, anything
/// else in `overlay` replaces `base` wholesale.
fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge_json(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}
