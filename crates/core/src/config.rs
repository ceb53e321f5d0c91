//! Typed key=value configuration dictionary.
//!
//! The core never parses text itself; it only ever calls the typed getters on
//! [`ConfigSource`]. [`TextConfig`] is the default collaborator, parsing the
//! `Key = value` / `Key = {v1, v2, v3}` grammar the species registry and
//! suppression policy are configured with.

use crate::error::{SimError, SimResult};
use rustc_hash::FxHashMap;

/// A single parsed configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StrArray(Vec<String>),
}

/// Typed key -> value lookup, implemented by whatever loaded the run's configuration.
pub trait ConfigSource {
    fn has_key(&self, key: &str) -> bool;
    fn get_int(&self, key: &str) -> SimResult<i64>;
    fn get_float(&self, key: &str) -> SimResult<f64>;
    fn get_bool(&self, key: &str) -> SimResult<bool>;
    fn get_string(&self, key: &str) -> SimResult<String>;
    fn get_int_array(&self, key: &str) -> SimResult<Vec<i64>>;
    fn get_float_array(&self, key: &str) -> SimResult<Vec<f64>>;
    fn get_string_array(&self, key: &str) -> SimResult<Vec<String>>;

    /// Fetch a float array and require it to have exactly `len` elements, naming the
    /// key in the error the way the original model's `pdGet` arity check does.
    fn get_float_array_exact(&self, key: &str, len: usize) -> SimResult<Vec<f64>> {
        let values = self.get_float_array(key)?;
        if values.len() != len {
            return Err(SimError::Config(format!(
                "expected array size of {len} for key: {key}, got {}",
                values.len()
            )));
        }
        Ok(values)
    }

    /// Fetch an optional float, returning `default` when the key is absent.
    fn get_float_or(&self, key: &str, default: f64) -> SimResult<f64> {
        if self.has_key(key) {
            self.get_float(key)
        } else {
            Ok(default)
        }
    }

    /// Fetch an optional bool, returning `default` when the key is absent.
    fn get_bool_or(&self, key: &str, default: bool) -> SimResult<bool> {
        if self.has_key(key) {
            self.get_bool(key)
        } else {
            Ok(default)
        }
    }
}

/// A config dictionary parsed from a flat `Key = value` text format.
#[derive(Debug, Clone, Default)]
pub struct TextConfig {
    values: FxHashMap<String, ConfigValue>,
}

impl TextConfig {
    /// Parse configuration text. Lines starting with `#` and blank lines are skipped.
    pub fn parse(text: &str) -> SimResult<Self> {
        let mut values = FxHashMap::default();
        for (lineno, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                SimError::Config(format!("line {}: expected 'Key = value', got {raw_line:?}", lineno + 1))
            })?;
            let key = key.trim().to_string();
            let value = parse_value(value.trim())?;
            values.insert(key, value);
        }
        Ok(Self { values })
    }

    fn lookup(&self, key: &str) -> SimResult<&ConfigValue> {
        self.values
            .get(key)
            .ok_or_else(|| SimError::Config(format!("missing required key: {key}")))
    }

    /// Insert or overwrite a value; used by tests to build configs in-process.
    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.values.insert(key.into(), value);
    }
}

fn parse_value(text: &str) -> SimResult<ConfigValue> {
    if let Some(inner) = text.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let parts: Vec<&str> = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(str::trim).collect()
        };
        if parts.iter().all(|p| p.parse::<f64>().is_ok()) {
            let floats: Vec<f64> = parts.iter().map(|p| p.parse().unwrap()).collect();
            if floats.iter().all(|f| f.fract() == 0.0) {
                return Ok(ConfigValue::IntArray(floats.iter().map(|f| *f as i64).collect()));
            }
            return Ok(ConfigValue::FloatArray(floats));
        }
        return Ok(ConfigValue::StrArray(parts.into_iter().map(str::to_string).collect()));
    }
    if text.eq_ignore_ascii_case("true") {
        return Ok(ConfigValue::Bool(true));
    }
    if text.eq_ignore_ascii_case("false") {
        return Ok(ConfigValue::Bool(false));
    }
    if let Ok(i) = text.parse::<i64>() {
        return Ok(ConfigValue::Int(i));
    }
    if let Ok(f) = text.parse::<f64>() {
        return Ok(ConfigValue::Float(f));
    }
    Ok(ConfigValue::Str(text.trim_matches('"').to_string()))
}

impl ConfigSource for TextConfig {
    fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_int(&self, key: &str) -> SimResult<i64> {
        match self.lookup(key)? {
            ConfigValue::Int(i) => Ok(*i),
            ConfigValue::Float(f) => Ok(*f as i64),
            other => Err(SimError::Config(format!("key {key} is not an int: {other:?}"))),
        }
    }

    fn get_float(&self, key: &str) -> SimResult<f64> {
        match self.lookup(key)? {
            ConfigValue::Float(f) => Ok(*f),
            ConfigValue::Int(i) => Ok(*i as f64),
            other => Err(SimError::Config(format!("key {key} is not a float: {other:?}"))),
        }
    }

    fn get_bool(&self, key: &str) -> SimResult<bool> {
        match self.lookup(key)? {
            ConfigValue::Bool(b) => Ok(*b),
            other => Err(SimError::Config(format!("key {key} is not a bool: {other:?}"))),
        }
    }

    fn get_string(&self, key: &str) -> SimResult<String> {
        match self.lookup(key)? {
            ConfigValue::Str(s) => Ok(s.clone()),
            other => Err(SimError::Config(format!("key {key} is not a string: {other:?}"))),
        }
    }

    fn get_int_array(&self, key: &str) -> SimResult<Vec<i64>> {
        match self.lookup(key)? {
            ConfigValue::IntArray(v) => Ok(v.clone()),
            other => Err(SimError::Config(format!("key {key} is not an int array: {other:?}"))),
        }
    }

    fn get_float_array(&self, key: &str) -> SimResult<Vec<f64>> {
        match self.lookup(key)? {
            ConfigValue::FloatArray(v) => Ok(v.clone()),
            ConfigValue::IntArray(v) => Ok(v.iter().map(|i| *i as f64).collect()),
            other => Err(SimError::Config(format!("key {key} is not a float array: {other:?}"))),
        }
    }

    fn get_string_array(&self, key: &str) -> SimResult<Vec<String>> {
        match self.lookup(key)? {
            ConfigValue::StrArray(v) => Ok(v.clone()),
            other => Err(SimError::Config(format!("key {key} is not a string array: {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalars_and_arrays() {
        let cfg = TextConfig::parse(
            "# comment\nBSpruce.FireProb = 0.01\nBSpruce.History = 15\nBSpruce.SeedSource = {1.0, 2.5}\nBSpruce.IsActive = true\n",
        )
        .unwrap();
        assert_eq!(cfg.get_float("BSpruce.FireProb").unwrap(), 0.01);
        assert_eq!(cfg.get_int("BSpruce.History").unwrap(), 15);
        assert_eq!(cfg.get_float_array("BSpruce.SeedSource").unwrap(), vec![1.0, 2.5]);
        assert!(cfg.get_bool("BSpruce.IsActive").unwrap());
    }

    #[test]
    fn missing_key_is_config_error() {
        let cfg = TextConfig::default();
        let err = cfg.get_float("Nope").unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn arity_check_names_the_key() {
        let mut cfg = TextConfig::default();
        cfg.set("BSpruce.SeedEstParms", ConfigValue::FloatArray(vec![1.0]));
        let err = cfg.get_float_array_exact("BSpruce.SeedEstParms", 2).unwrap_err();
        match err {
            SimError::Config(msg) => assert!(msg.contains("BSpruce.SeedEstParms")),
            _ => panic!("expected config error"),
        }
    }
}
