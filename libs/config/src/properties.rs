//! `.properties` file source
//!
//! Accepts `key=value`, `key: value` and `key value`, `#`/`!` comment lines,
//! and trailing-backslash line continuations. Keys are folded to lowercase so
//! that file keys (`vpnName`), environment keys (`FIXVERIFY_VPNNAME`) and CLI
//! overrides land on the same path.

use crate::error::{ConfigError, Result};
use config_crate::{Map, Source, Value, ValueKind};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct PropertiesFile {
    origin: String,
    entries: Vec<(String, String)>,
}

impl PropertiesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text, path.display().to_string()))
    }

    pub fn parse(text: &str, origin: impl Into<String>) -> Self {
        let mut entries = Vec::new();
        let mut pending = String::new();

        for raw in text.lines() {
            let line = raw.trim_start();
            if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
                continue;
            }

            match line.strip_suffix('\\') {
                Some(head) => {
                    pending.push_str(head);
                    continue;
                }
                None => pending.push_str(line),
            }

            if let Some(entry) = split_entry(&pending) {
                entries.push(entry);
            }
            pending.clear();
        }
        if let Some(entry) = split_entry(&pending) {
            entries.push(entry);
        }

        Self {
            origin: origin.into(),
            entries,
        }
    }

    /// Parsed pairs in file order; later duplicates override earlier ones
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let split = line
        .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
        .unwrap_or(line.len());
    let key = line[..split].trim();
    let mut rest = line[split..].trim_start();
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped;
    }
    if key.is_empty() {
        return None;
    }
    Some((key.to_lowercase(), rest.trim().to_string()))
}

impl Source for PropertiesFile {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> std::result::Result<Map<String, Value>, config_crate::ConfigError> {
        let mut map = Map::new();
        for (key, value) in &self.entries {
            map.insert(
                key.clone(),
                Value::new(Some(&self.origin), ValueKind::String(value.clone())),
            );
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separators_and_comments() {
        let props = PropertiesFile::parse(
            "# bus\n! legacy comment\nhost=broker:55555\nvpnName : default\n\nusername  ops \ntopic_oms=",
            "test",
        );
        assert_eq!(
            props.entries(),
            &[
                ("host".to_string(), "broker:55555".to_string()),
                ("vpnname".to_string(), "default".to_string()),
                ("username".to_string(), "ops".to_string()),
                ("topic_oms".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_value_keeps_later_separators() {
        let props = PropertiesFile::parse("originalLogPath=C:/logs/oms=1.log", "test");
        assert_eq!(props.entries()[0].1, "C:/logs/oms=1.log");
    }

    #[test]
    fn test_line_continuation() {
        let props = PropertiesFile::parse("ignoredTags=9,\\\n    10,\\\n    52\nstreams=OMS", "test");
        assert_eq!(props.entries()[0], ("ignoredtags".to_string(), "9,10,52".to_string()));
        assert_eq!(props.entries()[1].0, "streams");
    }

    #[test]
    fn test_collect_as_source() {
        let props = PropertiesFile::parse("serverPort=9000", "test");
        let map = props.collect().unwrap();
        assert_eq!(map["serverport"].clone().into_string().unwrap(), "9000");
    }

    #[test]
    fn test_missing_file() {
        let err = PropertiesFile::load(Path::new("/nonexistent/verifier.properties")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
