//! Configuration file reading.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{SpecError, SpecResult};
use crate::models::ConfigSpec;

/// Reader for configuration files.
pub struct ConfigReader;

impl ConfigReader {
    /// Read a configuration file, choosing the format from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> SpecResult<ConfigSpec> {
        let path = path.as_ref();
        debug!("Reading configuration from {:?}", path);

        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Err(SpecError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn from_yaml_str(content: &str) -> SpecResult<ConfigSpec> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> SpecResult<ConfigSpec> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParamValue;
    use tempfile::tempdir;

    const YAML: &str = r#"
version: "1.0"
global:
  env_allowlist: [HOME, PATH]
  vars:
    - "BASE=/opt"
    - "APP=%{BASE}/app"
groups:
  - name: build
    env_allowlist: []
    commands:
      - name: compile
        cmd: make
        args: ["-C", "%{APP}"]
      - name: deploy
        template: rsync
        params:
          src: "%{APP}"
          flags: ["-a", "-z"]
templates:
  rsync:
    cmd: /usr/bin/rsync
    args: ["${@flags}", "${src}", "/srv"]
"#;

    #[test]
    fn test_read_yaml() {
        let config = ConfigReader::from_yaml_str(YAML).unwrap();
        assert_eq!(config.global.vars.len(), 2);
        assert_eq!(config.groups[0].env_allowlist, Some(vec![]));
        assert_eq!(config.groups[0].commands.len(), 2);

        let deploy = &config.groups[0].commands[1];
        assert_eq!(deploy.template.as_deref(), Some("rsync"));
        assert_eq!(
            deploy.params.get("flags"),
            Some(&ParamValue::from(vec!["-a", "-z"]))
        );
        assert!(config.templates.contains_key("rsync"));
    }

    #[test]
    fn test_read_toml() {
        let toml = r#"
[global]
vars = ["A=1"]

[[groups]]
name = "g"

[[groups.commands]]
name = "c"
cmd = "echo"
args = ["%{A}"]
"#;
        let config = ConfigReader::from_toml_str(toml).unwrap();
        assert!(config.global.env_allowlist.is_none());
        assert_eq!(config.groups[0].commands[0].cmd.as_deref(), Some("echo"));
    }

    #[test]
    fn test_from_path_by_extension() {
        let temp = tempdir().unwrap();
        let yaml_path = temp.path().join("runner.yaml");
        fs::write(&yaml_path, YAML).unwrap();
        assert!(ConfigReader::from_path(&yaml_path).is_ok());

        let other = temp.path().join("runner.ini");
        fs::write(&other, "x").unwrap();
        assert!(matches!(
            ConfigReader::from_path(&other),
            Err(SpecError::UnsupportedFormat(_))
        ));
    }
}
