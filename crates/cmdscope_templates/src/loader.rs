//! Template loading from a directory of template files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use cmdscope_spec::Template;
use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{TemplateError, TemplateResult};
use crate::registry::TemplateRegistry;

/// On-disk layout of a template file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateFile {
    #[serde(default)]
    templates: BTreeMap<String, Template>,
}

/// Template loader.
pub struct TemplateLoader {
    templates_path: PathBuf,
}

impl TemplateLoader {
    /// Create a new template loader.
    pub fn new(templates_path: impl Into<PathBuf>) -> Self {
        Self {
            templates_path: templates_path.into(),
        }
    }

    /// Load every `.yaml`, `.yml` and `.toml` file directly inside the
    /// templates directory. A name defined in two files is an error.
    pub fn load_all(&self) -> TemplateResult<TemplateRegistry> {
        let mut registry = TemplateRegistry::new();

        if !self.templates_path.exists() {
            warn!("Templates directory does not exist: {:?}", self.templates_path);
            return Ok(registry);
        }

        for entry in WalkDir::new(&self.templates_path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| TemplateError::Load {
                path: self.templates_path.clone(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file() || !is_template_file(path) {
                continue;
            }

            let file_registry = self.load_file(path)?;
            info!(
                "Loaded {} template(s) from {:?}",
                file_registry.len(),
                path.file_name().unwrap_or_default()
            );
            registry.merge(file_registry)?;
        }

        Ok(registry)
    }

    /// Load the templates declared in a single file.
    pub fn load_file(&self, path: &Path) -> TemplateResult<TemplateRegistry> {
        debug!("Loading templates from {:?}", path);
        let content = fs::read_to_string(path)?;
        let file: TemplateFile = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        TemplateRegistry::from_map(&file.templates, &path.display().to_string())
    }
}

fn is_template_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml") | Some("toml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = tempdir().unwrap();
        let loader = TemplateLoader::new(temp.path().join("nope"));
        assert!(loader.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_load_yaml_and_toml() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("backup.yaml"),
            r#"
templates:
  restic:
    cmd: /usr/bin/restic
    args: ["backup", "${path}"]
"#,
        )
        .unwrap();
        fs::write(
            temp.path().join("build.toml"),
            r#"
[templates.make]
cmd = "make"
args = ["${@targets}"]
"#,
        )
        .unwrap();
        fs::write(temp.path().join("README.md"), "ignored").unwrap();

        let registry = TemplateLoader::new(temp.path()).load_all().unwrap();
        assert_eq!(registry.names(), vec!["make", "restic"]);
    }

    #[test]
    fn test_collision_across_files() {
        let temp = tempdir().unwrap();
        let body = "templates:\n  same:\n    cmd: echo\n";
        fs::write(temp.path().join("a.yaml"), body).unwrap();
        fs::write(temp.path().join("b.yml"), body).unwrap();

        assert!(matches!(
            TemplateLoader::new(temp.path()).load_all(),
            Err(TemplateError::DuplicateTemplateName { .. })
        ));
    }
}
