//! Dependency extraction from package manifests.

use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::inventory::RepositoryInventory;
use crate::source::base_name;

/// Dependencies declared across every fetched manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencySet {
    /// Runtime dependencies, lowercased.
    pub dependencies: BTreeSet<String>,
    /// Development and test dependencies, lowercased.
    pub dev_dependencies: BTreeSet<String>,
    /// npm script names.
    pub scripts: BTreeSet<String>,
    /// Paths of manifests that were parsed successfully.
    pub manifests: Vec<String>,
}

impl DependencySet {
    /// Whether a dependency is declared, either exactly or as the last
    /// segment of a module path (`github.com/gin-gonic/gin` matches `gin`).
    pub fn has(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let suffix = format!("/{name}");
        self.all()
            .any(|dependency| *dependency == name || dependency.ends_with(&suffix))
    }

    /// Whether an npm script with this name is declared.
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains(name)
    }

    /// Runtime and development dependencies together.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.dependencies.iter().chain(self.dev_dependencies.iter())
    }

    /// Number of distinct declared dependencies.
    pub fn len(&self) -> usize {
        self.dependencies.union(&self.dev_dependencies).count()
    }

    /// Whether no dependency was found.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.dev_dependencies.is_empty()
    }
}

/// Parse every fetched manifest in the inventory.
///
/// A manifest that fails to parse is logged and treated as absent.
pub fn collect_dependencies(inventory: &RepositoryInventory) -> DependencySet {
    let mut set = DependencySet::default();
    for (path, content) in inventory.contents() {
        let parsed = match base_name(path).to_lowercase().as_str() {
            "package.json" => parse_package_json(content, &mut set),
            "requirements.txt" => {
                parse_requirements(content, &mut set);
                Ok(())
            }
            "pyproject.toml" => parse_pyproject(content, &mut set),
            "cargo.toml" => parse_cargo_toml(content, &mut set),
            "go.mod" => {
                parse_go_mod(content, &mut set);
                Ok(())
            }
            _ => continue,
        };
        match parsed {
            Ok(()) => set.manifests.push(path.to_string()),
            Err(err) => debug!("ignoring manifest {path}: {err}"),
        }
    }
    set
}

fn parse_package_json(content: &str, set: &mut DependencySet) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let keys = |field: &str| -> Vec<String> {
        value
            .get(field)
            .and_then(serde_json::Value::as_object)
            .map(|object| object.keys().cloned().collect())
            .unwrap_or_default()
    };
    for name in keys("dependencies").into_iter().chain(keys("peerDependencies")) {
        set.dependencies.insert(name.to_lowercase());
    }
    for name in keys("devDependencies") {
        set.dev_dependencies.insert(name.to_lowercase());
    }
    set.scripts.extend(keys("scripts"));
    Ok(())
}

fn parse_requirements(content: &str, set: &mut DependencySet) {
    for line in content.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() || line.starts_with('-') {
            continue;
        }
        if let Some(name) = requirement_name(line) {
            set.dependencies.insert(name);
        }
    }
}

/// Package name of a PEP 508 requirement string.
fn requirement_name(requirement: &str) -> Option<String> {
    let name: String = requirement
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

fn parse_pyproject(content: &str, set: &mut DependencySet) -> Result<()> {
    let value = parse_toml(content)?;

    let requirements = value
        .get("project")
        .and_then(|project| project.get("dependencies"))
        .and_then(toml::Value::as_array);
    for requirement in requirements.into_iter().flatten() {
        if let Some(name) = requirement.as_str().and_then(requirement_name) {
            set.dependencies.insert(name);
        }
    }

    let poetry = value.get("tool").and_then(|tool| tool.get("poetry"));
    for (field, dev) in [("dependencies", false), ("dev-dependencies", true)] {
        let table = poetry
            .and_then(|poetry| poetry.get(field))
            .and_then(toml::Value::as_table);
        for name in table.into_iter().flat_map(|table| table.keys()) {
            if name.eq_ignore_ascii_case("python") {
                continue;
            }
            insert(set, name, dev);
        }
    }
    Ok(())
}

fn parse_cargo_toml(content: &str, set: &mut DependencySet) -> Result<()> {
    let value = parse_toml(content)?;

    let sections = [
        (value.get("dependencies"), false),
        (
            value
                .get("workspace")
                .and_then(|workspace| workspace.get("dependencies")),
            false,
        ),
        (value.get("dev-dependencies"), true),
    ];
    for (section, dev) in sections {
        let table = section.and_then(toml::Value::as_table);
        for name in table.into_iter().flat_map(|table| table.keys()) {
            insert(set, name, dev);
        }
    }
    Ok(())
}

fn parse_go_mod(content: &str, set: &mut DependencySet) {
    let mut in_block = false;
    for line in content.lines() {
        let line = line.split("//").next().unwrap_or_default().trim();
        if in_block {
            if line == ")" {
                in_block = false;
            } else if let Some(module) = line.split_whitespace().next() {
                set.dependencies.insert(module.to_lowercase());
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("require") {
            let rest = rest.trim();
            if rest == "(" {
                in_block = true;
            } else if let Some(module) = rest.split_whitespace().next() {
                set.dependencies.insert(module.to_lowercase());
            }
        }
    }
}

fn parse_toml(content: &str) -> Result<toml::Value> {
    toml::from_str(content).map_err(|err| AuditError::Decode(err.to_string()))
}

fn insert(set: &mut DependencySet, name: &str, dev: bool) {
    let name = name.to_lowercase();
    if dev {
        set.dev_dependencies.insert(name);
    } else {
        set.dependencies.insert(name);
    }
}

#[cfg(test)]
mod tests {
    use super::collect_dependencies;
    use crate::inventory::fixture;

    #[test]
    fn parses_package_json_sections() {
        let inventory = fixture(&[(
            "package.json",
            r#"{
                "dependencies": {"React": "^18", "next": "14"},
                "devDependencies": {"jest": "29"},
                "scripts": {"test": "jest", "build": "next build"}
            }"#,
        )]);
        let set = collect_dependencies(&inventory);
        assert!(set.has("react"));
        assert!(set.has("next"));
        assert!(set.dev_dependencies.contains("jest"));
        assert!(set.has_script("test"));
        assert_eq!(set.manifests, vec!["package.json"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn parses_python_manifests() {
        let inventory = fixture(&[
            (
                "requirements.txt",
                "# web\nFlask==3.0\nrequests>=2 ; python_version > '3'\n-r dev.txt\nnumpy[extra]\n",
            ),
            (
                "service/pyproject.toml",
                "[project]\ndependencies = [\"fastapi>=0.110\"]\n\n[tool.poetry.dependencies]\npython = \"^3.11\"\npydantic = \"^2\"\n\n[tool.poetry.dev-dependencies]\npytest = \"^8\"\n",
            ),
        ]);
        let set = collect_dependencies(&inventory);
        for name in ["flask", "requests", "numpy", "fastapi", "pydantic", "pytest"] {
            assert!(set.has(name), "missing {name}");
        }
        assert!(!set.has("python"));
    }

    #[test]
    fn parses_cargo_and_go_manifests() {
        let inventory = fixture(&[
            (
                "Cargo.toml",
                "[package]\nname = \"demo\"\n\n[dependencies]\ntokio = \"1\"\nserde = { version = \"1\" }\n\n[dev-dependencies]\nmockall = \"0.12\"\n",
            ),
            (
                "go.mod",
                "module example.com/demo\n\nrequire github.com/spf13/cobra v1.8.0\n\nrequire (\n\tgithub.com/gin-gonic/gin v1.9.1 // indirect\n)\n",
            ),
        ]);
        let set = collect_dependencies(&inventory);
        assert!(set.has("tokio"));
        assert!(set.has("serde"));
        assert!(set.dev_dependencies.contains("mockall"));
        assert!(set.has("cobra"));
        assert!(set.has("gin"));
        assert!(!set.has("demo"));
    }

    #[test]
    fn invalid_manifest_is_treated_as_absent() {
        let inventory = fixture(&[
            ("package.json", "{ not json"),
            ("Cargo.toml", "[dependencies\n"),
        ]);
        let set = collect_dependencies(&inventory);
        assert!(set.is_empty());
        assert!(set.manifests.is_empty());
    }
}
