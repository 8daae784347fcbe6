//! `node_modules` lookup for bare specifiers.

use super::{resolve_relative, ImportResolver, ResolveError};
use crate::paths::{dirname, join};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

/// Export conditions tried, in order, for a browser ES module.
const CONDITIONS: &[&str] = &["browser", "import", "default"];

/// Resolves bare specifiers by walking up `node_modules` directories.
///
/// The walk starts at the importer's directory and stops at `root`. Importers
/// outside `root` never find a package. Relative specifiers resolve exactly like [`super::RelativeImportResolver`].
#[derive(Debug, Clone)]
pub struct NodeModulesResolver {
    root: String,
}

impl NodeModulesResolver {
    /// Create a resolver that never looks above `root`.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl ImportResolver for NodeModulesResolver {
    fn resolve(
        &self,
        importer: &str,
        specifier: &str,
    ) -> BoxFuture<'static, Result<String, ResolveError>> {
        if let Some(file_path) = resolve_relative(importer, specifier) {
            return future::ready(Ok(file_path)).boxed();
        }

        let root = self.root.clone();
        let importer = importer.to_string();
        let specifier = specifier.to_string();
        async move { resolve_bare(&root, &importer, &specifier).await }.boxed()
    }
}

/// Split `@scope/pkg/sub/path` into the package name and optional subpath.
fn split_package_specifier(specifier: &str) -> Option<(&str, Option<&str>)> {
    let name_segments = if specifier.starts_with('@') { 2 } else { 1 };

    let mut split_at = None;
    for (seen, (idx, _)) in specifier.match_indices('/').enumerate() {
        if seen + 1 == name_segments {
            split_at = Some(idx);
            break;
        }
    }

    let (name, subpath) = match split_at {
        Some(idx) => (&specifier[..idx], Some(&specifier[idx + 1..])),
        None => (specifier, None),
    };

    let valid_segment = |s: &str| !s.is_empty() && s != "." && s != "..";
    if !name.split('/').all(valid_segment) || name.split('/').count() != name_segments {
        return None;
    }
    if let Some(sub) = subpath {
        if !sub.split('/').all(valid_segment) {
            return None;
        }
    }

    Some((name, subpath))
}

async fn is_file(path: &str) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn is_dir(path: &str) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

fn conditional_entry(value: &Value) -> Option<&str> {
    match value {
        Value::String(entry) => Some(entry),
        Value::Object(map) => CONDITIONS
            .iter()
            .find_map(|condition| map.get(*condition).and_then(conditional_entry)),
        _ => None,
    }
}

/// Pick the entry file named by a `package.json` manifest.
fn manifest_entry(manifest: &Value) -> Option<&str> {
    let from_exports = manifest.get("exports").and_then(|exports| match exports {
        Value::Object(map) => conditional_entry(map.get(".").unwrap_or(exports)),
        other => conditional_entry(other),
    });

    from_exports
        .or_else(|| manifest.get("module").and_then(Value::as_str))
        .or_else(|| manifest.get("main").and_then(Value::as_str))
}

async fn package_entry(
    package_dir: &str,
    importer: &str,
    specifier: &str,
) -> Result<String, ResolveError> {
    let manifest_path = join(package_dir, "package.json");
    let entry = match tokio::fs::read_to_string(&manifest_path).await {
        Ok(text) => {
            let manifest: Value =
                serde_json::from_str(&text).map_err(|e| ResolveError::Failed {
                    importer: importer.to_string(),
                    specifier: specifier.to_string(),
                    message: format!("invalid {manifest_path}"),
                    source: Some(Box::new(e)),
                })?;
            manifest_entry(&manifest).unwrap_or("index.js").to_string()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => "index.js".to_string(),
        Err(e) => {
            return Err(ResolveError::Failed {
                importer: importer.to_string(),
                specifier: specifier.to_string(),
                message: format!("cannot read {manifest_path}"),
                source: Some(Box::new(e)),
            })
        }
    };

    Ok(join(package_dir, &entry))
}

/// Whether `dir` is `root` or lies below it.
fn within_root(root: &str, dir: &str) -> bool {
    if root == "/" || dir == root {
        return true;
    }
    dir.strip_prefix(root).is_some_and(|rest| rest.starts_with('/'))
}

async fn resolve_bare(root: &str, importer: &str, specifier: &str) -> Result<String, ResolveError> {
    let not_found = || ResolveError::NotFound {
        importer: importer.to_string(),
        specifier: specifier.to_string(),
    };

    let (name, subpath) = split_package_specifier(specifier).ok_or_else(not_found)?;

    let mut dir = dirname(importer).to_string();
    if !within_root(root, &dir) {
        return Err(not_found());
    }
    loop {
        let package_dir = join(&dir, &format!("node_modules/{name}"));
        if is_dir(&package_dir).await {
            let candidate = match subpath {
                Some(sub) => join(&package_dir, sub),
                None => package_entry(&package_dir, importer, specifier).await?,
            };
            if is_file(&candidate).await {
                return Ok(candidate);
            }
        }

        if dir == root || dir == "/" {
            break;
        }
        dir = dirname(&dir).to_string();
    }

    Err(not_found())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_split_package_specifier() {
        assert_eq!(split_package_specifier("lodash"), Some(("lodash", None)));
        assert_eq!(
            split_package_specifier("lodash/fp/map.js"),
            Some(("lodash", Some("fp/map.js")))
        );
        assert_eq!(
            split_package_specifier("@scope/pkg"),
            Some(("@scope/pkg", None))
        );
        assert_eq!(
            split_package_specifier("@scope/pkg/sub.js"),
            Some(("@scope/pkg", Some("sub.js")))
        );
        assert_eq!(split_package_specifier("@scope"), None);
        assert_eq!(split_package_specifier("pkg/../../etc"), None);
        assert_eq!(split_package_specifier(""), None);
    }

    #[test]
    fn test_manifest_entry_priority() {
        let manifest: Value = serde_json::from_str(
            r#"{"main": "main.js", "module": "module.js", "exports": {".": {"import": "./esm.js", "require": "./cjs.js"}}}"#,
        )
        .unwrap();
        assert_eq!(manifest_entry(&manifest), Some("./esm.js"));

        let manifest: Value =
            serde_json::from_str(r#"{"main": "main.js", "module": "module.js"}"#).unwrap();
        assert_eq!(manifest_entry(&manifest), Some("module.js"));

        let manifest: Value = serde_json::from_str(r#"{"exports": "./only.js"}"#).unwrap();
        assert_eq!(manifest_entry(&manifest), Some("./only.js"));

        let manifest: Value = serde_json::from_str(r#"{"name": "bare"}"#).unwrap();
        assert_eq!(manifest_entry(&manifest), None);
    }

    #[tokio::test]
    async fn test_resolves_package_main_from_nested_importer() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        write(
            &dir.path().join("node_modules/lodash/package.json"),
            r#"{"main": "lodash.js"}"#,
        );
        write(&dir.path().join("node_modules/lodash/lodash.js"), "");

        let resolver = NodeModulesResolver::new(root.clone());
        let resolved = resolver
            .resolve(&format!("{root}/ui/deep/index.js"), "lodash")
            .await
            .unwrap();
        assert_eq!(resolved, format!("{root}/node_modules/lodash/lodash.js"));
    }

    #[tokio::test]
    async fn test_resolves_subpath_and_index_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        write(&dir.path().join("node_modules/@s/pkg/index.js"), "");
        write(&dir.path().join("node_modules/@s/pkg/extra/a.js"), "");

        let resolver = NodeModulesResolver::new(root.clone());
        let importer = format!("{root}/index.js");
        assert_eq!(
            resolver.resolve(&importer, "@s/pkg").await.unwrap(),
            format!("{root}/node_modules/@s/pkg/index.js")
        );
        assert_eq!(
            resolver.resolve(&importer, "@s/pkg/extra/a.js").await.unwrap(),
            format!("{root}/node_modules/@s/pkg/extra/a.js")
        );
    }

    #[tokio::test]
    async fn test_missing_package_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();

        let err = NodeModulesResolver::new(root.clone())
            .resolve(&format!("{root}/index.js"), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        write(&dir.path().join("node_modules/broken/package.json"), "{");

        let err = NodeModulesResolver::new(root.clone())
            .resolve(&format!("{root}/index.js"), "broken")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Failed { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_within_root() {
        assert!(within_root("/srv/app", "/srv/app"));
        assert!(within_root("/srv/app", "/srv/app/ui"));
        assert!(!within_root("/srv/app", "/srv/application"));
        assert!(!within_root("/srv/app", "/srv"));
        assert!(within_root("/", "/anything"));
    }

    #[tokio::test]
    async fn test_walk_stops_at_root() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("node_modules/outer/package.json"),
            r#"{"main": "outer.js"}"#,
        );
        write(&dir.path().join("node_modules/outer/outer.js"), "");
        write(&dir.path().join("app/node_modules/inner/index.js"), "");

        let root = dir.path().join("app").to_str().unwrap().to_string();
        let resolver = NodeModulesResolver::new(root.clone());
        let importer = format!("{root}/ui/index.js");

        assert_eq!(
            resolver.resolve(&importer, "inner").await.unwrap(),
            format!("{root}/node_modules/inner/index.js")
        );
        let err = resolver.resolve(&importer, "outer").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_importer_outside_root_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("other/node_modules/pkg/index.js"), "");
        write(&dir.path().join("app/index.js"), "");

        let root = dir.path().join("app").to_str().unwrap().to_string();
        let importer = dir.path().join("other/index.js");

        let err = NodeModulesResolver::new(root)
            .resolve(importer.to_str().unwrap(), "pkg")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_relative_specifiers_skip_lookup() {
        let resolved = NodeModulesResolver::new("/root")
            .resolve("/root/ui/index.js", "../lib.js")
            .await
            .unwrap();
        assert_eq!(resolved, "/root/lib.js");
    }
}
