//! Import-path resolution.
//!
//! The resolution policy is pluggable through [`ImportResolver`]. The default
//! [`RelativeImportResolver`] only understands `./` and `../` specifiers;
//! hosts that want package-style imports supply their own resolver, for
//! example [`NodeModulesResolver`].

mod node_modules;

pub use node_modules::NodeModulesResolver;

use crate::paths::{dirname, is_relative_specifier, join};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure to turn a specifier into a path.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(
        "cannot resolve \"{specifier}\" from \"{importer}\": only relative imports are supported, \
         provide a custom import resolver to handle non-relative imports"
    )]
    Unsupported { importer: String, specifier: String },

    #[error("cannot find module \"{specifier}\" from \"{importer}\"")]
    NotFound { importer: String, specifier: String },

    #[error("failed to resolve \"{specifier}\" from \"{importer}\": {message}")]
    Failed {
        importer: String,
        specifier: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ResolveError {
    /// The specifier that failed.
    #[must_use]
    pub fn specifier(&self) -> &str {
        match self {
            Self::Unsupported { specifier, .. }
            | Self::NotFound { specifier, .. }
            | Self::Failed { specifier, .. } => specifier,
        }
    }
}

/// Resolves `(importer, specifier)` pairs to paths.
///
/// A returned path starting with `/` is treated as a virtual path and made
/// relative to the importer before it is written into the source; any other
/// string is written as-is.
pub trait ImportResolver: Send + Sync {
    fn resolve(&self, importer: &str, specifier: &str)
        -> BoxFuture<'static, Result<String, ResolveError>>;
}

impl<F, Fut> ImportResolver for F
where
    F: Fn(String, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ResolveError>> + Send + 'static,
{
    fn resolve(
        &self,
        importer: &str,
        specifier: &str,
    ) -> BoxFuture<'static, Result<String, ResolveError>> {
        self(importer.to_string(), specifier.to_string()).boxed()
    }
}

/// Resolve `./` and `../` specifiers against the importer's directory.
///
/// Returns `None` for anything else.
#[must_use]
pub fn resolve_relative(importer: &str, specifier: &str) -> Option<String> {
    is_relative_specifier(specifier).then(|| join(dirname(importer), specifier))
}

/// Default policy: relative specifiers only.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeImportResolver;

impl ImportResolver for RelativeImportResolver {
    fn resolve(
        &self,
        importer: &str,
        specifier: &str,
    ) -> BoxFuture<'static, Result<String, ResolveError>> {
        let result = resolve_relative(importer, specifier).ok_or_else(|| {
            ResolveError::Unsupported {
                importer: importer.to_string(),
                specifier: specifier.to_string(),
            }
        });
        future::ready(result).boxed()
    }
}

/// Remove duplicate specifiers, keeping the first occurrence of each.
#[must_use]
pub fn dedupe_specifiers<S: AsRef<str>>(specifiers: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    specifiers
        .iter()
        .map(AsRef::as_ref)
        .filter(|specifier| seen.insert(*specifier))
        .map(String::from)
        .collect()
}

/// Resolve every specifier imported by `importer`.
///
/// Each distinct specifier is resolved once and all resolutions run
/// concurrently. On success the result lines up one-to-one with
/// `specifiers`, duplicates included. If any resolution fails, the failure
/// of the first failing specifier (in first-seen order) is returned and no
/// partial result is produced.
pub async fn resolve_all_imports(
    resolver: &dyn ImportResolver,
    importer: &str,
    specifiers: &[String],
) -> Result<Vec<String>, ResolveError> {
    let unique = dedupe_specifiers(specifiers);

    let pending = unique.iter().map(|specifier| {
        let resolution = resolver.resolve(importer, specifier);
        async move {
            let result = resolution.await;
            match &result {
                Ok(file_path) => debug!(
                    target: "esdebug::resolve",
                    importer, specifier = %specifier, resolved = %file_path,
                    "resolved import"
                ),
                Err(e) => warn!(
                    target: "esdebug::resolve",
                    importer, specifier = %specifier, error = %e,
                    "failed to resolve import"
                ),
            }
            result
        }
    });
    let results = future::join_all(pending).await;

    let mut by_specifier: HashMap<&str, String> = HashMap::with_capacity(unique.len());
    for (specifier, result) in unique.iter().zip(results) {
        by_specifier.insert(specifier.as_str(), result?);
    }

    Ok(specifiers
        .iter()
        .filter_map(|specifier| by_specifier.get(specifier.as_str()).cloned())
        .collect())
}
