//! Startup configuration: manifest source strings and pool sizing.
//!
//! A manifest source tells the service where its manifests live. Two schemes
//! exist: `bucket:<bucket>/<prefix>` for an object store and `dir:<path>` for
//! a local directory. Anything else is a fatal configuration error; there is
//! no fallback source.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

/// Default number of workers in the pool.
pub const DEFAULT_POOL_SIZE: usize = 2;

/// Where manifests are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// An object-store bucket listing under a key prefix.
    Bucket { bucket: String, prefix: String },
    /// A directory of `<property>.json` files.
    Dir(PathBuf),
}

impl FromStr for ManifestSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("bucket:") {
            let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(ConfigError::EmptyBucket);
            }
            if prefix.is_empty() {
                return Err(ConfigError::EmptyPrefix);
            }
            return Ok(Self::Bucket {
                bucket: bucket.to_owned(),
                prefix: prefix.to_owned(),
            });
        }

        if let Some(path) = s.strip_prefix("dir:") {
            if path.is_empty() {
                return Err(ConfigError::EmptyPath);
            }
            return Ok(Self::Dir(PathBuf::from(path)));
        }

        Err(ConfigError::UnknownSource {
            value: s.to_owned(),
        })
    }
}

/// Pool sizing knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of workers, each owning a full index replica.
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_POOL_SIZE,
        }
    }
}

impl PoolConfig {
    /// Build a config with an explicit worker count.
    pub fn with_workers(workers: usize) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::EmptyPool);
        }
        Ok(Self { workers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use rstest::rstest;

    #[rstest]
    #[case("bucket:docs-search/manifests", ManifestSource::Bucket { bucket: "docs-search".into(), prefix: "manifests".into() })]
    #[case("bucket:b/deeply/nested/prefix", ManifestSource::Bucket { bucket: "b".into(), prefix: "deeply/nested/prefix".into() })]
    #[case("dir:/srv/manifests", ManifestSource::Dir(PathBuf::from("/srv/manifests")))]
    fn parses_valid_sources(#[case] input: &str, #[case] expected: ManifestSource) {
        check!(input.parse::<ManifestSource>().unwrap() == expected);
    }

    #[rstest]
    #[case("s3://bucket/prefix")]
    #[case("manifests")]
    #[case("")]
    fn rejects_unknown_schemes(#[case] input: &str) {
        check!(matches!(
            input.parse::<ManifestSource>(),
            Err(ConfigError::UnknownSource { .. })
        ));
    }

    #[test]
    fn rejects_empty_components() {
        check!(
            "bucket:/prefix".parse::<ManifestSource>() == Err(ConfigError::EmptyBucket)
        );
        check!("bucket:b".parse::<ManifestSource>() == Err(ConfigError::EmptyPrefix));
        check!("bucket:b/".parse::<ManifestSource>() == Err(ConfigError::EmptyPrefix));
        check!("dir:".parse::<ManifestSource>() == Err(ConfigError::EmptyPath));
    }

    #[test]
    fn pool_config_defaults_to_two_workers() {
        check!(PoolConfig::default().workers == 2);
        check!(PoolConfig::with_workers(0) == Err(ConfigError::EmptyPool));
        check!(PoolConfig::with_workers(4).unwrap().workers == 4);
    }
}
