//! Cache configuration

use crate::error::Result;
use crate::image_codec::ImageFormat;
use std::path::PathBuf;

const DEFAULT_CACHE_DIR: &str = "./cache/objects";

/// Configuration for an [`ObjectCache`](crate::ObjectCache)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding the disk tier
    pub cache_dir: PathBuf,
    /// Encoding used by `cache_image`
    pub image_format: ImageFormat,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            image_format: ImageFormat::Png,
        }
    }
}

impl CacheConfig {
    /// Configuration rooted at `cache_dir` with default settings otherwise
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `OBJECT_CACHE_DIR` and
    /// `OBJECT_CACHE_IMAGE_FORMAT`, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cache_dir = var("OBJECT_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));

        let image_format = match var("OBJECT_CACHE_IMAGE_FORMAT") {
            Some(value) => value.parse()?,
            None => ImageFormat::default(),
        };

        Ok(Self {
            cache_dir,
            image_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.cache_dir, PathBuf::from("./cache/objects"));
        assert_eq!(config.image_format, ImageFormat::Png);
    }

    #[test]
    fn test_from_vars_empty_uses_defaults() {
        let config = CacheConfig::from_vars(lookup(&[])).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("./cache/objects"));
        assert_eq!(config.image_format, ImageFormat::Png);
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = CacheConfig::from_vars(lookup(&[
            ("OBJECT_CACHE_DIR", "/var/cache/app"),
            ("OBJECT_CACHE_IMAGE_FORMAT", "webp"),
        ]))
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/app"));
        assert_eq!(config.image_format, ImageFormat::WebP);
    }

    #[test]
    fn test_from_vars_rejects_unknown_format() {
        let err = CacheConfig::from_vars(lookup(&[("OBJECT_CACHE_IMAGE_FORMAT", "bmp")]))
            .unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_new_keeps_default_format() {
        let config = CacheConfig::new("/tmp/cache");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.image_format, ImageFormat::Png);
    }
}
