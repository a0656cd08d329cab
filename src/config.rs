use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::decompose;
use crate::error::{SiteError, SiteResult};

pub const DEFAULT_AUTHOR: &str = "JonDoe";
pub const DEFAULT_ORGANIZATION: &str = "JonDoe Inc.";
pub const DEFAULT_PROJECT: &str = "static-website";
pub const DEPLOYMENT_TAG: &str = "static-website";

/// keys may optionally be namespaced with this prefix, eg: `static-website:targetDomain=...`
const KEY_NAMESPACE: &str = "static-website:";

pub type Tags = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// path to the website's contents, relative to where the deploy is run from.
    pub content_path: PathBuf,
    /// the domain/host to serve content at.
    pub target_domain: String,
    /// if true, the certificate, distribution and DNS records also cover `www.<target_domain>`.
    pub include_www_subdomain: bool,
    pub author: String,
    pub organization: String,
}

impl SiteConfig {
    pub fn new<S: AsRef<str>>(content_path: impl Into<PathBuf>, target_domain: S, include_www_subdomain: bool) -> Self {
        Self {
            content_path: content_path.into(),
            target_domain: target_domain.as_ref().into(),
            include_www_subdomain,
            author: DEFAULT_AUTHOR.into(),
            organization: DEFAULT_ORGANIZATION.into(),
        }
    }

    pub fn from_dot_env(path: &Path) -> SiteResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SiteError::Config(format!("Failed to load {}: {e}", path.display())))?;
        Self::from_map(&parse_dot_env(&contents))
    }

    pub fn from_map(map: &HashMap<String, String>) -> SiteResult<Self> {
        let required = |key: &str| -> SiteResult<String> {
            match map.get(key) {
                Some(v) if !v.is_empty() => Ok(v.clone()),
                _ => Err(SiteError::Config(format!("Missing required key '{key}'"))),
            }
        };
        let content_path = required("pathToWebsiteContents")?;
        let target_domain = required("targetDomain")?;
        decompose(&target_domain)?;

        let include_www_subdomain = match map.get("includeWwwSubDomain").map(|s| s.as_str()) {
            None | Some("") => false,
            Some("true") => true,
            Some("false") => false,
            Some(x) => {
                return Err(SiteError::Config(format!("Unexpected value '{x}' for includeWwwSubDomain")));
            }
        };
        let optional = |key: &str, default: &str| -> String {
            map.get(key).filter(|v| !v.is_empty()).cloned().unwrap_or_else(|| default.into())
        };

        Ok(Self {
            content_path: content_path.into(),
            target_domain,
            include_www_subdomain,
            author: optional("author", DEFAULT_AUTHOR),
            organization: optional("organization", DEFAULT_ORGANIZATION),
        })
    }

    pub fn tags(&self, stack: &str, project: &str) -> Tags {
        let mut tags = Tags::new();
        tags.insert("author".into(), self.author.clone());
        tags.insert("stack".into(), stack.into());
        tags.insert("repo".into(), project.into());
        tags.insert("deployment".into(), DEPLOYMENT_TAG.into());
        tags.insert("org".into(), self.organization.clone());
        tags
    }
}

pub fn parse_dot_env(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            let key = key.trim();
            let key = key.strip_prefix(KEY_NAMESPACE).unwrap_or(key);
            let val = val.trim().trim_matches('"');
            map.insert(key.into(), val.into());
        }
    }
    map
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_applied() {
        let map = parse_dot_env("pathToWebsiteContents=./www\ntargetDomain=example.com\n");
        let conf = SiteConfig::from_map(&map).unwrap();
        assert_eq!(conf.content_path, PathBuf::from("./www"));
        assert_eq!(conf.target_domain, "example.com");
        assert!(!conf.include_www_subdomain);
        assert_eq!(conf.author, DEFAULT_AUTHOR);
        assert_eq!(conf.organization, DEFAULT_ORGANIZATION);
    }

    #[test]
    fn comments_namespaces_and_quotes() {
        let contents = "
            # the site
            static-website:pathToWebsiteContents=\"./www\"
            static-website:targetDomain=blog.example.com
            includeWwwSubDomain=true
            author=alice
        ";
        let conf = SiteConfig::from_map(&parse_dot_env(contents)).unwrap();
        assert_eq!(conf.content_path, PathBuf::from("./www"));
        assert_eq!(conf.target_domain, "blog.example.com");
        assert!(conf.include_www_subdomain);
        assert_eq!(conf.author, "alice");
    }

    #[test]
    fn missing_domain_is_a_config_error() {
        let map = parse_dot_env("pathToWebsiteContents=./www");
        let err = SiteConfig::from_map(&map).unwrap_err();
        assert!(matches!(err, SiteError::Config(_)));
    }

    #[test]
    fn bad_domain_fails_before_anything_else() {
        let map = parse_dot_env("pathToWebsiteContents=./www\ntargetDomain=localhost");
        let err = SiteConfig::from_map(&map).unwrap_err();
        assert_eq!(err, SiteError::InvalidDomain("localhost".into()));
    }

    #[test]
    fn bad_bool_is_rejected() {
        let map = parse_dot_env("pathToWebsiteContents=./www\ntargetDomain=example.com\nincludeWwwSubDomain=yes");
        assert!(matches!(SiteConfig::from_map(&map), Err(SiteError::Config(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pathToWebsiteContents=site").unwrap();
        writeln!(file, "targetDomain=example.com").unwrap();
        writeln!(file, "organization=Example Co").unwrap();
        let conf = SiteConfig::from_dot_env(file.path()).unwrap();
        assert_eq!(conf.organization, "Example Co");
        let tags = conf.tags("prod", DEFAULT_PROJECT);
        assert_eq!(tags["stack"], "prod");
        assert_eq!(tags["repo"], DEFAULT_PROJECT);
        assert_eq!(tags["deployment"], DEPLOYMENT_TAG);
        assert_eq!(tags["org"], "Example Co");
    }
}
