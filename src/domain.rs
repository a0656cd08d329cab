use serde::{Deserialize, Serialize};

use crate::error::{SiteError, SiteResult};

/// The different components of a website's domain name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainComponents {
    /// first label of the domain. empty when the domain has exactly two labels.
    pub subdomain: String,
    /// the hosted zone the domain lives in, in canonical form (trailing `.`).
    pub parent_zone: String,
}

/// lowercase and fully qualified, eg: `Example.com` => `example.com.`
pub fn canonical_zone_name(name: &str) -> String {
    let mut out = name.trim_end_matches('.').to_ascii_lowercase();
    out.push('.');
    out
}

/// splits a domain name into its subdomain and parent zone names.
/// e.g. "www.example.com" => "www", "example.com."
pub fn decompose(domain: &str) -> SiteResult<DomainComponents> {
    let lowered = domain.to_ascii_lowercase();
    let trimmed = lowered.strip_suffix('.').unwrap_or(&lowered);
    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(SiteError::InvalidDomain(domain.into()));
    }
    // no subdomain, eg: awesome-website.com
    if parts.len() == 2 {
        return Ok(DomainComponents {
            subdomain: String::new(),
            parent_zone: canonical_zone_name(trimmed),
        });
    }
    Ok(DomainComponents {
        subdomain: parts[0].into(),
        parent_zone: canonical_zone_name(&parts[1..].join(".")),
    })
}

/// an alias set never holds more than the apex and its www variant.
pub const MAX_HOSTNAMES: usize = 2;

/// The hostnames a distribution answers to. The www decision is made once
/// here, everything downstream iterates over this instead of re-checking a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasSet {
    apex: String,
    www: Option<String>,
}

impl AliasSet {
    pub fn new(include_www: bool, target_domain: &str) -> Self {
        // hostnames, bucket names and Host headers are all lowercase
        let apex = target_domain.trim_end_matches('.').to_ascii_lowercase();
        let www = include_www.then(|| format!("www.{apex}"));
        Self { apex, www }
    }

    pub fn apex(&self) -> &str {
        &self.apex
    }

    pub fn www(&self) -> Option<&str> {
        self.www.as_deref()
    }

    pub fn includes_www(&self) -> bool {
        self.www.is_some()
    }

    /// www first, when present.
    pub fn hostnames(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(MAX_HOSTNAMES);
        if let Some(www) = &self.www {
            out.push(www.clone());
        }
        out.push(self.apex.clone());
        out
    }

    /// names a certificate must list besides the apex.
    pub fn alternate_names(&self) -> Vec<String> {
        self.www.iter().cloned().collect()
    }
}

pub fn build_aliases(include_www: bool, target_domain: &str) -> Vec<String> {
    AliasSet::new(include_www, target_domain).hostnames()
}
