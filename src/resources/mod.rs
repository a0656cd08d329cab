pub use crate::config::Tags;
pub use crate::domain::{AliasSet, DomainComponents, MAX_HOSTNAMES};
pub use crate::error::{SiteError, SiteResult};
pub use crate::provider::CloudProvider;

mod acm;
pub use acm::*;
mod waf;
pub use waf::*;
mod s3_bucket;
pub use s3_bucket::*;
mod cloudfront;
pub use cloudfront::*;
mod route53;
pub use route53::*;

// higher level resources:
mod static_website;
pub use static_website::*;

/// fully qualified form of a DNS name, eg: `example.com` => `example.com.`
pub fn fqdn(name: &str) -> String {
    let mut out = name.trim_end_matches('.').to_string();
    out.push('.');
    out
}
