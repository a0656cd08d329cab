//! Provision a static website: a private S3 bucket holding the content, a
//! CloudFront distribution in front of it restricted by a web ACL, a DNS
//! validated ACM certificate, and Route53 alias records for the domain.
//!
//! [`StaticWebsite::plan`] describes the resources and their dependency edges.
//! [`StaticWebsite::apply`] drives them against a [`CloudProvider`].

pub mod config;
pub mod content;
pub mod domain;
pub mod error;
pub mod provider;
pub mod resources;
pub mod verify;

pub use config::SiteConfig;
pub use content::{crawl, ContentObject};
pub use domain::{build_aliases, decompose, AliasSet, DomainComponents};
pub use error::{SiteError, SiteResult};
pub use provider::memory::InMemoryProvider;
pub use provider::CloudProvider;
pub use resources::{Plan, PlannedResource, SiteOutputs, StaticWebsite, ValidationWait};
