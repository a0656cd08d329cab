use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::*;
use crate::domain::decompose;

/// seconds.
pub const VALIDATION_RECORD_TTL: u32 = 600;

/// the hosted zone every CloudFront distribution domain lives in.
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub String);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Cname,
    Txt,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordType::A => "A",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasTarget {
    pub dns_name: String,
    pub hosted_zone_id: String,
    pub evaluate_target_health: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordTarget {
    Values { ttl: u32, values: Vec<String> },
    Alias(AliasTarget),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSpec {
    /// identity of the record across applies. two records with different
    /// logical names are independent even if they point at the same target.
    pub logical_name: String,
    /// fully qualified record name.
    pub name: String,
    pub record_type: RecordType,
    pub target: RecordTarget,
}

impl RecordSpec {
    pub fn validation(logical_name: String, challenge: &ValidationChallenge) -> Self {
        Self {
            logical_name,
            name: fqdn(&challenge.record_name),
            record_type: challenge.record_type,
            target: RecordTarget::Values {
                ttl: VALIDATION_RECORD_TTL,
                values: vec![challenge.record_value.clone()],
            },
        }
    }

    pub fn alias(logical_name: String, name: &str, distribution: &DistributionHandle) -> Self {
        Self {
            logical_name,
            name: fqdn(name),
            record_type: RecordType::A,
            target: RecordTarget::Alias(AliasTarget {
                dns_name: distribution.domain_name.clone(),
                hosted_zone_id: distribution.hosted_zone_id.clone(),
                evaluate_target_health: true,
            }),
        }
    }

    /// a record is only ever handed to a provider fully described.
    pub fn check(&self) -> SiteResult<()> {
        let incomplete = |what: &str| {
            Err(SiteError::Provider(format!("Route53 record '{}' is missing {what}", self.logical_name)))
        };
        if self.logical_name.is_empty() || self.name.is_empty() || self.name == "." {
            return incomplete("a name");
        }
        match &self.target {
            RecordTarget::Values { values, .. } => {
                if values.is_empty() || values.iter().any(|v| v.is_empty()) {
                    return incomplete("record values");
                }
            }
            RecordTarget::Alias(alias) => {
                if alias.dns_name.is_empty() || alias.hosted_zone_id.is_empty() {
                    return incomplete("an alias target");
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedRecord {
    pub logical_name: String,
    pub fqdn: String,
    pub zone_id: ZoneId,
    pub record_type: RecordType,
}

/// finds the hosted zone that `domain` should be published in.
pub async fn resolve_zone<P: CloudProvider + ?Sized>(provider: &P, domain: &str) -> SiteResult<ZoneId> {
    let parts = decompose(domain)?;
    debug!("Looking up hosted zone {}", parts.parent_zone);
    match provider.find_zone(&parts.parent_zone).await? {
        Some(zone) => Ok(zone),
        None => Err(SiteError::ZoneNotFound(parts.parent_zone)),
    }
}

pub async fn upsert_checked<P: CloudProvider + ?Sized>(provider: &P, zone: &ZoneId, record: &RecordSpec) -> SiteResult<PublishedRecord> {
    record.check()?;
    provider.upsert_record(zone, record).await
}

pub fn www_alias_logical_name(apex: &str) -> String {
    format!("{apex}-www-alias")
}

/// Points the site's hostnames at the distribution with A alias records.
pub struct AliasRecordPublisher<'a, P: ?Sized> {
    provider: &'a P,
}

impl<'a, P: CloudProvider + ?Sized> AliasRecordPublisher<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// the apex record is named after the domain, the www record gets its own
    /// `<domain>-www-alias` identity. neither depends on the other.
    pub fn records(aliases: &AliasSet, distribution: &DistributionHandle) -> Vec<RecordSpec> {
        let apex = aliases.apex();
        let mut out = vec![RecordSpec::alias(apex.into(), apex, distribution)];
        if let Some(www) = aliases.www() {
            out.push(RecordSpec::alias(www_alias_logical_name(apex), www, distribution));
        }
        out
    }

    pub async fn publish(&self, aliases: &AliasSet, distribution: &DistributionHandle) -> SiteResult<Vec<PublishedRecord>> {
        let zone = resolve_zone(self.provider, aliases.apex()).await?;
        let mut published = vec![];
        for record in Self::records(aliases, distribution) {
            let out = upsert_checked(self.provider, &zone, &record).await?;
            info!("Published {} -> {}", out.fqdn, distribution.domain_name);
            published.push(out);
        }
        if !aliases.includes_www() {
            let stale = www_alias_logical_name(aliases.apex());
            if self.provider.delete_record(&zone, &stale).await? {
                info!("Removed {stale}, www is no longer served");
            }
        }
        Ok(published)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::provider::memory::InMemoryProvider;

    fn distribution() -> DistributionHandle {
        DistributionHandle {
            arn: "arn:aws:cloudfront::123456789012:distribution/E123".into(),
            domain_name: "d111111abcdef8.cloudfront.net".into(),
            hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.into(),
        }
    }

    #[test]
    fn alias_records_have_independent_identities() {
        let records = AliasRecordPublisher::<InMemoryProvider>::records(&AliasSet::new(true, "example.com"), &distribution());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].logical_name, "example.com");
        assert_eq!(records[0].name, "example.com.");
        assert_eq!(records[1].logical_name, "example.com-www-alias");
        assert_eq!(records[1].name, "www.example.com.");
        for r in &records {
            assert_eq!(r.record_type, RecordType::A);
            match &r.target {
                RecordTarget::Alias(a) => {
                    assert_eq!(a.dns_name, "d111111abcdef8.cloudfront.net");
                    assert!(a.evaluate_target_health);
                }
                x => panic!("expected alias target, found {:?}", x),
            }
        }
    }

    #[test]
    fn incomplete_records_are_rejected() {
        let mut dist = distribution();
        dist.domain_name.clear();
        let record = RecordSpec::alias("example.com".into(), "example.com", &dist);
        assert!(record.check().is_err());
    }

    #[tokio::test]
    async fn publish_without_www_creates_one_record() {
        let provider = InMemoryProvider::new().with_zone("example.com");
        let out = AliasRecordPublisher::new(&provider)
            .publish(&AliasSet::new(false, "example.com"), &distribution())
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].fqdn, "example.com.");
    }

    #[tokio::test]
    async fn publish_with_www_creates_two_records() {
        let provider = InMemoryProvider::new().with_zone("example.com");
        let out = AliasRecordPublisher::new(&provider)
            .publish(&AliasSet::new(true, "blog.example.com"), &distribution())
            .await
            .unwrap();
        let names: Vec<_> = out.iter().map(|r| r.fqdn.as_str()).collect();
        assert_eq!(names, vec!["blog.example.com.", "www.blog.example.com."]);
    }

    #[tokio::test]
    async fn publish_without_zone_fails() {
        let provider = InMemoryProvider::new().with_zone("other.com");
        let err = AliasRecordPublisher::new(&provider)
            .publish(&AliasSet::new(false, "example.com"), &distribution())
            .await
            .unwrap_err();
        assert_eq!(err, SiteError::ZoneNotFound("example.com.".into()));
    }

    #[tokio::test]
    async fn dropping_www_removes_its_alias() {
        let provider = InMemoryProvider::new().with_zone("example.com");
        let publisher = AliasRecordPublisher::new(&provider);
        publisher.publish(&AliasSet::new(true, "example.com"), &distribution()).await.unwrap();
        assert_eq!(provider.records_in_zone("example.com").len(), 2);

        let out = publisher.publish(&AliasSet::new(false, "example.com"), &distribution()).await.unwrap();
        assert_eq!(out.len(), 1);
        let names: Vec<_> = provider.records_in_zone("example.com").into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["example.com."]);
    }
}
