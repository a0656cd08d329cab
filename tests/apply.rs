use std::path::PathBuf;
use std::time::Duration;

use static_website::provider::memory::IssuanceBehavior;
use static_website::resources::{
    build_access_rule, host_pattern, ReadRequest, RecordTarget, RuleAction, CLOUDFRONT_SERVICE_PRINCIPAL, READ_ACTION,
};
use static_website::{ContentObject, InMemoryProvider, SiteConfig, SiteError, StaticWebsite, ValidationWait};

fn quick() -> ValidationWait {
    ValidationWait {
        poll_interval: Duration::from_millis(1),
        timeout: Duration::from_millis(100),
    }
}

fn site(domain: &str, include_www: bool) -> StaticWebsite {
    StaticWebsite::new(SiteConfig::new("./www", domain, include_www), "test")
        .unwrap()
        .with_wait(quick())
}

fn content() -> Vec<ContentObject> {
    ["404.html", "blog/index.html", "index.html"]
        .iter()
        .map(|k| ContentObject { key: k.to_string(), source: PathBuf::from("./www").join(k), content_type: None })
        .collect()
}

#[tokio::test]
async fn apex_only_site() {
    let provider = InMemoryProvider::new().with_zone("example.com");
    let outputs = site("example.com", false).apply(&provider, &content()).await.unwrap();

    assert_eq!(outputs.content_bucket_uri, "s3://example.com");
    assert_eq!(outputs.target_domain_endpoint, "https://example.com/");
    assert!(outputs.distribution_domain.ends_with(".cloudfront.net"));
    assert_eq!(outputs.records.len(), 1);

    // one validation record plus one alias record
    let records = provider.records_in_zone("example.com");
    assert_eq!(records.len(), 2);
    let proofs = provider.submitted_proofs(&outputs.certificate_arn).unwrap();
    assert_eq!(proofs.len(), 1);

    let dist = provider.distribution("example.com-cdn").unwrap();
    assert_eq!(dist.aliases, vec!["example.com"]);
    assert_eq!(dist.viewer_certificate.acm_certificate_arn, outputs.certificate_arn);
    assert_eq!(provider.object_keys("example.com"), vec!["404.html", "blog/index.html", "index.html"]);
}

#[tokio::test]
async fn www_site_publishes_both_hostnames() {
    let provider = InMemoryProvider::new().with_zone("example.com");
    let outputs = site("blog.example.com", true).apply(&provider, &[]).await.unwrap();

    let fqdns: Vec<_> = outputs.records.iter().map(|r| r.fqdn.as_str()).collect();
    assert_eq!(fqdns, vec!["blog.example.com.", "www.blog.example.com."]);
    assert_ne!(outputs.records[0].logical_name, outputs.records[1].logical_name);

    let proofs = provider.submitted_proofs(&outputs.certificate_arn).unwrap();
    assert_eq!(proofs.len(), 2);

    let aliases = provider
        .records_in_zone("example.com")
        .into_iter()
        .filter(|r| matches!(r.target, RecordTarget::Alias(_)))
        .count();
    assert_eq!(aliases, 2);

    let dist = provider.distribution("blog.example.com-cdn").unwrap();
    assert_eq!(dist.aliases, vec!["www.blog.example.com", "blog.example.com"]);
}

#[tokio::test]
async fn reapply_creates_nothing_new() {
    let provider = InMemoryProvider::new().with_zone("example.com");
    let site = site("example.com", true);
    let first = site.apply(&provider, &content()).await.unwrap();
    let created = provider.creation_count();
    assert!(created > 0);

    let second = site.apply(&provider, &content()).await.unwrap();
    assert_eq!(provider.creation_count(), created, "{:?}", provider.creations());
    assert_eq!(first, second);
}

#[tokio::test]
async fn turning_www_off_removes_its_records() {
    let provider = InMemoryProvider::new().with_zone("example.com");
    site("example.com", true).apply(&provider, &content()).await.unwrap();
    assert_eq!(provider.records_in_zone("example.com").len(), 4);

    let outputs = site("example.com", false).apply(&provider, &content()).await.unwrap();
    assert_eq!(outputs.records.len(), 1);
    assert_eq!(provider.distribution("example.com-cdn").unwrap().aliases, vec!["example.com"]);

    let records = provider.records_in_zone("example.com");
    assert_eq!(records.len(), 2, "{records:?}");
    assert!(records.iter().all(|r| !r.name.contains("www.")), "{records:?}");
}

#[tokio::test]
async fn mixed_case_domain_is_served_lowercase() {
    let provider = InMemoryProvider::new().with_zone("example.com");
    let outputs = site("Example.com", false).apply(&provider, &[]).await.unwrap();
    assert_eq!(outputs.content_bucket_uri, "s3://example.com");
    assert_eq!(outputs.records[0].fqdn, "example.com.");
    assert_eq!(provider.distribution("example.com-cdn").unwrap().aliases, vec!["example.com"]);
}

#[tokio::test]
async fn bucket_is_private_and_scoped_to_the_distribution() {
    let provider = InMemoryProvider::new().with_zone("example.com");
    site("example.com", false).apply(&provider, &[]).await.unwrap();

    assert!(provider.public_access_block("example.com").unwrap().is_locked_down());
    let policy = provider.bucket_policy("example.com").unwrap();
    assert!(policy.distribution_arn.starts_with("arn:aws:cloudfront::"));

    let from_site = ReadRequest {
        service_principal: CLOUDFRONT_SERVICE_PRINCIPAL,
        source_arn: Some(policy.distribution_arn.as_str()),
        action: READ_ACTION,
        resource: "arn:aws:s3:::example.com/index.html",
    };
    assert!(policy.permits(&from_site));
    let from_elsewhere = ReadRequest {
        source_arn: Some("arn:aws:cloudfront::999999999999:distribution/EOTHER"),
        ..from_site
    };
    assert!(!policy.permits(&from_elsewhere));
}

#[tokio::test]
async fn missing_zone_aborts_before_distribution() {
    let provider = InMemoryProvider::new().with_zone("another.org");
    let err = site("example.com", false).apply(&provider, &[]).await.unwrap_err();
    assert_eq!(err, SiteError::ZoneNotFound("example.com.".into()));
    assert!(provider.distribution("example.com-cdn").is_none());
    assert!(provider.bucket_policy("example.com").is_none());
}

#[tokio::test]
async fn stalled_certificate_times_out_without_a_distribution() {
    let provider = InMemoryProvider::new()
        .with_zone("example.com")
        .with_issuance(IssuanceBehavior::Stall);
    let err = site("example.com", true).apply(&provider, &[]).await.unwrap_err();
    assert!(matches!(err, SiteError::CertificateValidationTimeout { .. }), "{err:?}");
    assert!(provider.distribution("example.com-cdn").is_none());
    // nothing in the zone points at a distribution
    assert!(provider
        .records_in_zone("example.com")
        .iter()
        .all(|r| matches!(r.target, RecordTarget::Values { .. })));
}

#[tokio::test]
async fn rerun_after_failure_completes_the_rest() {
    let provider = InMemoryProvider::new()
        .with_zone("example.com")
        .with_issuance(IssuanceBehavior::Stall);
    let site = site("example.com", false);
    assert!(site.apply(&provider, &content()).await.is_err());
    let partial = provider.creations();
    assert!(partial.contains(&"s3:Bucket:example.com-content-bucket".to_string()));
    assert!(partial.contains(&"acm:Certificate:certificate".to_string()));

    provider.set_issuance(IssuanceBehavior::Issue);
    let outputs = site.apply(&provider, &content()).await.unwrap();
    assert_eq!(outputs.records.len(), 1);

    // only what the failed run never reached gets created
    let added: Vec<_> = provider.creations().split_off(partial.len());
    let kinds: Vec<_> = added.iter().map(|c| c.rsplit_once(':').map(|(k, _)| k).unwrap_or("")).collect();
    assert_eq!(kinds, vec!["cloudfront:Distribution", "s3:BucketPolicy", "route53:Record"]);
}

#[test]
fn access_rule_matches_site_hosts_only() {
    let policy = build_access_rule(&host_pattern("example.com")).unwrap();
    assert_eq!(policy.evaluate("example.com"), RuleAction::Allow);
    assert_eq!(policy.evaluate("www.example.com"), RuleAction::Allow);
    assert_eq!(policy.evaluate("evil.com"), RuleAction::Block);
}
