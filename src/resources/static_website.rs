use std::collections::HashMap;

use log::info;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::Serialize;
use serde_json::{json, Value};

use super::*;
use crate::config::{SiteConfig, DEFAULT_PROJECT};
use crate::content::ContentObject;
use crate::domain::decompose;

pub const CERTIFICATE_VALIDATION_LOGICAL_NAME: &str = "certificate-validation";

/// One node in the site's resource graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedResource {
    pub name: String,
    pub kind: String,
    pub depends_on: Vec<String>,
    pub properties: Value,
}

/// Pure description of the site: nodes plus explicit dependency edges. Any
/// engine that can walk a DAG can drive this.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub resources: Vec<PlannedResource>,
}

fn reference(name: &str) -> Value {
    json!({ "Ref": name })
}

fn get_att(name: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [name, attribute] })
}

impl Plan {
    fn add(&mut self, name: &str, kind: &str, depends_on: &[&str], properties: Value) {
        self.resources.push(PlannedResource {
            name: name.into(),
            kind: kind.into(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            properties,
        });
    }

    pub fn get(&self, name: &str) -> Option<&PlannedResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a PlannedResource> + 'a {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    /// nodes in an order where every resource comes after what it depends on.
    pub fn ordered(&self) -> SiteResult<Vec<&PlannedResource>> {
        let mut graph = DiGraph::<usize, ()>::new();
        let mut index = HashMap::new();
        for (i, r) in self.resources.iter().enumerate() {
            if index.insert(r.name.as_str(), graph.add_node(i)).is_some() {
                return Err(SiteError::Config(format!("Resource '{}' is declared twice", r.name)));
            }
        }
        for r in &self.resources {
            let to = index[r.name.as_str()];
            for dep in &r.depends_on {
                let from = index.get(dep.as_str()).ok_or_else(|| {
                    SiteError::Config(format!("Resource '{}' depends on unknown resource '{dep}'", r.name))
                })?;
                graph.add_edge(*from, to, ());
            }
        }
        let sorted = toposort(&graph, None).map_err(|cycle| {
            let r = &self.resources[graph[cycle.node_id()]];
            SiteError::Config(format!("Resource '{}' is part of a dependency cycle", r.name))
        })?;
        Ok(sorted.into_iter().map(|n| &self.resources[graph[n]]).collect())
    }
}

/// What's published once the site is up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteOutputs {
    pub content_bucket_uri: String,
    pub distribution_domain: String,
    pub target_domain_endpoint: String,
    pub certificate_arn: String,
    pub records: Vec<PublishedRecord>,
}

/// A private S3 bucket served through CloudFront at a custom domain, with a DNS
/// validated certificate, a web ACL that rejects the raw distribution address,
/// and Route53 aliases for the domain (and optionally its www subdomain).
#[derive(Debug, Clone)]
pub struct StaticWebsite {
    config: SiteConfig,
    aliases: AliasSet,
    tags: Tags,
    wait: ValidationWait,
}

impl StaticWebsite {
    pub fn new(config: SiteConfig, stack: &str) -> SiteResult<Self> {
        Self::for_project(config, stack, DEFAULT_PROJECT)
    }

    pub fn for_project(config: SiteConfig, stack: &str, project: &str) -> SiteResult<Self> {
        decompose(&config.target_domain)?;
        let aliases = AliasSet::new(config.include_www_subdomain, &config.target_domain);
        let tags = config.tags(stack, project);
        Ok(Self {
            config,
            aliases,
            tags,
            wait: ValidationWait::default(),
        })
    }

    pub fn with_wait(mut self, wait: ValidationWait) -> Self {
        self.wait = wait;
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn aliases(&self) -> &AliasSet {
        &self.aliases
    }

    pub fn plan(&self, content: &[ContentObject]) -> SiteResult<Plan> {
        let domain = self.aliases.apex();
        let parts = decompose(domain)?;
        let policy = build_access_rule(&host_pattern(domain))?.with_tags(self.tags.clone());
        let bucket = BucketSpec::for_domain(domain, self.tags.clone());
        let bucket_name = bucket.logical_name.as_str();
        let request = CertificateRequest::for_aliases(&self.aliases, self.tags.clone());
        let function = RewriteFunction::url_rewriter();
        let oac = OriginAccessControl::default();
        let distribution = format!("{domain}-cdn");
        let mut plan = Plan::default();

        plan.add(bucket_name, "s3:Bucket", &[], json!({ "bucket": bucket.bucket_name, "tags": bucket.tags }));
        plan.add(
            PUBLIC_ACCESS_BLOCK_LOGICAL_NAME,
            "s3:BucketPublicAccessBlock",
            &[bucket_name],
            json!({ "bucket": reference(bucket_name), "block": PublicAccessBlock::locked_down() }),
        );
        for object in content {
            plan.add(&object.key, "s3:BucketObject", &[bucket_name], json!({
                "bucket": reference(bucket_name),
                "key": object.key,
                "source": object.source,
                "contentType": object.content_type,
            }));
        }

        plan.add(CERTIFICATE_LOGICAL_NAME, "acm:Certificate", &[], json!({
            "domainName": request.primary_domain,
            "subjectAlternativeNames": request.alternate_names,
            "validationMethod": "DNS",
            "tags": request.tags,
        }));
        let mut validation_records = vec![];
        for (i, name) in request.names().iter().enumerate() {
            let logical = validation_record_name(domain, i);
            let option = |field: &str| get_att(CERTIFICATE_LOGICAL_NAME, &format!("DomainValidationOptions.{i}.{field}"));
            plan.add(&logical, "route53:Record", &[CERTIFICATE_LOGICAL_NAME], json!({
                "forDomain": name,
                "hostedZoneName": parts.parent_zone,
                "name": option("ResourceRecordName"),
                "type": option("ResourceRecordType"),
                "records": [option("ResourceRecordValue")],
                "ttl": VALIDATION_RECORD_TTL,
            }));
            validation_records.push(logical);
        }
        let mut validation_deps = vec![CERTIFICATE_LOGICAL_NAME];
        validation_deps.extend(validation_records.iter().map(|s| s.as_str()));
        let fqdns: Vec<Value> = validation_records.iter().map(|r| get_att(r, "Fqdn")).collect();
        plan.add(CERTIFICATE_VALIDATION_LOGICAL_NAME, "acm:CertificateValidation", &validation_deps, json!({
            "certificateArn": get_att(CERTIFICATE_LOGICAL_NAME, "Arn"),
            "validationRecordFqdns": fqdns,
        }));

        let oac_properties = serde_json::to_value(&oac)
            .map_err(|e| SiteError::Config(format!("Failed to describe {}: {e}", oac.logical_name)))?;
        plan.add(&oac.logical_name, "cloudfront:OriginAccessControl", &[], oac_properties);
        plan.add(WEB_ACL_LOGICAL_NAME, "wafv2:WebAcl", &[], policy.document());
        plan.add(&function.logical_name, "cloudfront:Function", &[], json!({
            "name": function.name,
            "comment": function.comment,
            "runtime": function.runtime,
            "publish": function.publish,
            "code": function.code,
        }));

        plan.add(
            &distribution,
            "cloudfront:Distribution",
            &[bucket_name, &oac.logical_name, WEB_ACL_LOGICAL_NAME, &function.logical_name, CERTIFICATE_VALIDATION_LOGICAL_NAME],
            json!({
                "aliases": self.aliases.hostnames(),
                "origin": {
                    "id": get_att(bucket_name, "Arn"),
                    "domainName": get_att(bucket_name, "RegionalDomainName"),
                    "originAccessControlId": reference(&oac.logical_name),
                },
                "defaultRootObject": DEFAULT_ROOT_OBJECT,
                "webAclId": get_att(WEB_ACL_LOGICAL_NAME, "Arn"),
                "functionAssociations": [{
                    "eventType": EventType::ViewerRequest,
                    "functionArn": get_att(&function.logical_name, "Arn"),
                }],
                "viewerCertificate": {
                    "acmCertificateArn": get_att(CERTIFICATE_VALIDATION_LOGICAL_NAME, "CertificateArn"),
                    "sslSupportMethod": "sni-only",
                },
                "tags": self.tags,
            }),
        );
        plan.add(BUCKET_POLICY_LOGICAL_NAME, "s3:BucketPolicy", &[bucket_name, &distribution], json!({
            "bucket": reference(bucket_name),
            "distributionArn": get_att(&distribution, "Arn"),
            "bucketArn": get_att(bucket_name, "Arn"),
        }));

        let alias_target = json!({
            "name": get_att(&distribution, "DomainName"),
            "zoneId": get_att(&distribution, "HostedZoneId"),
            "evaluateTargetHealth": true,
        });
        plan.add(domain, "route53:Record", &[&distribution], json!({
            "name": fqdn(domain),
            "hostedZoneName": parts.parent_zone,
            "type": RecordType::A,
            "aliases": [alias_target.clone()],
        }));
        if let Some(www) = self.aliases.www() {
            plan.add(&www_alias_logical_name(domain), "route53:Record", &[&distribution], json!({
                "name": fqdn(www),
                "hostedZoneName": parts.parent_zone,
                "type": RecordType::A,
                "aliases": [alias_target],
            }));
        }
        Ok(plan)
    }

    /// Runs the whole graph against `provider`. Branches that don't depend on each
    /// other run concurrently. The first error aborts the rest of the apply, and
    /// whatever already succeeded stays in place for the next run to pick up.
    pub async fn apply<P: CloudProvider + ?Sized>(&self, provider: &P, content: &[ContentObject]) -> SiteResult<SiteOutputs> {
        let domain = self.aliases.apex();
        info!("Deploying {:?}", self.aliases.hostnames());

        let storage = async {
            let bucket = provider.ensure_bucket(&BucketSpec::for_domain(domain, self.tags.clone())).await?;
            provider.put_public_access_block(&bucket, &PublicAccessBlock::locked_down()).await?;
            for object in content {
                provider.put_object(&bucket, object).await?;
            }
            info!("Synced {} objects to {}", content.len(), bucket.uri());
            Ok::<_, SiteError>(bucket)
        };
        let orchestrator = CertificateOrchestrator::new(provider)
            .with_tags(self.tags.clone())
            .with_wait(self.wait);
        let certificate = orchestrator.provision(&self.aliases);
        let edge = async {
            let policy = build_access_rule(&host_pattern(domain))?.with_tags(self.tags.clone());
            let web_acl_arn = provider.ensure_web_acl(WEB_ACL_LOGICAL_NAME, &policy).await?;
            let oac_id = provider.ensure_origin_access_control(&OriginAccessControl::default()).await?;
            let function = RewriteFunctionProvisioner::new(provider).provision().await?;
            Ok::<_, SiteError>((web_acl_arn, oac_id, function))
        };
        let (bucket, certificate, (web_acl_arn, oac_id, function)) = tokio::try_join!(storage, certificate, edge)?;

        let spec = DistributionSpec::new(DistributionInputs {
            aliases: &self.aliases,
            bucket: &bucket,
            origin_access_control_id: &oac_id,
            web_acl_arn: &web_acl_arn,
            certificate: &certificate,
            rewrite_function: &function,
            tags: self.tags.clone(),
        });
        let distribution = provider.ensure_distribution(&spec).await?;
        info!("Distribution {} at {}", distribution.arn, distribution.domain_name);

        let authorization = build_bucket_authorization(&distribution.arn, &bucket.arn);
        provider.put_bucket_policy(&bucket, &authorization).await?;

        let records = AliasRecordPublisher::new(provider).publish(&self.aliases, &distribution).await?;

        Ok(SiteOutputs {
            content_bucket_uri: bucket.uri(),
            distribution_domain: distribution.domain_name,
            target_domain_endpoint: format!("https://{domain}/"),
            certificate_arn: certificate.arn().into(),
            records,
        })
    }
}
