//! A provider that keeps everything in memory. Resources are keyed by logical
//! name, so applying the same site twice only creates things once. Used by the
//! `simulate` command and throughout the tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use log::debug;

use super::CloudProvider;
use crate::content::ContentObject;
use crate::domain::canonical_zone_name;
use crate::error::{SiteError, SiteResult};
use crate::resources::{
    fqdn, AccessPolicy, BucketAuthorization, BucketHandle, BucketSpec, CertificateRequest, CertificateState,
    DistributionHandle, DistributionSpec, OriginAccessControl, PublicAccessBlock, PublishedRecord, RecordSpec,
    RecordTarget, RecordType, RewriteFunction, ValidationChallenge, ZoneId, CLOUDFRONT_HOSTED_ZONE_ID,
};

const ACCOUNT_ID: &str = "123456789012";
const REGION: &str = "us-east-1";

/// what the simulated certificate authority does once validation proof is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IssuanceBehavior {
    /// issue as soon as every challenge record is in place.
    #[default]
    Issue,
    /// never leave pending validation.
    Stall,
    Fail(String),
}

#[derive(Debug)]
struct Certificate {
    arn: String,
    request: CertificateRequest,
    challenge_polls: u32,
    submitted: Option<Vec<String>>,
}

#[derive(Debug)]
struct Bucket {
    handle: BucketHandle,
    public_access_block: Option<PublicAccessBlock>,
    policy: Option<BucketAuthorization>,
    objects: BTreeMap<String, ContentObject>,
}

#[derive(Debug, Default)]
struct State {
    zones: BTreeMap<String, ZoneId>,
    records: BTreeMap<String, (ZoneId, RecordSpec)>,
    certificates: BTreeMap<String, Certificate>,
    buckets: BTreeMap<String, Bucket>,
    origin_access_controls: BTreeMap<String, String>,
    web_acls: BTreeMap<String, String>,
    functions: BTreeMap<String, String>,
    distributions: BTreeMap<String, (DistributionSpec, DistributionHandle)>,
    created: Vec<String>,
    issuance: IssuanceBehavior,
    challenge_delay: u32,
}

impl State {
    fn created(&mut self, kind: &str, logical_name: &str) {
        debug!("created {kind} {logical_name}");
        self.created.push(format!("{kind}:{logical_name}"));
    }

    fn certificate_by_arn(&self, arn: &str) -> SiteResult<&Certificate> {
        self.certificates
            .values()
            .find(|c| c.arn == arn)
            .ok_or_else(|| SiteError::Provider(format!("Unknown certificate {arn}")))
    }

    fn certificate_by_arn_mut(&mut self, arn: &str) -> SiteResult<&mut Certificate> {
        self.certificates
            .values_mut()
            .find(|c| c.arn == arn)
            .ok_or_else(|| SiteError::Provider(format!("Unknown certificate {arn}")))
    }

    fn has_record(&self, name: &str, value: &str) -> bool {
        self.records.values().any(|(_, r)| {
            r.name == name && matches!(&r.target, RecordTarget::Values { values, .. } if values.iter().any(|v| v == value))
        })
    }

    fn bucket_mut(&mut self, name: &str) -> SiteResult<&mut Bucket> {
        self.buckets
            .values_mut()
            .find(|b| b.handle.name == name)
            .ok_or_else(|| SiteError::Provider(format!("Unknown bucket {name}")))
    }
}

/// stable across runs, so identities derived from names stay the same between applies.
fn stable_id(input: &str) -> u32 {
    adler::adler32_slice(input.as_bytes())
}

fn challenge_for(domain: &str) -> ValidationChallenge {
    ValidationChallenge {
        domain_name: domain.into(),
        record_name: format!("_{:08x}.{}.", stable_id(domain), domain),
        record_type: RecordType::Cname,
        record_value: format!("_{:08x}.acm-validations.aws.", stable_id(&format!("value:{domain}"))),
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProvider {
    state: Mutex<State>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(self, name: &str) -> Self {
        let canonical = canonical_zone_name(name);
        let id = ZoneId(format!("Z{:08X}", stable_id(&canonical)));
        self.lock().zones.insert(canonical, id);
        self
    }

    pub fn with_issuance(self, issuance: IssuanceBehavior) -> Self {
        self.set_issuance(issuance);
        self
    }

    /// number of times challenges are reported missing before the authority publishes them.
    pub fn with_challenge_delay(self, polls: u32) -> Self {
        self.lock().challenge_delay = polls;
        self
    }

    /// applies to certificates already pending as well as new ones.
    pub fn set_issuance(&self, issuance: IssuanceBehavior) {
        self.lock().issuance = issuance;
    }

    /// poisoning is ignored. state only changes through whole inserts and removals.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn creation_count(&self) -> usize {
        self.lock().created.len()
    }

    /// `kind:logical-name` for every resource created so far, in creation order.
    pub fn creations(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    pub fn records_in_zone(&self, zone_name: &str) -> Vec<RecordSpec> {
        let state = self.lock();
        let zone = match state.zones.get(&canonical_zone_name(zone_name)) {
            Some(z) => z.clone(),
            None => return vec![],
        };
        state.records.values().filter(|(z, _)| *z == zone).map(|(_, r)| r.clone()).collect()
    }

    pub fn submitted_proofs(&self, certificate_arn: &str) -> Option<Vec<String>> {
        let state = self.lock();
        state.certificate_by_arn(certificate_arn).ok().and_then(|c| c.submitted.clone())
    }

    pub fn bucket_policy(&self, bucket_name: &str) -> Option<BucketAuthorization> {
        let state = self.lock();
        state.buckets.values().find(|b| b.handle.name == bucket_name).and_then(|b| b.policy.clone())
    }

    pub fn public_access_block(&self, bucket_name: &str) -> Option<PublicAccessBlock> {
        let state = self.lock();
        state.buckets.values().find(|b| b.handle.name == bucket_name).and_then(|b| b.public_access_block)
    }

    pub fn object_keys(&self, bucket_name: &str) -> Vec<String> {
        let state = self.lock();
        state
            .buckets
            .values()
            .find(|b| b.handle.name == bucket_name)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn distribution(&self, logical_name: &str) -> Option<DistributionSpec> {
        self.lock().distributions.get(logical_name).map(|(spec, _)| spec.clone())
    }
}

#[async_trait]
impl CloudProvider for InMemoryProvider {
    async fn find_zone(&self, name: &str) -> SiteResult<Option<ZoneId>> {
        Ok(self.lock().zones.get(&canonical_zone_name(name)).cloned())
    }

    async fn upsert_record(&self, zone: &ZoneId, record: &RecordSpec) -> SiteResult<PublishedRecord> {
        let mut state = self.lock();
        if !state.zones.values().any(|z| z == zone) {
            return Err(SiteError::Provider(format!("Unknown hosted zone {zone}")));
        }
        let existed = state.records.insert(record.logical_name.clone(), (zone.clone(), record.clone()));
        if existed.is_none() {
            state.created("route53:Record", &record.logical_name);
        }
        Ok(PublishedRecord {
            logical_name: record.logical_name.clone(),
            fqdn: fqdn(&record.name),
            zone_id: zone.clone(),
            record_type: record.record_type,
        })
    }

    async fn delete_record(&self, zone: &ZoneId, logical_name: &str) -> SiteResult<bool> {
        let mut state = self.lock();
        match state.records.get(logical_name) {
            Some((z, _)) if z == zone => {}
            _ => return Ok(false),
        }
        state.records.remove(logical_name);
        debug!("deleted route53:Record {logical_name}");
        Ok(true)
    }

    async fn request_certificate(&self, logical_name: &str, request: &CertificateRequest) -> SiteResult<String> {
        let mut state = self.lock();
        if let Some(existing) = state.certificates.get(logical_name) {
            if existing.request == *request {
                return Ok(existing.arn.clone());
            }
        }
        // certificates can't be modified, a changed request replaces the certificate.
        let arn = format!(
            "arn:aws:acm:{REGION}:{ACCOUNT_ID}:certificate/{:08x}",
            stable_id(&format!("{logical_name}:{:?}", request.names()))
        );
        state.certificates.insert(logical_name.into(), Certificate {
            arn: arn.clone(),
            request: request.clone(),
            challenge_polls: 0,
            submitted: None,
        });
        state.created("acm:Certificate", logical_name);
        Ok(arn)
    }

    async fn validation_challenges(&self, certificate_arn: &str) -> SiteResult<Vec<ValidationChallenge>> {
        let mut state = self.lock();
        let delay = state.challenge_delay;
        let cert = state.certificate_by_arn_mut(certificate_arn)?;
        if cert.challenge_polls < delay {
            cert.challenge_polls += 1;
            return Ok(vec![]);
        }
        Ok(cert.request.names().into_iter().map(challenge_for).collect())
    }

    async fn submit_validation(&self, certificate_arn: &str, record_fqdns: &[String]) -> SiteResult<()> {
        let mut state = self.lock();
        let cert = state.certificate_by_arn_mut(certificate_arn)?;
        cert.submitted = Some(record_fqdns.to_vec());
        Ok(())
    }

    async fn certificate_state(&self, certificate_arn: &str) -> SiteResult<CertificateState> {
        let state = self.lock();
        let cert = state.certificate_by_arn(certificate_arn)?;
        let submitted = match &cert.submitted {
            Some(s) => s,
            None => return Ok(CertificateState::PendingValidation),
        };
        match &state.issuance {
            IssuanceBehavior::Stall => return Ok(CertificateState::PendingValidation),
            IssuanceBehavior::Fail(reason) => return Ok(CertificateState::Failed(reason.clone())),
            IssuanceBehavior::Issue => {}
        }
        let validated = cert.request.names().into_iter().map(challenge_for).all(|c| {
            submitted.contains(&c.record_name) && state.has_record(&c.record_name, &c.record_value)
        });
        if validated {
            Ok(CertificateState::Issued)
        } else {
            Ok(CertificateState::PendingValidation)
        }
    }

    async fn ensure_bucket(&self, spec: &BucketSpec) -> SiteResult<BucketHandle> {
        let mut state = self.lock();
        if let Some(b) = state.buckets.get(&spec.logical_name) {
            return Ok(b.handle.clone());
        }
        let handle = BucketHandle {
            name: spec.bucket_name.clone(),
            arn: format!("arn:aws:s3:::{}", spec.bucket_name),
            regional_domain_name: format!("{}.s3.{REGION}.amazonaws.com", spec.bucket_name),
        };
        state.buckets.insert(spec.logical_name.clone(), Bucket {
            handle: handle.clone(),
            public_access_block: None,
            policy: None,
            objects: BTreeMap::new(),
        });
        state.created("s3:Bucket", &spec.logical_name);
        Ok(handle)
    }

    async fn put_public_access_block(&self, bucket: &BucketHandle, block: &PublicAccessBlock) -> SiteResult<()> {
        let mut state = self.lock();
        let b = state.bucket_mut(&bucket.name)?;
        let first = b.public_access_block.replace(*block).is_none();
        if first {
            state.created("s3:BucketPublicAccessBlock", &bucket.name);
        }
        Ok(())
    }

    async fn put_object(&self, bucket: &BucketHandle, object: &ContentObject) -> SiteResult<()> {
        let mut state = self.lock();
        let b = state.bucket_mut(&bucket.name)?;
        let first = b.objects.insert(object.key.clone(), object.clone()).is_none();
        if first {
            state.created("s3:BucketObject", &object.key);
        }
        Ok(())
    }

    async fn put_bucket_policy(&self, bucket: &BucketHandle, authorization: &BucketAuthorization) -> SiteResult<()> {
        let mut state = self.lock();
        let b = state.bucket_mut(&bucket.name)?;
        let first = b.policy.replace(authorization.clone()).is_none();
        if first {
            state.created("s3:BucketPolicy", &bucket.name);
        }
        Ok(())
    }

    async fn ensure_origin_access_control(&self, spec: &OriginAccessControl) -> SiteResult<String> {
        let mut state = self.lock();
        if let Some(id) = state.origin_access_controls.get(&spec.logical_name) {
            return Ok(id.clone());
        }
        let id = format!("E{:08X}", stable_id(&spec.name));
        state.origin_access_controls.insert(spec.logical_name.clone(), id.clone());
        state.created("cloudfront:OriginAccessControl", &spec.logical_name);
        Ok(id)
    }

    async fn ensure_web_acl(&self, logical_name: &str, policy: &AccessPolicy) -> SiteResult<String> {
        let mut state = self.lock();
        if let Some(arn) = state.web_acls.get(logical_name) {
            return Ok(arn.clone());
        }
        let arn = format!(
            "arn:aws:wafv2:{REGION}:{ACCOUNT_ID}:global/webacl/{}/{:08x}",
            policy.name,
            stable_id(logical_name)
        );
        state.web_acls.insert(logical_name.into(), arn.clone());
        state.created("wafv2:WebAcl", logical_name);
        Ok(arn)
    }

    async fn ensure_function(&self, function: &RewriteFunction) -> SiteResult<String> {
        let mut state = self.lock();
        if let Some(arn) = state.functions.get(&function.logical_name) {
            return Ok(arn.clone());
        }
        let arn = format!("arn:aws:cloudfront::{ACCOUNT_ID}:function/{}", function.name);
        state.functions.insert(function.logical_name.clone(), arn.clone());
        state.created("cloudfront:Function", &function.logical_name);
        Ok(arn)
    }

    async fn ensure_distribution(&self, spec: &DistributionSpec) -> SiteResult<DistributionHandle> {
        let mut state = self.lock();
        let cert_arn = &spec.viewer_certificate.acm_certificate_arn;
        if !state.certificates.values().any(|c| &c.arn == cert_arn) {
            return Err(SiteError::Provider(format!("Distribution references unknown certificate {cert_arn}")));
        }
        if !state.web_acls.values().any(|arn| arn == &spec.web_acl_id) {
            return Err(SiteError::Provider(format!("Distribution references unknown web ACL {}", spec.web_acl_id)));
        }
        let existing = state.distributions.get(&spec.logical_name).map(|(_, h)| h.clone());
        let handle = match existing {
            Some(h) => h,
            None => {
                let id = stable_id(&spec.logical_name);
                DistributionHandle {
                    arn: format!("arn:aws:cloudfront::{ACCOUNT_ID}:distribution/E{id:08X}"),
                    domain_name: format!("d{id:08x}.cloudfront.net"),
                    hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.into(),
                }
            }
        };
        let previous = state.distributions.insert(spec.logical_name.clone(), (spec.clone(), handle.clone()));
        if previous.is_none() {
            state.created("cloudfront:Distribution", &spec.logical_name);
        }
        Ok(handle)
    }
}
