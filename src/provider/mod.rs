//! The primitives the orchestration calls into. Creating, diffing and tracking the
//! actual cloud resources is the provider's job. Every `ensure_*` / `upsert_*`
//! call carries a logical name, and calling it again with the same name must
//! resolve to the same resource.

use async_trait::async_trait;

use crate::content::ContentObject;
use crate::error::SiteResult;
use crate::resources::{
    AccessPolicy, BucketAuthorization, BucketHandle, BucketSpec, CertificateRequest, CertificateState,
    DistributionHandle, DistributionSpec, OriginAccessControl, PublicAccessBlock, PublishedRecord, RecordSpec,
    RewriteFunction, ValidationChallenge, ZoneId,
};

pub mod memory;

#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// `name` is a canonical zone name, eg: `example.com.`
    async fn find_zone(&self, name: &str) -> SiteResult<Option<ZoneId>>;
    async fn upsert_record(&self, zone: &ZoneId, record: &RecordSpec) -> SiteResult<PublishedRecord>;
    /// returns false if no record with that logical name exists in `zone`.
    async fn delete_record(&self, zone: &ZoneId, logical_name: &str) -> SiteResult<bool>;

    /// returns the certificate ARN.
    async fn request_certificate(&self, logical_name: &str, request: &CertificateRequest) -> SiteResult<String>;
    async fn validation_challenges(&self, certificate_arn: &str) -> SiteResult<Vec<ValidationChallenge>>;
    async fn submit_validation(&self, certificate_arn: &str, record_fqdns: &[String]) -> SiteResult<()>;
    async fn certificate_state(&self, certificate_arn: &str) -> SiteResult<CertificateState>;

    async fn ensure_bucket(&self, spec: &BucketSpec) -> SiteResult<BucketHandle>;
    async fn put_public_access_block(&self, bucket: &BucketHandle, block: &PublicAccessBlock) -> SiteResult<()>;
    async fn put_object(&self, bucket: &BucketHandle, object: &ContentObject) -> SiteResult<()>;
    async fn put_bucket_policy(&self, bucket: &BucketHandle, authorization: &BucketAuthorization) -> SiteResult<()>;

    /// returns the origin access control id.
    async fn ensure_origin_access_control(&self, spec: &OriginAccessControl) -> SiteResult<String>;
    /// returns the web ACL ARN.
    async fn ensure_web_acl(&self, logical_name: &str, policy: &AccessPolicy) -> SiteResult<String>;
    /// returns the function ARN.
    async fn ensure_function(&self, function: &RewriteFunction) -> SiteResult<String>;
    async fn ensure_distribution(&self, spec: &DistributionSpec) -> SiteResult<DistributionHandle>;
}
