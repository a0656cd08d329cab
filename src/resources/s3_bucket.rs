use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::*;

pub const BUCKET_POLICY_LOGICAL_NAME: &str = "content-bucket-policy";
pub const PUBLIC_ACCESS_BLOCK_LOGICAL_NAME: &str = "content-bucket-public-access-block";
pub const CLOUDFRONT_SERVICE_PRINCIPAL: &str = "cloudfront.amazonaws.com";
pub const READ_ACTION: &str = "s3:GetObject";

/// The bucket that stores the website's static content. Website hosting is never
/// enabled on it, otherwise the private origin access control would not work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    pub logical_name: String,
    pub bucket_name: String,
    pub tags: Tags,
}

impl BucketSpec {
    pub fn for_domain(domain: &str, tags: Tags) -> Self {
        Self {
            logical_name: format!("{domain}-content-bucket"),
            bucket_name: domain.into(),
            tags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketHandle {
    pub name: String,
    pub arn: String,
    pub regional_domain_name: String,
}

impl BucketHandle {
    pub fn uri(&self) -> String {
        format!("s3://{}", self.name)
    }
}

/// Each flag closes a different public access path. Leaving any one open undoes the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    pub fn locked_down() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }

    pub fn is_locked_down(&self) -> bool {
        self.block_public_acls && self.block_public_policy && self.ignore_public_acls && self.restrict_public_buckets
    }
}

/// A read against the bucket, as the bucket policy sees it.
#[derive(Debug, Clone, Copy)]
pub struct ReadRequest<'a> {
    pub service_principal: &'a str,
    /// ARN of the distribution the request originates from, if any.
    pub source_arn: Option<&'a str>,
    pub action: &'a str,
    /// ARN of the object being read.
    pub resource: &'a str,
}

/// Grants object reads to exactly one distribution. Not a public or IP based grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketAuthorization {
    pub distribution_arn: String,
    pub bucket_arn: String,
}

impl BucketAuthorization {
    pub fn document(&self) -> Value {
        json!({
            "Id": "PolicyForCloudFrontPrivateContent",
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Sid": "AllowCloudFrontServicePrincipal",
                    "Effect": "Allow",
                    "Principal": { "Service": CLOUDFRONT_SERVICE_PRINCIPAL },
                    "Action": [READ_ACTION],
                    "Resource": [format!("{}/*", self.bucket_arn)],
                    "Condition": {
                        "StringEquals": { "AWS:SourceArn": self.distribution_arn }
                    }
                }
            ]
        })
    }

    pub fn permits(&self, request: &ReadRequest<'_>) -> bool {
        let object_prefix = format!("{}/", self.bucket_arn);
        request.service_principal == CLOUDFRONT_SERVICE_PRINCIPAL
            && request.action == READ_ACTION
            && request.resource.starts_with(&object_prefix)
            && request.resource.len() > object_prefix.len()
            && request.source_arn == Some(self.distribution_arn.as_str())
    }
}

pub fn build_bucket_authorization(distribution_identity: &str, bucket_identity: &str) -> BucketAuthorization {
    BucketAuthorization {
        distribution_arn: distribution_identity.into(),
        bucket_arn: bucket_identity.into(),
    }
}
