use base64::{engine::general_purpose, Engine as _};
use log::info;
use serde::{Deserialize, Serialize};

use super::*;

pub const ORIGIN_ACCESS_CONTROL_LOGICAL_NAME: &str = "origin-access-control";
pub const REWRITE_FUNCTION_LOGICAL_NAME: &str = "rewrite-url-cf-function";
pub const DEFAULT_ROOT_OBJECT: &str = "index.html";
/// seconds. shared by the default and max TTL of the default cache behavior.
pub const EDGE_CACHE_TTL: u32 = 600;

/// Appends `index.html` to directory style paths. S3 has no notion of a directory
/// index, so without this only the root `index.html` resolves.
pub const REWRITE_FUNCTION_CODE: &str = r#"function handler(event) {
    var request = event.request;
    var uri = request.uri;
    if (uri.endsWith('/')) {
        request.uri += 'index.html';
    } else if (uri.split('/').pop().indexOf('.') === -1) {
        request.uri += '/index.html';
    }
    return request;
}
"#;

/// what [`REWRITE_FUNCTION_CODE`] does to a request path.
pub fn rewrite_uri(uri: &str) -> String {
    if uri.ends_with('/') {
        return format!("{uri}index.html");
    }
    let last = uri.rsplit('/').next().unwrap_or(uri);
    if last.contains('.') {
        uri.into()
    } else {
        format!("{uri}/index.html")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "viewer-request")]
    ViewerRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteFunction {
    pub logical_name: String,
    pub name: String,
    pub comment: String,
    pub runtime: String,
    pub publish: bool,
    pub code: String,
}

impl RewriteFunction {
    pub fn url_rewriter() -> Self {
        Self {
            logical_name: REWRITE_FUNCTION_LOGICAL_NAME.into(),
            name: "rewrite-url".into(),
            comment: "Handle cloudfront's inability to handle index.htmls in subfolders".into(),
            runtime: "cloudfront-js-1.0".into(),
            publish: true,
            code: REWRITE_FUNCTION_CODE.into(),
        }
    }

    /// the CloudFront API takes function code as a blob.
    pub fn encoded_code(&self) -> String {
        general_purpose::STANDARD.encode(self.code.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteFunctionHandle {
    pub arn: String,
    pub event_type: EventType,
}

pub struct RewriteFunctionProvisioner<'a, P: ?Sized> {
    provider: &'a P,
}

impl<'a, P: CloudProvider + ?Sized> RewriteFunctionProvisioner<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    pub async fn provision(&self) -> SiteResult<RewriteFunctionHandle> {
        let function = RewriteFunction::url_rewriter();
        let arn = self.provider.ensure_function(&function).await?;
        info!("Rewrite function {arn} ready");
        Ok(RewriteFunctionHandle {
            arn,
            event_type: EventType::ViewerRequest,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginAccessControl {
    pub logical_name: String,
    pub name: String,
    pub description: String,
    pub origin_type: String,
    pub signing_behavior: String,
    pub signing_protocol: String,
}

impl Default for OriginAccessControl {
    fn default() -> Self {
        Self {
            logical_name: ORIGIN_ACCESS_CONTROL_LOGICAL_NAME.into(),
            name: "oac".into(),
            description: "Origin Access Control".into(),
            origin_type: "s3".into(),
            signing_behavior: "always".into(),
            signing_protocol: "sigv4".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    pub id: String,
    pub domain_name: String,
    pub origin_access_control_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionAssociation {
    pub event_type: EventType,
    pub function_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: String,
    pub allowed_methods: Vec<String>,
    pub cached_methods: Vec<String>,
    pub forward_cookies: bool,
    pub forward_query_string: bool,
    pub min_ttl: u32,
    pub default_ttl: u32,
    pub max_ttl: u32,
    pub function_associations: Vec<FunctionAssociation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: u16,
    pub response_code: u16,
    pub response_page_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCertificate {
    pub acm_certificate_arn: String,
    pub ssl_support_method: String,
}

/// Everything the distribution is created with. Building one requires an
/// [`IssuedCertificate`], so a distribution can't be finalized before issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSpec {
    pub logical_name: String,
    pub comment: String,
    pub enabled: bool,
    pub aliases: Vec<String>,
    pub origins: Vec<Origin>,
    pub default_root_object: String,
    pub default_cache_behavior: CacheBehavior,
    /// "100" is the cheapest and covers the europe area.
    pub price_class: String,
    pub custom_error_responses: Vec<ErrorResponse>,
    pub geo_restriction: String,
    pub viewer_certificate: ViewerCertificate,
    pub web_acl_id: String,
    pub tags: Tags,
}

pub struct DistributionInputs<'a> {
    pub aliases: &'a AliasSet,
    pub bucket: &'a BucketHandle,
    pub origin_access_control_id: &'a str,
    pub web_acl_arn: &'a str,
    pub certificate: &'a IssuedCertificate,
    pub rewrite_function: &'a RewriteFunctionHandle,
    pub tags: Tags,
}

impl DistributionSpec {
    pub fn new(inputs: DistributionInputs<'_>) -> Self {
        let methods: Vec<String> = ["GET", "HEAD", "OPTIONS"].iter().map(|m| m.to_string()).collect();
        // one origin for this distribution: the content bucket
        let origin = Origin {
            id: inputs.bucket.arn.clone(),
            domain_name: inputs.bucket.regional_domain_name.clone(),
            origin_access_control_id: inputs.origin_access_control_id.into(),
        };
        Self {
            logical_name: format!("{}-cdn", inputs.aliases.apex()),
            comment: "Cloudfront Settings for a simple static s3 website".into(),
            enabled: true,
            aliases: inputs.aliases.hostnames(),
            default_cache_behavior: CacheBehavior {
                target_origin_id: origin.id.clone(),
                viewer_protocol_policy: "redirect-to-https".into(),
                allowed_methods: methods.clone(),
                cached_methods: methods,
                forward_cookies: false,
                forward_query_string: false,
                min_ttl: 0,
                default_ttl: EDGE_CACHE_TTL,
                max_ttl: EDGE_CACHE_TTL,
                function_associations: vec![FunctionAssociation {
                    event_type: inputs.rewrite_function.event_type,
                    function_arn: inputs.rewrite_function.arn.clone(),
                }],
            },
            origins: vec![origin],
            default_root_object: DEFAULT_ROOT_OBJECT.into(),
            price_class: "PriceClass_100".into(),
            custom_error_responses: vec![ErrorResponse {
                error_code: 404,
                response_code: 404,
                response_page_path: "/404.html".into(),
            }],
            geo_restriction: "none".into(),
            viewer_certificate: ViewerCertificate {
                acm_certificate_arn: inputs.certificate.arn().into(),
                ssl_support_method: "sni-only".into(),
            },
            web_acl_id: inputs.web_acl_arn.into(),
            tags: inputs.tags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionHandle {
    pub arn: String,
    /// the `*.cloudfront.net` edge domain.
    pub domain_name: String,
    pub hosted_zone_id: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn directory_paths_get_an_index() {
        assert_eq!(rewrite_uri("/"), "/index.html");
        assert_eq!(rewrite_uri("/blog/"), "/blog/index.html");
        assert_eq!(rewrite_uri("/blog"), "/blog/index.html");
        assert_eq!(rewrite_uri("/blog/post-1"), "/blog/post-1/index.html");
    }

    #[test]
    fn file_paths_are_untouched() {
        assert_eq!(rewrite_uri("/index.html"), "/index.html");
        assert_eq!(rewrite_uri("/css/site.css"), "/css/site.css");
        assert_eq!(rewrite_uri("/v1.2/notes"), "/v1.2/notes/index.html");
    }

    #[test]
    fn function_is_bound_to_viewer_request() {
        let f = RewriteFunction::url_rewriter();
        assert_eq!(f.runtime, "cloudfront-js-1.0");
        assert!(f.publish);
        let decoded = general_purpose::STANDARD.decode(f.encoded_code()).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), REWRITE_FUNCTION_CODE);
        assert_eq!(serde_json::to_value(EventType::ViewerRequest).unwrap(), "viewer-request");
    }

    #[test]
    fn distribution_is_bound_to_certificate_and_acl() {
        let aliases = AliasSet::new(true, "example.com");
        let bucket = BucketHandle {
            name: "example.com".into(),
            arn: "arn:aws:s3:::example.com".into(),
            regional_domain_name: "example.com.s3.us-east-1.amazonaws.com".into(),
        };
        let cert = IssuedCertificate::new("arn:aws:acm:us-east-1:123456789012:certificate/abc".into(), "example.com".into(), vec![]);
        let function = RewriteFunctionHandle { arn: "arn:aws:cloudfront::123456789012:function/rewrite-url".into(), event_type: EventType::ViewerRequest };
        let spec = DistributionSpec::new(DistributionInputs {
            aliases: &aliases,
            bucket: &bucket,
            origin_access_control_id: "E2OAC",
            web_acl_arn: "arn:aws:wafv2:us-east-1:123456789012:global/webacl/x",
            certificate: &cert,
            rewrite_function: &function,
            tags: Tags::new(),
        });
        assert_eq!(spec.aliases, vec!["www.example.com", "example.com"]);
        assert_eq!(spec.viewer_certificate.acm_certificate_arn, cert.arn());
        assert_eq!(spec.viewer_certificate.ssl_support_method, "sni-only");
        assert_eq!(spec.default_cache_behavior.target_origin_id, bucket.arn);
        assert_eq!(spec.origins[0].origin_access_control_id, "E2OAC");
        assert_eq!(spec.default_cache_behavior.function_associations[0].function_arn, function.arn);
        assert_eq!(spec.default_cache_behavior.viewer_protocol_policy, "redirect-to-https");
        assert_eq!(spec.default_root_object, "index.html");
    }
}
