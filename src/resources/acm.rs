use std::time::Duration;

use indexmap::IndexSet;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::*;

/// this is the logical name of the site's certificate. there is only ever one per site.
pub const CERTIFICATE_LOGICAL_NAME: &str = "certificate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    pub primary_domain: String,
    /// contains `www.<primary_domain>` only when the site serves www.
    pub alternate_names: Vec<String>,
    pub tags: Tags,
}

impl CertificateRequest {
    pub fn for_aliases(aliases: &AliasSet, tags: Tags) -> Self {
        Self {
            primary_domain: aliases.apex().into(),
            alternate_names: aliases.alternate_names(),
            tags,
        }
    }

    /// every name that needs a validation challenge, primary first.
    pub fn names(&self) -> Vec<&str> {
        let mut out = vec![self.primary_domain.as_str()];
        out.extend(self.alternate_names.iter().map(|s| s.as_str()));
        out
    }
}

/// A DNS record the certificate authority requires as proof of domain control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationChallenge {
    pub domain_name: String,
    pub record_name: String,
    pub record_type: RecordType,
    pub record_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateState {
    PendingValidation,
    Issued,
    Failed(String),
}

/// Only handed out once the authority reports the certificate as issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCertificate {
    arn: String,
    domain: String,
    validation_record_fqdns: Vec<String>,
}

impl IssuedCertificate {
    pub(crate) fn new(arn: String, domain: String, validation_record_fqdns: Vec<String>) -> Self {
        Self { arn, domain, validation_record_fqdns }
    }

    pub fn arn(&self) -> &str {
        &self.arn
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn validation_record_fqdns(&self) -> &[String] {
        &self.validation_record_fqdns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationWait {
    pub poll_interval: Duration,
    /// covers both waiting for challenges to be published and waiting for issuance.
    pub timeout: Duration,
}

impl Default for ValidationWait {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(700),
            timeout: Duration::from_secs(75 * 60),
        }
    }
}

/// logical name of the validation record for the nth requested name.
/// the first keeps the plain `-validation` suffix, the rest are numbered from 2.
pub fn validation_record_name(domain: &str, index: usize) -> String {
    if index == 0 {
        format!("{domain}-validation")
    } else {
        format!("{domain}-validation{}", index + 1)
    }
}

/// Requests a DNS-validated certificate, publishes the challenge records and
/// waits until the authority reports it as issued.
///
/// This only works if the domain is hosted in a Route53 zone the provider can see.
pub struct CertificateOrchestrator<'a, P: ?Sized> {
    provider: &'a P,
    tags: Tags,
    wait: ValidationWait,
}

impl<'a, P: CloudProvider + ?Sized> CertificateOrchestrator<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            tags: Tags::new(),
            wait: ValidationWait::default(),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_wait(mut self, wait: ValidationWait) -> Self {
        self.wait = wait;
        self
    }

    pub async fn provision(&self, aliases: &AliasSet) -> SiteResult<IssuedCertificate> {
        // the zone has to exist before anything is requested.
        let zone = resolve_zone(self.provider, aliases.apex()).await?;

        let request = CertificateRequest::for_aliases(aliases, self.tags.clone());
        info!("Requesting certificate for {:?}", request.names());
        let arn = self.provider.request_certificate(CERTIFICATE_LOGICAL_NAME, &request).await?;
        let deadline = Instant::now() + self.wait.timeout;

        let challenges = self.await_challenges(&arn, &request, deadline).await?;

        let mut fqdns = IndexSet::new();
        for (i, challenge) in challenges.iter().enumerate() {
            let record = RecordSpec::validation(validation_record_name(aliases.apex(), i), challenge);
            let published = upsert_checked(self.provider, &zone, &record).await?;
            debug!("Validation record {} for {}", published.fqdn, challenge.domain_name);
            fqdns.insert(published.fqdn);
        }
        let fqdns: Vec<String> = fqdns.into_iter().collect();
        // names dropped from the request leave their challenge records behind
        for i in challenges.len()..MAX_HOSTNAMES {
            let stale = validation_record_name(aliases.apex(), i);
            if self.provider.delete_record(&zone, &stale).await? {
                info!("Removed validation record {stale}");
            }
        }

        self.provider.submit_validation(&arn, &fqdns).await?;
        self.await_issued(&arn, deadline).await?;
        info!("Certificate {arn} issued");
        Ok(IssuedCertificate::new(arn, request.primary_domain, fqdns))
    }

    /// one challenge per requested name, in request order. the authority may
    /// take a moment to publish them, so this polls until the deadline.
    async fn await_challenges(&self, arn: &str, request: &CertificateRequest, deadline: Instant) -> SiteResult<Vec<ValidationChallenge>> {
        loop {
            let available = self.provider.validation_challenges(arn).await?;
            let mut ordered = Vec::with_capacity(request.names().len());
            for name in request.names() {
                match available.iter().find(|c| c.domain_name == name) {
                    Some(c) => ordered.push(c.clone()),
                    None => break,
                }
            }
            if ordered.len() == request.names().len() {
                return Ok(ordered);
            }
            debug!("Waiting for validation challenges of {arn} ({}/{})", ordered.len(), request.names().len());
            self.sleep_until_next_poll(arn, deadline).await?;
        }
    }

    async fn await_issued(&self, arn: &str, deadline: Instant) -> SiteResult<()> {
        loop {
            match self.provider.certificate_state(arn).await? {
                CertificateState::Issued => return Ok(()),
                CertificateState::Failed(reason) => {
                    return Err(SiteError::CertificateIssuanceFailed {
                        certificate: arn.into(),
                        reason,
                    });
                }
                CertificateState::PendingValidation => {
                    debug!("Certificate {arn} pending validation");
                    self.sleep_until_next_poll(arn, deadline).await?;
                }
            }
        }
    }

    async fn sleep_until_next_poll(&self, arn: &str, deadline: Instant) -> SiteResult<()> {
        let now = Instant::now();
        if now >= deadline {
            warn!("Gave up waiting on certificate {arn}");
            return Err(SiteError::CertificateValidationTimeout {
                certificate: arn.into(),
                waited_secs: self.wait.timeout.as_secs(),
            });
        }
        let next = std::cmp::min(now + self.wait.poll_interval, deadline);
        tokio::time::sleep_until(next).await;
        Ok(())
    }
}
