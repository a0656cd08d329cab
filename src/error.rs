use thiserror::Error;

pub type SiteResult<T> = Result<T, SiteError>;

/// Every failure aborts the remaining apply. Nothing here is retried internally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SiteError {
    #[error("No top level domain found on '{0}'")]
    InvalidDomain(String),

    #[error("No hosted zone found matching '{0}'. Create the zone before deploying")]
    ZoneNotFound(String),

    #[error("Certificate {certificate} was not issued within {waited_secs}s")]
    CertificateValidationTimeout { certificate: String, waited_secs: u64 },

    #[error("Certificate {certificate} failed validation: {reason}")]
    CertificateIssuanceFailed { certificate: String, reason: String },

    #[error("Invalid access policy: {0}")]
    AccessPolicyConflict(String),

    #[error("Invalid site configuration: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("I/O error: {0}")]
    Io(String),
}
