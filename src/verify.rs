use std::time::Duration;

use log::{debug, info};
use serde::Serialize;

use crate::error::{SiteError, SiteResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Expectation {
    /// the site should answer normally.
    Reachable,
    /// the web ACL should refuse the request.
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCheck {
    pub url: String,
    pub expectation: Expectation,
    pub status: u16,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub checks: Vec<EndpointCheck>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

pub fn meets(expectation: Expectation, status: u16) -> bool {
    match expectation {
        Expectation::Reachable => (200..400).contains(&status),
        Expectation::Blocked => status == 403,
    }
}

fn fetch_status(agent: &ureq::Agent, url: &str) -> SiteResult<u16> {
    match agent.get(url).call() {
        Ok(resp) => Ok(resp.status()),
        Err(ureq::Error::Status(code, _)) => Ok(code),
        Err(e) => Err(SiteError::Provider(format!("Failed to request {url}\n{e}"))),
    }
}

/// the public site must answer, the raw edge domain must be refused.
pub fn verify_site(domain: &str, edge_domain: &str) -> SiteResult<VerifyReport> {
    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(15))
        .redirects(0)
        .build();
    let targets = [
        (format!("https://{domain}/"), Expectation::Reachable),
        (format!("https://{edge_domain}/"), Expectation::Blocked),
    ];
    let mut checks = vec![];
    for (url, expectation) in targets {
        debug!("GET {url}");
        let status = fetch_status(&agent, &url)?;
        let passed = meets(expectation, status);
        info!("{url} -> {status} ({})", if passed { "ok" } else { "unexpected" });
        checks.push(EndpointCheck { url, expectation, status, passed });
    }
    Ok(VerifyReport { checks })
}
