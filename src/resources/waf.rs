use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::*;

/// lowest number is evaluated first.
pub const ACCESS_RULE_PRIORITY: u32 = 100;
pub const ACCESS_RULE_NAME: &str = "blockDirectAccessToCloudfront";
pub const WEB_ACL_NAME: &str = "webAclBlockDirectAccessToCloudfront";
pub const WEB_ACL_LOGICAL_NAME: &str = "block-direct-access-to-cloudfront";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Block,
}

/// matches when the request's `Host` header matches `pattern`.
#[derive(Debug, Clone)]
pub struct HostHeaderRule {
    pub name: String,
    pub priority: u32,
    pub action: RuleAction,
    pattern: Regex,
}

impl HostHeaderRule {
    pub fn new(name: &str, priority: u32, action: RuleAction, pattern: &str) -> SiteResult<Self> {
        if name.is_empty() {
            return Err(SiteError::AccessPolicyConflict("rule name must not be empty".into()));
        }
        if pattern.is_empty() {
            return Err(SiteError::AccessPolicyConflict(format!("rule '{name}' has an empty host pattern")));
        }
        let pattern = Regex::new(pattern)
            .map_err(|e| SiteError::AccessPolicyConflict(format!("rule '{name}' has an invalid host pattern: {e}")))?;
        Ok(Self { name: name.into(), priority, action, pattern })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, host: &str) -> bool {
        self.pattern.is_match(host)
    }
}

/// Web ACL attached to the distribution. Anything not explicitly allowed is blocked,
/// which keeps the raw `*.cloudfront.net` address unusable.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pub name: String,
    pub description: String,
    pub default_action: RuleAction,
    rules: Vec<HostHeaderRule>,
    pub tags: Tags,
}

impl AccessPolicy {
    pub fn new(name: &str, default_action: RuleAction, rules: Vec<HostHeaderRule>) -> SiteResult<Self> {
        let mut names = HashSet::new();
        let mut priorities = HashSet::new();
        for rule in &rules {
            if !names.insert(rule.name.as_str()) {
                return Err(SiteError::AccessPolicyConflict(format!("duplicate rule name '{}'", rule.name)));
            }
            if !priorities.insert(rule.priority) {
                return Err(SiteError::AccessPolicyConflict(format!(
                    "rule '{}' reuses priority {}",
                    rule.name, rule.priority
                )));
            }
        }
        let mut rules = rules;
        rules.sort_by_key(|r| r.priority);
        Ok(Self {
            name: name.into(),
            description: "Web ACL to block direct access to the cfnid.cloudfront.net address".into(),
            default_action,
            rules,
            tags: Tags::new(),
        })
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// rules in evaluation order.
    pub fn rules(&self) -> &[HostHeaderRule] {
        &self.rules
    }

    pub fn evaluate(&self, host: &str) -> RuleAction {
        self.rules
            .iter()
            .find(|r| r.matches(host))
            .map(|r| r.action)
            .unwrap_or(self.default_action)
    }

    /// WAFv2 shaped description of this ACL.
    pub fn document(&self) -> Value {
        let action = |a: RuleAction| match a {
            RuleAction::Allow => json!({ "allow": {} }),
            RuleAction::Block => json!({ "block": {} }),
        };
        let rules: Vec<Value> = self.rules.iter().map(|r| json!({
            "name": r.name,
            "priority": r.priority,
            "action": action(r.action),
            "statement": {
                "regexMatchStatement": {
                    "fieldToMatch": { "singleHeader": { "name": "host" } },
                    "regexString": r.pattern(),
                    "textTransformations": [{ "priority": 0, "type": "NONE" }],
                }
            },
            "visibilityConfig": {
                "cloudwatchMetricsEnabled": false,
                "metricName": r.name,
                "sampledRequestsEnabled": false,
            },
        })).collect();
        json!({
            "name": self.name,
            "description": self.description,
            "scope": "CLOUDFRONT",
            "defaultAction": action(self.default_action),
            "rules": rules,
            "tags": self.tags,
            "visibilityConfig": {
                "cloudwatchMetricsEnabled": false,
                "metricName": self.name,
                "sampledRequestsEnabled": false,
            },
        })
    }
}

/// `Host` values the distribution accepts: the apex domain and its www variant, nothing else.
pub fn host_pattern(domain: &str) -> String {
    format!("^(?:www\\.)?{}$", regex::escape(domain.trim_end_matches('.')))
}

pub fn build_access_rule(allowed_host_pattern: &str) -> SiteResult<AccessPolicy> {
    let rule = HostHeaderRule::new(ACCESS_RULE_NAME, ACCESS_RULE_PRIORITY, RuleAction::Allow, allowed_host_pattern)?;
    AccessPolicy::new(WEB_ACL_NAME, RuleAction::Block, vec![rule])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_site_hosts_are_allowed() {
        let policy = build_access_rule(&host_pattern("example.com")).unwrap();
        assert_eq!(policy.evaluate("example.com"), RuleAction::Allow);
        assert_eq!(policy.evaluate("www.example.com"), RuleAction::Allow);
        assert_eq!(policy.evaluate("evil.com"), RuleAction::Block);
        assert_eq!(policy.evaluate("d111111abcdef8.cloudfront.net"), RuleAction::Block);
    }

    #[test]
    fn lookalike_hosts_are_blocked() {
        let policy = build_access_rule(&host_pattern("example.com")).unwrap();
        assert_eq!(policy.evaluate("exampleXcom"), RuleAction::Block);
        assert_eq!(policy.evaluate("example.com.evil.net"), RuleAction::Block);
        assert_eq!(policy.evaluate("wwwXexample.com"), RuleAction::Block);
        assert_eq!(policy.evaluate("api.example.com"), RuleAction::Block);
    }

    #[test]
    fn rule_shape() {
        let policy = build_access_rule(&host_pattern("example.com")).unwrap();
        assert_eq!(policy.default_action, RuleAction::Block);
        assert_eq!(policy.rules().len(), 1);
        assert_eq!(policy.rules()[0].priority, 100);
        assert_eq!(policy.rules()[0].action, RuleAction::Allow);
        let doc = policy.document();
        assert_eq!(doc["scope"], "CLOUDFRONT");
        assert_eq!(doc["defaultAction"], json!({ "block": {} }));
        assert_eq!(doc["rules"][0]["statement"]["regexMatchStatement"]["fieldToMatch"]["singleHeader"]["name"], "host");
    }

    #[test]
    fn invalid_regex_is_a_conflict() {
        let err = build_access_rule("^(example\\.com").unwrap_err();
        assert!(matches!(err, SiteError::AccessPolicyConflict(_)));
    }

    #[test]
    fn duplicate_priorities_are_a_conflict() {
        let a = HostHeaderRule::new("a", 100, RuleAction::Allow, "^a$").unwrap();
        let b = HostHeaderRule::new("b", 100, RuleAction::Allow, "^b$").unwrap();
        let err = AccessPolicy::new("acl", RuleAction::Block, vec![a, b]).unwrap_err();
        assert!(matches!(err, SiteError::AccessPolicyConflict(_)));
    }

    #[test]
    fn lower_priority_number_wins() {
        let block = HostHeaderRule::new("block-staging", 10, RuleAction::Block, "^staging\\.").unwrap();
        let allow = HostHeaderRule::new("allow-all", 100, RuleAction::Allow, ".*").unwrap();
        let policy = AccessPolicy::new("acl", RuleAction::Block, vec![allow, block]).unwrap();
        assert_eq!(policy.rules()[0].name, "block-staging");
        assert_eq!(policy.evaluate("staging.example.com"), RuleAction::Block);
        assert_eq!(policy.evaluate("example.com"), RuleAction::Allow);
    }
}
