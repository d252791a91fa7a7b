//! Names of cluster resources that generated node groups reference by convention.
//!
//! The installer creates the worker instance profile, worker security group and per-zone private subnets with
//! predictable names derived from the cluster's infra id. Those names are kept here as a table of templates rather
//! than inline formatting so the convention can be changed from configuration.
use lazy_static::lazy_static;
use regex::Regex;
use validator::Validate;

pub const INFRA_ID_PLACEHOLDER: &str = "{infra_id}";
pub const ZONE_PLACEHOLDER: &str = "{zone}";

pub const DEFAULT_WORKER_PROFILE_TEMPLATE: &str = "{infra_id}-worker-profile";
pub const DEFAULT_PRIVATE_SUBNET_TEMPLATE: &str = "{infra_id}-private-{zone}";
pub const DEFAULT_WORKER_SECURITY_GROUP_TEMPLATE: &str = "{infra_id}-worker-sg";

lazy_static! {
    pub(crate) static ref MENTIONS_INFRA_ID: Regex =
        Regex::new(r"\{infra_id\}").expect("Invalid regex literal.");
    pub(crate) static ref MENTIONS_INFRA_ID_AND_ZONE: Regex =
        Regex::new(r"\{infra_id\}.*\{zone\}|\{zone\}.*\{infra_id\}").expect("Invalid regex literal.");
}

/// Name templates for pre-existing cluster resources.
#[derive(Clone, Debug, Eq, PartialEq, Validate)]
pub struct NamingPolicy {
    #[validate(regex = "MENTIONS_INFRA_ID")]
    pub worker_profile: String,
    #[validate(regex = "MENTIONS_INFRA_ID_AND_ZONE")]
    pub private_subnet: String,
    #[validate(regex = "MENTIONS_INFRA_ID")]
    pub worker_security_group: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        NamingPolicy {
            worker_profile: DEFAULT_WORKER_PROFILE_TEMPLATE.to_string(),
            private_subnet: DEFAULT_PRIVATE_SUBNET_TEMPLATE.to_string(),
            worker_security_group: DEFAULT_WORKER_SECURITY_GROUP_TEMPLATE.to_string(),
        }
    }
}

impl NamingPolicy {
    /// Name of the IAM instance profile worker nodes run with.
    pub fn worker_profile(&self, infra_id: &str) -> String {
        render(&self.worker_profile, infra_id, "")
    }

    /// `Name` tag of the installer's private subnet in a zone.
    pub fn private_subnet(&self, infra_id: &str, zone: &str) -> String {
        render(&self.private_subnet, infra_id, zone)
    }

    /// `Name` tag of the security group worker nodes join.
    pub fn worker_security_group(&self, infra_id: &str) -> String {
        render(&self.worker_security_group, infra_id, "")
    }
}

fn render(template: &str, infra_id: &str, zone: &str) -> String {
    template
        .replace(INFRA_ID_PLACEHOLDER, infra_id)
        .replace(ZONE_PLACEHOLDER, zone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let policy = NamingPolicy::default();
        assert_eq!(policy.worker_profile("abc"), "abc-worker-profile");
        assert_eq!(policy.private_subnet("abc", "us-east-1a"), "abc-private-us-east-1a");
        assert_eq!(policy.worker_security_group("abc"), "abc-worker-sg");
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_custom_templates() {
        let policy = NamingPolicy {
            worker_profile: "profile/{infra_id}".to_string(),
            private_subnet: "{zone}.{infra_id}.private".to_string(),
            worker_security_group: "{infra_id}-nodes".to_string(),
        };
        assert!(policy.validate().is_ok());
        assert_eq!(policy.worker_profile("abc"), "profile/abc");
        assert_eq!(policy.private_subnet("abc", "eu-west-1c"), "eu-west-1c.abc.private");
        assert_eq!(policy.worker_security_group("abc"), "abc-nodes");
    }

    #[test]
    fn test_templates_must_mention_placeholders() {
        let test_cases = vec![
            ("worker-profile", DEFAULT_PRIVATE_SUBNET_TEMPLATE, DEFAULT_WORKER_SECURITY_GROUP_TEMPLATE),
            (DEFAULT_WORKER_PROFILE_TEMPLATE, "{infra_id}-private", DEFAULT_WORKER_SECURITY_GROUP_TEMPLATE),
            (DEFAULT_WORKER_PROFILE_TEMPLATE, "private-{zone}", DEFAULT_WORKER_SECURITY_GROUP_TEMPLATE),
            (DEFAULT_WORKER_PROFILE_TEMPLATE, DEFAULT_PRIVATE_SUBNET_TEMPLATE, "worker-sg"),
        ];

        for (worker_profile, private_subnet, worker_security_group) in test_cases {
            let policy = NamingPolicy {
                worker_profile: worker_profile.to_string(),
                private_subnet: private_subnet.to_string(),
                worker_security_group: worker_security_group.to_string(),
            };
            assert!(policy.validate().is_err(), "{:?}", policy);
        }
    }
}
