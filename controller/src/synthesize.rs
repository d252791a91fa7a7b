//! Turns a resolved topology and a compute pool into node-group definitions that reuse the cluster's existing
//! instance profile, security group and subnets.
use crate::naming::NamingPolicy;
use crate::template::{node_group_templates, ComputePool, NodeGroupTemplate, TemplateError};
use crate::topology::SubnetsByZone;
use models::constants::TAG_NAME_FILTER;
use models::nodegroup::{NodeGroupDefinition, ResourceReference};

use tracing::instrument;

/// Produces node-group definitions according to a `NamingPolicy`.
#[derive(Clone, Debug, Default)]
pub struct NodeGroupSynthesizer {
    naming: NamingPolicy,
}

impl NodeGroupSynthesizer {
    pub fn new(naming: NamingPolicy) -> Self {
        NodeGroupSynthesizer { naming }
    }

    /// Builds one definition per zone of `pool`, in zone order.
    ///
    /// `subnets` holds explicitly requested subnets by zone and is empty when the pool relies on the installer's
    /// per-zone private subnets.
    #[instrument(skip(self, subnets, pool), fields(pool = %pool.name), err)]
    pub fn synthesize(
        &self,
        infra_id: &str,
        region: &str,
        subnets: &SubnetsByZone,
        pool: &ComputePool,
    ) -> Result<Vec<NodeGroupDefinition>, TemplateError> {
        let templates = node_group_templates(infra_id, region, subnets, pool)?;
        Ok(templates
            .into_iter()
            .map(|template| self.definition_from_template(template, infra_id, pool))
            .collect())
    }

    /// Completes a template with references to the cluster's pre-existing resources.
    fn definition_from_template(
        &self,
        template: NodeGroupTemplate,
        infra_id: &str,
        pool: &ComputePool,
    ) -> NodeGroupDefinition {
        let subnet = match template.subnet_id {
            Some(subnet_id) => ResourceReference::Id(subnet_id),
            None => ResourceReference::filter(
                TAG_NAME_FILTER,
                self.naming.private_subnet(infra_id, &template.zone),
            ),
        };

        NodeGroupDefinition {
            name: template.name,
            region: template.region,
            zone: template.zone,
            replicas: template.replicas,
            instance_type: template.instance_type,
            image_id: template.image_id,
            root_volume: template.root_volume,
            user_data_secret: template.user_data_secret,
            subnet,
            iam_instance_profile: ResourceReference::Id(self.naming.worker_profile(infra_id)),
            security_groups: vec![ResourceReference::filter(
                TAG_NAME_FILTER,
                self.naming.worker_security_group(infra_id),
            )],
            spot_market_options: pool.spot_market_options.clone(),
            labels: template.labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use models::nodegroup::Filter;
    use models::pool::SpotMarketOptions;

    fn pool(zones: &[&str], spot_market_options: Option<SpotMarketOptions>) -> ComputePool {
        ComputePool {
            name: "worker".to_string(),
            replicas: zones.len() as i64,
            instance_type: "m5.large".to_string(),
            image_id: "ami-1".to_string(),
            zones: zones.iter().map(|z| z.to_string()).collect(),
            spot_market_options,
            ..Default::default()
        }
    }

    fn tag_name(value: &str) -> ResourceReference {
        ResourceReference::Filters(vec![Filter {
            name: "tag:Name".to_string(),
            values: vec![value.to_string()],
        }])
    }

    #[test]
    fn test_references_by_convention() {
        let definitions = NodeGroupSynthesizer::default()
            .synthesize("abc", "us-east-1", &SubnetsByZone::new(), &pool(&["us-east-1a"], None))
            .unwrap();

        assert_eq!(definitions.len(), 1);
        let definition = &definitions[0];
        assert_eq!(definition.subnet, tag_name("abc-private-us-east-1a"));
        assert_eq!(
            definition.iam_instance_profile,
            ResourceReference::Id("abc-worker-profile".to_string())
        );
        assert_eq!(definition.security_groups, vec![tag_name("abc-worker-sg")]);
        assert_eq!(definition.spot_market_options, None);
    }

    #[test]
    fn test_explicit_subnets_are_used_by_id() {
        let subnets = btreemap! {
            "us-east-1a".to_string() => "subnet-a".to_string(),
            "us-east-1b".to_string() => "subnet-b".to_string(),
        };
        let definitions = NodeGroupSynthesizer::default()
            .synthesize("abc", "us-east-1", &subnets, &pool(&["us-east-1a", "us-east-1b"], None))
            .unwrap();

        let subnet_ids: Vec<Option<&str>> = definitions.iter().map(|d| d.subnet.id()).collect();
        assert_eq!(subnet_ids, vec![Some("subnet-a"), Some("subnet-b")]);
    }

    #[test]
    fn test_spot_options_attached_only_when_requested() {
        let spot = SpotMarketOptions {
            max_price: Some("0.12".to_string()),
        };
        let definitions = NodeGroupSynthesizer::default()
            .synthesize(
                "abc",
                "us-east-1",
                &SubnetsByZone::new(),
                &pool(&["us-east-1a", "us-east-1b"], Some(spot.clone())),
            )
            .unwrap();
        assert!(definitions
            .iter()
            .all(|d| d.spot_market_options.as_ref() == Some(&spot)));

        let serialized = serde_json::to_value(
            &NodeGroupSynthesizer::default()
                .synthesize("abc", "us-east-1", &SubnetsByZone::new(), &pool(&["us-east-1a"], None))
                .unwrap()[0],
        )
        .unwrap();
        assert!(serialized.get("spot_market_options").is_none());
    }

    #[test]
    fn test_custom_naming_policy() {
        let naming = NamingPolicy {
            worker_profile: "{infra_id}-nodes".to_string(),
            private_subnet: "{infra_id}-{zone}-internal".to_string(),
            worker_security_group: "{infra_id}-nodes-sg".to_string(),
        };
        let definitions = NodeGroupSynthesizer::new(naming)
            .synthesize("abc", "us-east-1", &SubnetsByZone::new(), &pool(&["us-east-1c"], None))
            .unwrap();

        assert_eq!(definitions[0].subnet, tag_name("abc-us-east-1c-internal"));
        assert_eq!(
            definitions[0].iam_instance_profile,
            ResourceReference::Id("abc-nodes".to_string())
        );
        assert_eq!(definitions[0].security_groups, vec![tag_name("abc-nodes-sg")]);
    }

    #[test]
    fn test_no_subnet_for_zone_is_surfaced() {
        let subnets = btreemap! { "us-east-1a".to_string() => "subnet-a".to_string() };
        let err = NodeGroupSynthesizer::default()
            .synthesize("abc", "us-east-1", &subnets, &pool(&["us-east-1a", "us-east-1b"], None))
            .unwrap_err();
        assert!(matches!(err, TemplateError::NoSubnetForZone { zone } if zone == "us-east-1b"));
    }
}
