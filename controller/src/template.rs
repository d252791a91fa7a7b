//! Lays out a compute pool across availability zones as one node-group template per zone.
use crate::topology::SubnetsByZone;
use models::constants::{LABEL_CLUSTER_INFRA_ID, LABEL_POOL, LABEL_ROLE, WORKER_ROLE};
use models::pool::{RootVolume, SpotMarketOptions};

use snafu::{ensure, Snafu};
use std::collections::BTreeMap;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TemplateError {
    #[snafu(display("no subnet for zone {}", zone))]
    NoSubnetForZone { zone: String },

    #[snafu(display("compute pool '{}' has no availability zones", pool))]
    NoZones { pool: String },

    #[snafu(display("compute pool '{}' has negative replicas: {}", pool, replicas))]
    NegativeReplicas { pool: String, replicas: i64 },
}

/// Everything needed to lay out a pool, with the pool's zones and image already decided.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ComputePool {
    pub name: String,
    pub replicas: i64,
    pub labels: BTreeMap<String, String>,
    pub instance_type: String,
    pub image_id: String,
    pub root_volume: RootVolume,
    /// Name of the secret worker nodes take their user data from.
    pub user_data_secret: String,
    pub zones: Vec<String>,
    pub spot_market_options: Option<SpotMarketOptions>,
}

/// A per-zone node group before cluster-specific resource references are attached.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeGroupTemplate {
    pub name: String,
    pub region: String,
    pub zone: String,
    pub replicas: i64,
    pub instance_type: String,
    pub image_id: String,
    pub root_volume: RootVolume,
    pub user_data_secret: String,
    /// Set when the pool pins explicit subnets.
    pub subnet_id: Option<String>,
    pub labels: BTreeMap<String, String>,
}

/// Builds one template per zone of `pool`, in zone order.
///
/// Replicas are spread evenly, with the first `replicas % zones` zones taking one extra. When `subnets` is not
/// empty every zone must have an entry in it.
pub fn node_group_templates(
    infra_id: &str,
    region: &str,
    subnets: &SubnetsByZone,
    pool: &ComputePool,
) -> Result<Vec<NodeGroupTemplate>, TemplateError> {
    ensure!(!pool.zones.is_empty(), NoZonesSnafu { pool: &pool.name });
    ensure!(
        pool.replicas >= 0,
        NegativeReplicasSnafu {
            pool: &pool.name,
            replicas: pool.replicas,
        }
    );

    let zone_count = pool.zones.len() as i64;
    let mut labels = pool.labels.clone();
    labels.insert(LABEL_CLUSTER_INFRA_ID.to_string(), infra_id.to_string());
    labels.insert(LABEL_POOL.to_string(), pool.name.clone());
    labels.insert(LABEL_ROLE.to_string(), WORKER_ROLE.to_string());

    pool.zones
        .iter()
        .enumerate()
        .map(|(idx, zone)| {
            let subnet_id = if subnets.is_empty() {
                None
            } else {
                Some(
                    subnets
                        .get(zone)
                        .cloned()
                        .ok_or_else(|| TemplateError::NoSubnetForZone { zone: zone.clone() })?,
                )
            };

            let mut replicas = pool.replicas / zone_count;
            if (idx as i64) < pool.replicas % zone_count {
                replicas += 1;
            }

            Ok(NodeGroupTemplate {
                name: format!("{}-{}-{}", infra_id, pool.name, zone),
                region: region.to_string(),
                zone: zone.clone(),
                replicas,
                instance_type: pool.instance_type.clone(),
                image_id: pool.image_id.clone(),
                root_volume: pool.root_volume.clone(),
                user_data_secret: pool.user_data_secret.clone(),
                subnet_id,
                labels: labels.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    fn pool(replicas: i64, zones: &[&str]) -> ComputePool {
        ComputePool {
            name: "worker".to_string(),
            replicas,
            instance_type: "m5.large".to_string(),
            image_id: "ami-1".to_string(),
            zones: zones.iter().map(|z| z.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_replica_spread() {
        let test_cases = vec![
            (3, vec!["a", "b", "c"], vec![1, 1, 1]),
            (4, vec!["a", "b", "c"], vec![2, 1, 1]),
            (5, vec!["a", "b", "c"], vec![2, 2, 1]),
            (1, vec!["a", "b", "c"], vec![1, 0, 0]),
            (0, vec!["a", "b"], vec![0, 0]),
            (7, vec!["a"], vec![7]),
        ];

        for (replicas, zones, expected) in test_cases {
            let templates =
                node_group_templates("infra", "us-east-1", &SubnetsByZone::new(), &pool(replicas, &zones))
                    .unwrap();
            let spread: Vec<i64> = templates.iter().map(|t| t.replicas).collect();
            assert_eq!(spread, expected);
        }
    }

    #[test]
    fn test_templates_follow_zone_order() {
        let subnets = btreemap! {
            "us-east-1a".to_string() => "subnet-a".to_string(),
            "us-east-1b".to_string() => "subnet-b".to_string(),
        };
        let templates = node_group_templates(
            "infra",
            "us-east-1",
            &subnets,
            &pool(2, &["us-east-1b", "us-east-1a"]),
        )
        .unwrap();

        let summary: Vec<(&str, &str, Option<&str>)> = templates
            .iter()
            .map(|t| (t.name.as_str(), t.zone.as_str(), t.subnet_id.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("infra-worker-us-east-1b", "us-east-1b", Some("subnet-b")),
                ("infra-worker-us-east-1a", "us-east-1a", Some("subnet-a")),
            ]
        );
        assert_eq!(templates[0].labels.get(LABEL_POOL).map(String::as_str), Some("worker"));
        assert_eq!(
            templates[0].labels.get(LABEL_CLUSTER_INFRA_ID).map(String::as_str),
            Some("infra")
        );
    }

    #[test]
    fn test_missing_subnet_for_zone() {
        let subnets = btreemap! { "us-east-1a".to_string() => "subnet-a".to_string() };
        let err = node_group_templates(
            "infra",
            "us-east-1",
            &subnets,
            &pool(2, &["us-east-1a", "us-east-1b"]),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "no subnet for zone us-east-1b");
    }

    #[test]
    fn test_invalid_pools() {
        assert!(matches!(
            node_group_templates("infra", "us-east-1", &SubnetsByZone::new(), &pool(1, &[])),
            Err(TemplateError::NoZones { .. })
        ));
        assert!(matches!(
            node_group_templates("infra", "us-east-1", &SubnetsByZone::new(), &pool(-1, &["a"])),
            Err(TemplateError::NegativeReplicas { .. })
        ));
    }
}
