//! Builds and validates the availability zone to subnet mapping of a pool.
use crate::classify::SubnetsById;

use snafu::Snafu;
use std::collections::{BTreeMap, BTreeSet};

/// Availability zone name to subnet id.
pub type SubnetsByZone = BTreeMap<String, String>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TopologyError {
    #[snafu(display(
        "more than one subnet found for some availability zones, conflicting subnets: {}",
        subnet_ids.join(", ")
    ))]
    ConflictingSubnets { subnet_ids: Vec<String> },

    #[snafu(display("insufficient public subnets for availability zones and private subnets"))]
    InsufficientPublicSubnets { zones: Vec<String> },
}

/// The result of assigning subnets to zones: the first subnet seen for each zone, plus every subnet that had to
/// compete for a zone.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ZoneAssignment {
    pub subnets_by_zone: SubnetsByZone,
    pub conflicting: BTreeSet<String>,
}

/// Assigns each subnet to its zone. Subnets are visited in id order, so the incumbent of a contested zone is the
/// subnet with the lowest id; both it and each challenger are recorded as conflicting.
pub fn assign_zones(subnets: &SubnetsById) -> ZoneAssignment {
    let mut assignment = ZoneAssignment::default();
    for subnet in subnets.values() {
        match assignment.subnets_by_zone.get(&subnet.availability_zone) {
            Some(incumbent) => {
                assignment.conflicting.insert(incumbent.clone());
                assignment.conflicting.insert(subnet.id.clone());
            }
            None => {
                assignment
                    .subnets_by_zone
                    .insert(subnet.availability_zone.clone(), subnet.id.clone());
            }
        }
    }
    assignment
}

/// Ensures there is at most one subnet per availability zone and returns the zone mapping.
pub fn validate_subnets(subnets: &SubnetsById) -> Result<SubnetsByZone, TopologyError> {
    let assignment = assign_zones(subnets);
    if !assignment.conflicting.is_empty() {
        return ConflictingSubnetsSnafu {
            subnet_ids: assignment.conflicting.into_iter().collect::<Vec<_>>(),
        }
        .fail();
    }
    Ok(assignment.subnets_by_zone)
}

/// Ensures that, if any public subnets exist, every zone with a private subnet also has a public subnet.
///
/// Public subnets are not used for placement, but a zone missing one points to a broken network layout.
pub fn check_public_subnet_parity(
    public_by_zone: &SubnetsByZone,
    private_by_zone: &SubnetsByZone,
) -> Result<(), TopologyError> {
    if public_by_zone.is_empty() {
        return Ok(());
    }
    let zones: Vec<String> = private_by_zone
        .keys()
        .filter(|zone| !public_by_zone.contains_key(*zone))
        .cloned()
        .collect();
    if zones.is_empty() {
        Ok(())
    } else {
        InsufficientPublicSubnetsSnafu { zones }.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::test::fake_subnet;
    use maplit::btreemap;

    fn by_id(subnets: &[(&str, &str)]) -> SubnetsById {
        subnets
            .iter()
            .map(|(id, zone)| (id.to_string(), fake_subnet(id, zone, &[])))
            .collect()
    }

    fn by_zone(pairs: &[(&str, &str)]) -> SubnetsByZone {
        pairs
            .iter()
            .map(|(zone, id)| (zone.to_string(), id.to_string()))
            .collect()
    }

    #[test]
    fn test_validate_subnets() {
        let subnets = by_id(&[("subnet-a", "us-east-1a"), ("subnet-b", "us-east-1b")]);
        assert_eq!(
            validate_subnets(&subnets).unwrap(),
            btreemap! {
                "us-east-1a".to_string() => "subnet-a".to_string(),
                "us-east-1b".to_string() => "subnet-b".to_string(),
            }
        );
        assert!(validate_subnets(&SubnetsById::new()).unwrap().is_empty());
    }

    #[test]
    fn test_conflicting_subnets() {
        let test_cases = vec![
            (
                by_id(&[("subnet-b", "us-east-1a"), ("subnet-a", "us-east-1a")]),
                vec!["subnet-a", "subnet-b"],
            ),
            (
                by_id(&[
                    ("subnet-c", "us-east-1a"),
                    ("subnet-a", "us-east-1a"),
                    ("subnet-b", "us-east-1a"),
                    ("subnet-d", "us-east-1b"),
                ]),
                vec!["subnet-a", "subnet-b", "subnet-c"],
            ),
            (
                by_id(&[
                    ("subnet-a", "us-east-1a"),
                    ("subnet-b", "us-east-1a"),
                    ("subnet-c", "us-east-1b"),
                    ("subnet-d", "us-east-1b"),
                ]),
                vec!["subnet-a", "subnet-b", "subnet-c", "subnet-d"],
            ),
        ];

        for (subnets, expected) in test_cases {
            match validate_subnets(&subnets).unwrap_err() {
                TopologyError::ConflictingSubnets { subnet_ids } => {
                    assert_eq!(subnet_ids, expected)
                }
                other => panic!("unexpected error: {}", other),
            }
        }
    }

    #[test]
    fn test_assignment_keeps_first_subnet() {
        let subnets = by_id(&[("subnet-b", "us-east-1a"), ("subnet-a", "us-east-1a")]);
        let assignment = assign_zones(&subnets);
        assert_eq!(
            assignment.subnets_by_zone,
            by_zone(&[("us-east-1a", "subnet-a")])
        );
    }

    #[test]
    fn test_conflict_message() {
        let subnets = by_id(&[("subnet-2", "us-east-1a"), ("subnet-1", "us-east-1a")]);
        assert_eq!(
            validate_subnets(&subnets).unwrap_err().to_string(),
            "more than one subnet found for some availability zones, conflicting subnets: subnet-1, subnet-2"
        );
    }

    #[test]
    fn test_public_subnet_parity() {
        let test_cases = vec![
            // No public subnets at all is fine.
            (by_zone(&[]), by_zone(&[("a", "priv-a"), ("b", "priv-b")]), true),
            (
                by_zone(&[("a", "pub-a"), ("b", "pub-b")]),
                by_zone(&[("a", "priv-a"), ("b", "priv-b")]),
                true,
            ),
            // Extra public zones are fine.
            (
                by_zone(&[("a", "pub-a"), ("b", "pub-b"), ("c", "pub-c")]),
                by_zone(&[("a", "priv-a")]),
                true,
            ),
            (
                by_zone(&[("a", "pub-a")]),
                by_zone(&[("a", "priv-a"), ("b", "priv-b")]),
                false,
            ),
            // Equal counts in different zones still leave a private zone uncovered.
            (
                by_zone(&[("a", "pub-a"), ("c", "pub-c")]),
                by_zone(&[("a", "priv-a"), ("b", "priv-b")]),
                false,
            ),
        ];

        for (public, private, expected_ok) in test_cases {
            assert_eq!(
                check_public_subnet_parity(&public, &private).is_ok(),
                expected_ok,
                "public={:?} private={:?}",
                public,
                private
            );
        }
    }
}
