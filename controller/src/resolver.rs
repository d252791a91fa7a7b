//! Resolves the subnets explicitly requested by a pool into a zone to subnet mapping, recording what is wrong with
//! them on the pool's `InvalidSubnets` condition.
use crate::classify::{classify_subnets, ClassifyError};
use crate::ec2::{ec2_error, Ec2Client};
use crate::status::{status_error, PoolStatusClient, StatusTracker};
use crate::topology::{check_public_subnet_parity, validate_subnets, SubnetsByZone, TopologyError};
use models::condition::{ConditionStatus, UpdatePolicy};
use models::constants::{
    CONDITION_INVALID_SUBNETS, REASON_INSUFFICIENT_PUBLIC_SUBNETS,
    REASON_MORE_THAN_ONE_SUBNET_FOR_ZONE, REASON_SUBNETS_NOT_FOUND, REASON_VALID_SUBNETS,
};
use models::pool::WorkerPool;

use kube::ResourceExt;
use snafu::{ResultExt, Snafu};
use tracing::{event, instrument, Level};

const VALID_SUBNETS_MESSAGE: &str = "Subnets are valid";

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ResolveError {
    #[snafu(display("Requested subnets were not found: {}", message))]
    SubnetsNotFound { message: String },

    #[snafu(display("Unable to describe subnets: {}", source))]
    DescribeSubnets { source: ec2_error::Error },

    #[snafu(display("{} has no VPC", subnet_id))]
    MissingVpc { subnet_id: String },

    #[snafu(display(
        "Requested subnets span more than one VPC: '{}' is in '{}', not '{}'",
        subnet_id,
        vpc_id,
        expected_vpc_id
    ))]
    MultipleVpcs {
        subnet_id: String,
        vpc_id: String,
        expected_vpc_id: String,
    },

    #[snafu(display("error describing route tables: {}", source))]
    DescribeRouteTables { source: ec2_error::Error },

    #[snafu(display("Unable to classify subnets: {}", source))]
    Classify { source: ClassifyError },

    #[snafu(display("{}", source))]
    InvalidTopology { source: TopologyError },

    #[snafu(display("Unable to persist subnet conditions: {}", source))]
    PersistConditions { source: status_error::Error },
}

/// Turns a pool's explicit subnets into the zone to subnet mapping node groups are placed with.
pub struct SubnetTopologyResolver<'a, E: Ec2Client, S: PoolStatusClient> {
    ec2_client: &'a E,
    status_client: &'a S,
}

impl<'a, E: Ec2Client, S: PoolStatusClient> SubnetTopologyResolver<'a, E, S> {
    pub fn new(ec2_client: &'a E, status_client: &'a S) -> Self {
        SubnetTopologyResolver {
            ec2_client,
            status_client,
        }
    }

    /// Resolves the private subnets of `pool` by availability zone.
    ///
    /// Pools without explicit subnets resolve to an empty mapping. Whenever the requested subnets are unusable the
    /// `InvalidSubnets` condition is set on `tracker` and every pending condition is persisted, if any changed,
    /// before the error is returned.
    #[instrument(skip(self, pool, tracker), fields(pool = %pool.name_any()), err)]
    pub async fn resolve(&self, pool: &WorkerPool, tracker: &mut StatusTracker) -> Result<SubnetsByZone> {
        let subnet_ids = match pool.aws_platform() {
            Some(aws) if !aws.subnets.is_empty() => aws.subnets.clone(),
            _ => return Ok(SubnetsByZone::new()),
        };

        let subnets = match self.ec2_client.describe_subnets(&subnet_ids).await {
            Ok(subnets) if subnets.is_empty() => {
                let message = format!("The subnet ID '{}' does not exist", subnet_ids.join(","));
                return self
                    .fail_with_condition(
                        pool,
                        tracker,
                        REASON_SUBNETS_NOT_FOUND,
                        &message,
                        ResolveError::SubnetsNotFound {
                            message: message.clone(),
                        },
                    )
                    .await;
            }
            Ok(subnets) => subnets,
            Err(err) => {
                return match err.subnet_not_found_message() {
                    Some(message) => {
                        self.fail_with_condition(
                            pool,
                            tracker,
                            REASON_SUBNETS_NOT_FOUND,
                            &message,
                            ResolveError::SubnetsNotFound {
                                message: message.clone(),
                            },
                        )
                        .await
                    }
                    None => Err(ResolveError::DescribeSubnets { source: err }),
                };
            }
        };

        // The first subnet decides which VPC's route tables apply.
        let first = &subnets[0];
        if first.vpc_id.is_empty() {
            return MissingVpcSnafu {
                subnet_id: first.id.clone(),
            }
            .fail();
        }
        let vpc_id = first.vpc_id.clone();
        if let Some(stray) = subnets.iter().find(|subnet| subnet.vpc_id != vpc_id) {
            return MultipleVpcsSnafu {
                subnet_id: stray.id.clone(),
                vpc_id: stray.vpc_id.clone(),
                expected_vpc_id: vpc_id,
            }
            .fail();
        }

        let route_tables = self
            .ec2_client
            .describe_route_tables(&vpc_id)
            .await
            .context(DescribeRouteTablesSnafu)?;

        let classified = classify_subnets(&subnets, &route_tables).context(ClassifySnafu)?;
        event!(
            Level::DEBUG,
            public = ?classified.public.keys().collect::<Vec<_>>(),
            private = ?classified.private.keys().collect::<Vec<_>>(),
            "Classified subnets."
        );

        let public_by_zone = match validate_subnets(&classified.public) {
            Ok(public_by_zone) => public_by_zone,
            Err(err) => return self.fail_with_topology_error(pool, tracker, err).await,
        };
        let private_by_zone = match validate_subnets(&classified.private) {
            Ok(private_by_zone) => private_by_zone,
            Err(err) => return self.fail_with_topology_error(pool, tracker, err).await,
        };
        if let Err(err) = check_public_subnet_parity(&public_by_zone, &private_by_zone) {
            return self.fail_with_topology_error(pool, tracker, err).await;
        }

        Ok(private_by_zone)
    }

    async fn fail_with_topology_error<T>(
        &self,
        pool: &WorkerPool,
        tracker: &mut StatusTracker,
        err: TopologyError,
    ) -> Result<T> {
        let reason = match err {
            TopologyError::ConflictingSubnets { .. } => REASON_MORE_THAN_ONE_SUBNET_FOR_ZONE,
            TopologyError::InsufficientPublicSubnets { .. } => REASON_INSUFFICIENT_PUBLIC_SUBNETS,
        };
        let message = err.to_string();
        self.fail_with_condition(
            pool,
            tracker,
            reason,
            &message,
            ResolveError::InvalidTopology { source: err },
        )
        .await
    }

    /// Sets `InvalidSubnets=True`, persists pending conditions if needed, and fails with `err`.
    async fn fail_with_condition<T>(
        &self,
        pool: &WorkerPool,
        tracker: &mut StatusTracker,
        reason: &str,
        message: &str,
        err: ResolveError,
    ) -> Result<T> {
        tracker.set(
            CONDITION_INVALID_SUBNETS,
            ConditionStatus::True,
            reason,
            message,
            UpdatePolicy::UpdateIfChanged,
        );
        tracker
            .flush(self.status_client, pool)
            .await
            .context(PersistConditionsSnafu)?;
        Err(err)
    }
}

/// Clears the `InvalidSubnets` condition. An already clear condition is left untouched, so clean passes cause no
/// status writes.
pub fn mark_subnets_valid(tracker: &mut StatusTracker) -> bool {
    tracker.set(
        CONDITION_INVALID_SUBNETS,
        ConditionStatus::False,
        REASON_VALID_SUBNETS,
        VALID_SUBNETS_MESSAGE,
        UpdatePolicy::NeverOverwrite,
    )
}
