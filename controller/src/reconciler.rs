//! Decides which node groups a `WorkerPool` should have, gating unsupported configurations and reporting
//! problems as pool conditions.
use crate::ec2::{ec2_error, Ec2Client};
use crate::image::{resolve_base_image, ImageError};
use crate::resolver::{mark_subnets_valid, ResolveError, SubnetTopologyResolver};
use crate::status::{status_error, PoolStatusClient, StatusTracker};
use crate::synthesize::NodeGroupSynthesizer;
use crate::template::{ComputePool, TemplateError};
use crate::version::{is_using_unsupported_spot_market_options, worker_user_data};
use crate::zones::list_zones;
use models::cluster::WorkloadCluster;
use models::condition::{ConditionStatus, PoolCondition, UpdatePolicy};
use models::constants::{
    CONDITION_INVALID_SUBNETS, CONDITION_UNSUPPORTED_CONFIGURATION,
    REASON_CONFIGURATION_SUPPORTED, REASON_NO_SUBNET_FOR_AVAILABILITY_ZONE,
    REASON_UNSUPPORTED_SPOT_MARKET_OPTIONS,
};
use models::nodegroup::NodeGroupDefinition;
use models::pool::WorkerPool;

use kube::ResourceExt;
use snafu::{OptionExt, ResultExt};
use tracing::{event, instrument, Level};

const UNSUPPORTED_SPOT_MESSAGE: &str = "The version of the cluster does not support using spot instances";
const CONFIGURATION_SUPPORTED_MESSAGE: &str = "The configuration is supported";

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, reconciler_error::Error>;

/// The outcome of reconciling one pool.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reconciliation {
    /// Node-group definitions in zone order.
    pub node_groups: Vec<NodeGroupDefinition>,
    /// Whether `node_groups` should be applied. False when generation was skipped.
    pub apply: bool,
    /// The pool's conditions after this pass.
    pub conditions: Vec<PoolCondition>,
}

/// Composes version gating, topology resolution and synthesis for worker pools.
pub struct PoolReconciler<E: Ec2Client, S: PoolStatusClient> {
    ec2_client: E,
    status_client: S,
    synthesizer: NodeGroupSynthesizer,
}

impl<E: Ec2Client, S: PoolStatusClient> PoolReconciler<E, S> {
    pub fn new(ec2_client: E, status_client: S, synthesizer: NodeGroupSynthesizer) -> Self {
        PoolReconciler {
            ec2_client,
            status_client,
            synthesizer,
        }
    }

    /// Computes the node groups `pool` should have in `cluster`.
    ///
    /// Conditions are written to the pool at most twice per pass, and only when they changed.
    #[instrument(skip(self, pool, cluster), fields(pool = %pool.name_any(), cluster = %cluster.name_any()), err)]
    pub async fn reconcile(&self, pool: &WorkerPool, cluster: &WorkloadCluster) -> Result<Reconciliation> {
        let pool_name = pool.name_any();
        let infra_id = cluster
            .infra_id()
            .context(reconciler_error::MissingClusterMetadataSnafu {
                cluster: cluster.name_any(),
            })?;
        let region = cluster
            .aws_region()
            .context(reconciler_error::ClusterNotAwsSnafu {
                cluster: cluster.name_any(),
            })?;
        let aws = pool.aws_platform().context(reconciler_error::PoolNotAwsSnafu {
            pool: pool_name.clone(),
        })?;
        let cluster_version = cluster
            .version()
            .context(reconciler_error::MissingClusterVersionSnafu {
                cluster: cluster.name_any(),
            })?;

        let mut tracker = StatusTracker::new(pool.conditions());

        if is_using_unsupported_spot_market_options(aws.spot_market_options.is_some(), cluster_version) {
            event!(Level::DEBUG, cluster_version, "Cluster does not support spot instances.");
            tracker.set(
                CONDITION_UNSUPPORTED_CONFIGURATION,
                ConditionStatus::True,
                REASON_UNSUPPORTED_SPOT_MARKET_OPTIONS,
                UNSUPPORTED_SPOT_MESSAGE,
                UpdatePolicy::UpdateIfChanged,
            );
            tracker
                .flush(&self.status_client, pool)
                .await
                .context(reconciler_error::PersistConditionsSnafu)?;
            return Ok(Reconciliation {
                node_groups: vec![],
                apply: false,
                conditions: tracker.into_conditions(),
            });
        }
        // Recorded now, persisted together with whatever the subnet checks conclude.
        tracker.set(
            CONDITION_UNSUPPORTED_CONFIGURATION,
            ConditionStatus::False,
            REASON_CONFIGURATION_SUPPORTED,
            CONFIGURATION_SUPPORTED_MESSAGE,
            UpdatePolicy::UpdateIfChanged,
        );

        let image_id = resolve_base_image(pool, cluster).context(reconciler_error::BaseImageSnafu)?;

        let subnets = SubnetTopologyResolver::new(&self.ec2_client, &self.status_client)
            .resolve(pool, &mut tracker)
            .await
            .context(reconciler_error::ResolveSubnetsSnafu)?;

        let zones = if !aws.zones.is_empty() {
            aws.zones.clone()
        } else if !subnets.is_empty() {
            subnets.keys().cloned().collect()
        } else {
            list_zones(&self.ec2_client, region)
                .await
                .context(reconciler_error::ListZonesSnafu)?
        };
        if zones.is_empty() {
            return reconciler_error::ZeroZonesSnafu { region }.fail();
        }

        let compute_pool = ComputePool {
            name: pool.spec.name.clone(),
            replicas: pool.spec.replicas.unwrap_or(0),
            labels: pool.spec.labels.clone(),
            instance_type: aws.instance_type.clone(),
            image_id,
            root_volume: aws.root_volume.clone(),
            user_data_secret: worker_user_data(cluster_version).to_string(),
            zones,
            spot_market_options: aws.spot_market_options.clone(),
        };

        let node_groups = match self
            .synthesizer
            .synthesize(infra_id, region, &subnets, &compute_pool)
        {
            Ok(node_groups) => node_groups,
            Err(err) => {
                if let TemplateError::NoSubnetForZone { .. } = err {
                    tracker.set(
                        CONDITION_INVALID_SUBNETS,
                        ConditionStatus::True,
                        REASON_NO_SUBNET_FOR_AVAILABILITY_ZONE,
                        &err.to_string(),
                        UpdatePolicy::UpdateIfChanged,
                    );
                    tracker
                        .flush(&self.status_client, pool)
                        .await
                        .context(reconciler_error::PersistConditionsSnafu)?;
                }
                return Err(reconciler_error::Error::GenerateNodeGroups { source: err });
            }
        };

        mark_subnets_valid(&mut tracker);
        tracker
            .flush(&self.status_client, pool)
            .await
            .context(reconciler_error::PersistConditionsSnafu)?;

        Ok(Reconciliation {
            node_groups,
            apply: true,
            conditions: tracker.into_conditions(),
        })
    }
}

pub mod reconciler_error {
    use super::*;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("WorkloadCluster '{}' does not have cluster metadata", cluster))]
        MissingClusterMetadata { cluster: String },

        #[snafu(display("WorkloadCluster '{}' is not for AWS", cluster))]
        ClusterNotAws { cluster: String },

        #[snafu(display("WorkerPool '{}' is not for AWS", pool))]
        PoolNotAws { pool: String },

        #[snafu(display("Unable to get cluster version of WorkloadCluster '{}'", cluster))]
        MissingClusterVersion { cluster: String },

        #[snafu(display("Unable to determine base image: '{}'", source))]
        BaseImage { source: ImageError },

        #[snafu(display("describing subnets: {}", source))]
        ResolveSubnets { source: ResolveError },

        #[snafu(display(
            "compute pool not providing list of zones and failed to fetch list of zones: {}",
            source
        ))]
        ListZones { source: ec2_error::Error },

        #[snafu(display("zero zones returned for region {}", region))]
        ZeroZones { region: String },

        #[snafu(display("failed to generate node groups: {}", source))]
        GenerateNodeGroups { source: TemplateError },

        #[snafu(display("could not update WorkerPool status: {}", source))]
        PersistConditions { source: status_error::Error },
    }
}
