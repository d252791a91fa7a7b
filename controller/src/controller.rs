use crate::ec2::SdkEc2Client;
use crate::reconciler::{reconciler_error, PoolReconciler, Reconciliation};
use crate::status::PoolStatusClient;
use crate::synthesize::NodeGroupSynthesizer;
use models::cluster::WorkloadCluster;
use models::pool::WorkerPool;

use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{event, instrument, Level};

/// The module-wide result type.
type Result<T> = std::result::Result<T, controllerclient_error::Error>;

/// The PoolController periodically works out the node groups every `WorkerPool` in the cluster should have.
pub struct PoolController<S: PoolStatusClient + Clone> {
    status_client: S,
    synthesizer: NodeGroupSynthesizer,
    pool_reader: Store<WorkerPool>,
    cluster_reader: Store<WorkloadCluster>,
    reconcile_interval: Duration,
    // EC2 clients are region scoped; keep one per region seen.
    ec2_clients: BTreeMap<String, SdkEc2Client>,
}

impl<S: PoolStatusClient + Clone> PoolController<S> {
    pub fn new(
        status_client: S,
        synthesizer: NodeGroupSynthesizer,
        pool_reader: Store<WorkerPool>,
        cluster_reader: Store<WorkloadCluster>,
        reconcile_interval: Duration,
    ) -> Self {
        PoolController {
            status_client,
            synthesizer,
            pool_reader,
            cluster_reader,
            reconcile_interval,
            ec2_clients: BTreeMap::new(),
        }
    }

    /// Returns all `WorkerPool` objects, ordered by namespace and name.
    fn all_pools(&self) -> Vec<Arc<WorkerPool>> {
        let mut pools = self.pool_reader.state();
        pools.sort_by_key(|pool| (pool.namespace(), pool.name_any()));
        pools
    }

    /// Finds the `WorkloadCluster` a pool belongs to.
    fn cluster_for(&self, pool: &WorkerPool) -> Result<Arc<WorkloadCluster>> {
        let namespace = pool
            .namespace()
            .context(controllerclient_error::MissingNamespaceSnafu {
                pool: pool.name_any(),
            })?;
        let cluster_ref =
            ObjectRef::<WorkloadCluster>::new(&pool.spec.cluster_name).within(&namespace);
        self.cluster_reader
            .get(&cluster_ref)
            .context(controllerclient_error::MissingClusterSnafu {
                pool: pool.name_any(),
                cluster: pool.spec.cluster_name.clone(),
            })
    }

    /// Returns the cached client for `region`, creating it on first use.
    async fn ec2_client_for(&mut self, region: &str) -> SdkEc2Client {
        if let Some(ec2_client) = self.ec2_clients.get(region) {
            return ec2_client.clone();
        }
        let ec2_client = SdkEc2Client::for_region(region).await;
        self.ec2_clients
            .insert(region.to_string(), ec2_client.clone());
        ec2_client
    }

    /// Reconciles a single pool and reports the node groups it should have.
    #[instrument(skip(self, pool), fields(pool = %pool.name_any()), err)]
    async fn reconcile_pool(&mut self, pool: &WorkerPool) -> Result<Reconciliation> {
        let cluster = self.cluster_for(pool)?;
        let region = cluster_region(&cluster)?.to_string();
        let ec2_client = self.ec2_client_for(&region).await;

        let reconciler = PoolReconciler::new(
            ec2_client,
            self.status_client.clone(),
            self.synthesizer.clone(),
        );
        let reconciliation = reconciler
            .reconcile(pool, &cluster)
            .await
            .context(controllerclient_error::ReconcileSnafu)?;

        if reconciliation.apply {
            for node_group in &reconciliation.node_groups {
                let definition = serde_json::to_string(node_group)
                    .context(controllerclient_error::SerializeNodeGroupSnafu)?;
                event!(
                    Level::INFO,
                    node_group = %node_group.name,
                    zone = %node_group.zone,
                    replicas = node_group.replicas,
                    %definition,
                    "Desired node group."
                );
            }
        } else {
            event!(Level::INFO, "Node group generation skipped for pool.");
        }
        Ok(reconciliation)
    }

    /// Runs the event loop for the controller.
    ///
    /// Pools are kept up to date in a reflector store and reconciled one at a time on every pass. A failing pool is
    /// logged and retried on the next pass.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let pools = self.all_pools();
            event!(Level::DEBUG, pool_count = pools.len(), "Reconciling worker pools.");

            for pool in pools {
                // Errors are logged by instrumentation in `reconcile_pool()`.
                #[allow(unused_must_use)]
                {
                    self.reconcile_pool(&pool).await;
                }
            }

            sleep(self.reconcile_interval).await;
        }
    }
}

/// The region EC2 clients are scoped to. Clusters without an AWS platform have none.
fn cluster_region(cluster: &WorkloadCluster) -> Result<&str> {
    cluster
        .aws_region()
        .context(controllerclient_error::MissingRegionSnafu {
            cluster: cluster.name_any(),
        })
}

pub mod controllerclient_error {
    use super::*;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("WorkerPool '{}' has no namespace", pool))]
        MissingNamespace { pool: String },

        #[snafu(display("WorkloadCluster '{}' of WorkerPool '{}' not found", cluster, pool))]
        MissingCluster { pool: String, cluster: String },

        #[snafu(display("WorkloadCluster '{}' has no AWS region", cluster))]
        MissingRegion { cluster: String },

        #[snafu(display("Unable to reconcile WorkerPool: '{}'", source))]
        Reconcile { source: reconciler_error::Error },

        #[snafu(display("Unable to serialize node group definition: '{}'", source))]
        SerializeNodeGroup { source: serde_json::Error },
    }
}
