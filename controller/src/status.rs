use models::condition::{set_condition, ConditionStatus, PoolCondition, UpdatePolicy};
use models::constants;
use models::pool::{WorkerPool, WorkerPoolStatus, K8S_WORKER_POOL_KIND};

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use tracing::{event, instrument, Level};

#[cfg(any(feature = "mockall", test))]
use mockall::{mock, predicate::*};

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, status_error::Error>;

#[async_trait]
/// A trait providing an interface to persist the status of `WorkerPool` objects. This is provided as a trait
/// in order to allow mocks to be used for testing purposes.
pub trait PoolStatusClient: Send + Sync {
    /// Overwrites the conditions in the `.status` of a `WorkerPool`.
    async fn persist_status(&self, pool: &WorkerPool, conditions: &[PoolCondition]) -> Result<()>;
}

#[cfg(any(feature = "mockall", test))]
mock! {
    /// A Mock PoolStatusClient for use in tests.
    pub PoolStatusClient {}
    #[async_trait]
    impl PoolStatusClient for PoolStatusClient {
        async fn persist_status(&self, pool: &WorkerPool, conditions: &[PoolCondition]) -> Result<()>;
    }
}

#[derive(Clone)]
/// Concrete implementation of the `PoolStatusClient` trait. This implementation will almost
/// certainly be used in any case that isn't a unit test.
pub struct K8SPoolStatusClient {
    k8s_client: kube::client::Client,
}

impl K8SPoolStatusClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SPoolStatusClient { k8s_client }
    }
}

#[derive(Debug, Serialize, Deserialize)]
/// A helper struct used to serialize and send patches to the k8s API to modify the status of a WorkerPool.
struct WorkerPoolStatusPatch {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    status: WorkerPoolStatus,
}

#[async_trait]
impl PoolStatusClient for K8SPoolStatusClient {
    #[instrument(skip(self, pool, conditions), fields(pool = %pool.name_any()), err)]
    async fn persist_status(&self, pool: &WorkerPool, conditions: &[PoolCondition]) -> Result<()> {
        let name = pool.name_any();
        let namespace = pool.namespace().context(status_error::MissingNamespaceSnafu {
            name: name.clone(),
        })?;

        let status_patch = WorkerPoolStatusPatch {
            api_version: constants::API_VERSION.to_string(),
            kind: K8S_WORKER_POOL_KIND.to_string(),
            status: WorkerPoolStatus {
                conditions: conditions.to_vec(),
            },
        };
        let status_patch = serde_json::to_value(status_patch).context(status_error::CreateK8SPatchSnafu)?;

        let api: Api<WorkerPool> = Api::namespaced(self.k8s_client.clone(), &namespace);
        api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await
            .context(status_error::UpdateWorkerPoolStatusSnafu { name })?;

        Ok(())
    }
}

/// Accumulates condition changes for one pool during a reconciliation pass so that they can be written in a
/// single status update, and only when something actually changed.
#[derive(Clone, Debug)]
pub struct StatusTracker {
    conditions: Vec<PoolCondition>,
    dirty: bool,
}

impl StatusTracker {
    pub fn new(conditions: &[PoolCondition]) -> Self {
        StatusTracker {
            conditions: conditions.to_vec(),
            dirty: false,
        }
    }

    /// Applies a condition, returning whether it changed the pending status.
    pub fn set(
        &mut self,
        type_: &str,
        status: ConditionStatus,
        reason: &str,
        message: &str,
        policy: UpdatePolicy,
    ) -> bool {
        let (conditions, changed) =
            set_condition(&self.conditions, type_, status, reason, message, policy);
        if changed {
            event!(Level::INFO, type_, %status, reason, message, "Pool condition changed.");
            self.conditions = conditions;
            self.dirty = true;
        }
        changed
    }

    pub fn conditions(&self) -> &[PoolCondition] {
        &self.conditions
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persists the pending conditions if any of them changed since the last flush.
    pub async fn flush<S: PoolStatusClient>(&mut self, client: &S, pool: &WorkerPool) -> Result<()> {
        if self.dirty {
            client.persist_status(pool, &self.conditions).await?;
            self.dirty = false;
        }
        Ok(())
    }

    pub fn into_conditions(self) -> Vec<PoolCondition> {
        self.conditions
    }
}

pub mod status_error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Unable to create patch to send to Kubernetes API: '{}'", source))]
        CreateK8SPatch { source: serde_json::error::Error },

        #[snafu(display("WorkerPool '{}' has no namespace", name))]
        MissingNamespace { name: String },

        #[snafu(display("Unable to update status of WorkerPool '{}': '{}'", name, source))]
        UpdateWorkerPoolStatus { name: String, source: kube::Error },
    }
}
