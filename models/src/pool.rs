use crate::condition::PoolCondition;
use crate::constants::IMAGE_ID_OVERRIDE_ANNOTATION;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// We can't use these consts inside macros, but we do provide constants for use in generating kubernetes objects.
pub const K8S_WORKER_POOL_KIND: &str = "WorkerPool";

/// The `WorkerPoolSpec` declares a group of worker nodes for a `WorkloadCluster`. The controller turns it into one
/// node-group definition per availability zone and reports problems with the requested topology as conditions on
/// the `WorkerPoolStatus`.
#[derive(Clone, CustomResource, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "poolgen.aws",
    kind = "WorkerPool",
    namespaced,
    plural = "workerpools",
    shortname = "wp",
    singular = "workerpool",
    status = "WorkerPoolStatus",
    version = "v1",
    printcolumn = r#"{"name":"Cluster", "type":"string", "jsonPath":".spec.cluster_name"}"#,
    printcolumn = r#"{"name":"Pool", "type":"string", "jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicas"}"#
)]
pub struct WorkerPoolSpec {
    /// Name of the `WorkloadCluster` in the same namespace this pool belongs to.
    pub cluster_name: String,
    /// The pool name, used when naming generated node groups.
    pub name: String,
    /// Total number of nodes, spread across the pool's zones.
    pub replicas: Option<i64>,
    /// Labels applied to every node in the pool.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub platform: WorkerPoolPlatform,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, JsonSchema)]
pub struct WorkerPoolPlatform {
    pub aws: Option<AwsPoolPlatform>,
}

/// AWS-specific settings for a worker pool.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, JsonSchema)]
pub struct AwsPoolPlatform {
    pub instance_type: String,
    pub root_volume: RootVolume,
    /// Explicit subnets to place nodes in. When empty, subnets are selected by naming convention.
    #[serde(default)]
    pub subnets: Vec<String>,
    /// Explicit availability zones. When empty, zones come from the subnets or from the region.
    #[serde(default)]
    pub zones: Vec<String>,
    pub spot_market_options: Option<SpotMarketOptions>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, JsonSchema)]
pub struct RootVolume {
    pub iops: i64,
    /// Size in GiB.
    pub size: i64,
    #[serde(rename = "type")]
    pub type_: String,
    pub kms_key_arn: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, JsonSchema)]
pub struct SpotMarketOptions {
    /// The maximum hourly price. When absent the on-demand price is the ceiling.
    pub max_price: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, JsonSchema)]
pub struct WorkerPoolStatus {
    #[serde(default)]
    pub conditions: Vec<PoolCondition>,
}

impl WorkerPool {
    pub fn aws_platform(&self) -> Option<&AwsPoolPlatform> {
        self.spec.platform.aws.as_ref()
    }

    /// The pool's current conditions, empty for a pool without status.
    pub fn conditions(&self) -> &[PoolCondition] {
        self.status
            .as_ref()
            .map(|status| status.conditions.as_slice())
            .unwrap_or_default()
    }

    /// The image id requested through the override annotation, if any.
    pub fn image_id_override(&self) -> Option<&str> {
        self.annotations()
            .get(IMAGE_ID_OVERRIDE_ANNOTATION)
            .map(String::as_str)
            .filter(|image_id| !image_id.is_empty())
    }
}
