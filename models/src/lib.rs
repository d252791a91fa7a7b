pub mod cluster;
pub mod condition;
pub mod constants;
pub mod network;
pub mod nodegroup;
pub mod pool;
pub mod telemetry;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

/// The custom resource definitions served by poolgen, in the order they should be applied.
pub fn crds() -> Vec<CustomResourceDefinition> {
    vec![cluster::WorkloadCluster::crd(), pool::WorkerPool::crd()]
}
