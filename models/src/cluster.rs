use kube::CustomResource;
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The `WorkloadClusterSpec` records what is known about an installed cluster: the identifier of its provisioned
/// infrastructure, where it runs, and how its control plane machines were configured. Worker pools reference a
/// cluster by name and derive conventional resource names from its infra id.
#[derive(Clone, CustomResource, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "poolgen.aws",
    kind = "WorkloadCluster",
    namespaced,
    plural = "workloadclusters",
    shortname = "wc",
    singular = "workloadcluster",
    status = "WorkloadClusterStatus",
    version = "v1",
    printcolumn = r#"{"name":"Infra ID", "type":"string", "jsonPath":".spec.cluster_metadata.infra_id"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".status.version"}"#
)]
pub struct WorkloadClusterSpec {
    /// Present once the cluster's infrastructure has been provisioned.
    pub cluster_metadata: Option<ClusterMetadata>,
    pub platform: ClusterPlatform,
    /// The raw provider configuration of an existing control plane machine.
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub control_plane_provider_spec: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, JsonSchema)]
pub struct ClusterMetadata {
    /// Unique identifier of the cluster's provisioned infrastructure.
    pub infra_id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, JsonSchema)]
pub struct ClusterPlatform {
    pub aws: Option<AwsClusterPlatform>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, JsonSchema)]
pub struct AwsClusterPlatform {
    pub region: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, JsonSchema)]
pub struct WorkloadClusterStatus {
    /// The installed cluster version, e.g. `4.10.3`.
    pub version: Option<String>,
}

impl WorkloadCluster {
    pub fn infra_id(&self) -> Option<&str> {
        self.spec
            .cluster_metadata
            .as_ref()
            .map(|metadata| metadata.infra_id.as_str())
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.spec
            .platform
            .aws
            .as_ref()
            .map(|aws| aws.region.as_str())
    }

    pub fn version(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|status| status.version.as_deref())
            .filter(|version| !version.is_empty())
    }
}

// Provider specs are opaque to the schema; keep k8s from pruning them.
fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    schema.into()
}
