use models::cluster::WorkloadCluster;
use models::pool::WorkerPool;

use kube::ResourceExt;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{event, instrument, Level};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ImageError {
    #[snafu(display(
        "WorkloadCluster '{}' has no control plane provider spec to take an image from",
        cluster
    ))]
    MissingProviderSpec { cluster: String },

    #[snafu(display(
        "Unable to decode control plane provider spec of WorkloadCluster '{}': '{}'",
        cluster,
        source
    ))]
    DecodeProviderSpec {
        cluster: String,
        source: serde_json::Error,
    },

    #[snafu(display(
        "Control plane provider spec of WorkloadCluster '{}' has no image id",
        cluster
    ))]
    MissingImageId { cluster: String },
}

/// The parts of a control plane machine's provider configuration needed to pick worker images.
#[derive(Debug, Deserialize)]
struct ControlPlaneProviderSpec {
    ami: Option<AmiReference>,
}

#[derive(Debug, Deserialize)]
struct AmiReference {
    id: Option<String>,
}

/// Determines the image worker nodes of `pool` boot from.
///
/// An image id set through the override annotation wins. Otherwise workers use the same image as the cluster's
/// control plane machines.
#[instrument(skip(pool, cluster), fields(pool = %pool.name_any(), cluster = %cluster.name_any()), err)]
pub fn resolve_base_image(pool: &WorkerPool, cluster: &WorkloadCluster) -> Result<String, ImageError> {
    if let Some(image_id) = pool.image_id_override() {
        event!(Level::INFO, image_id, "Using image id override.");
        return Ok(image_id.to_string());
    }

    let cluster_name = cluster.name_any();
    let raw_spec = cluster
        .spec
        .control_plane_provider_spec
        .clone()
        .context(MissingProviderSpecSnafu {
            cluster: cluster_name.clone(),
        })?;
    let provider_spec: ControlPlaneProviderSpec =
        serde_json::from_value(raw_spec).context(DecodeProviderSpecSnafu {
            cluster: cluster_name.clone(),
        })?;

    provider_spec
        .ami
        .and_then(|ami| ami.id)
        .filter(|id| !id.is_empty())
        .context(MissingImageIdSnafu {
            cluster: cluster_name,
        })
}
