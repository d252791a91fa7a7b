//! Node-group definitions: the output of a reconciliation pass.
use crate::pool::{RootVolume, SpotMarketOptions};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A provider-side filter used to select a resource by attribute, e.g. `tag:Name`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

/// A reference to a pre-existing cloud resource, either by id or by filter.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceReference {
    Id(String),
    Filters(Vec<Filter>),
}

impl ResourceReference {
    /// References a resource by a single filter with a single value.
    pub fn filter<S1, S2>(name: S1, value: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        ResourceReference::Filters(vec![Filter {
            name: name.into(),
            values: vec![value.into()],
        }])
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            ResourceReference::Id(id) => Some(id),
            ResourceReference::Filters(_) => None,
        }
    }
}

/// The declarative specification of a set of homogeneous worker nodes in one availability zone.
///
/// Definitions are regenerated on every reconciliation and are never diffed against earlier output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeGroupDefinition {
    pub name: String,
    pub region: String,
    pub zone: String,
    pub replicas: i64,
    pub instance_type: String,
    pub image_id: String,
    pub root_volume: RootVolume,
    /// Name of the secret holding the user data nodes bootstrap from.
    pub user_data_secret: String,
    pub subnet: ResourceReference,
    pub iam_instance_profile: ResourceReference,
    pub security_groups: Vec<ResourceReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_market_options: Option<SpotMarketOptions>,
    pub labels: BTreeMap<String, String>,
}
