//! Cloud network entities discovered during topology resolution. These are read-only views of
//! provider state; nothing here is created or owned by poolgen.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An availability zone within a region.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityZone {
    pub name: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub availability_zone: String,
    /// Empty when the provider did not report an owning VPC.
    pub vpc_id: String,
    pub tags: BTreeMap<String, String>,
}

impl Subnet {
    /// Returns the value of the given tag, if the subnet carries it.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    pub id: String,
    pub associations: Vec<RouteTableAssociation>,
    pub routes: Vec<Route>,
}

impl RouteTable {
    /// Whether this table is explicitly associated with the given subnet.
    pub fn is_associated_with(&self, subnet_id: &str) -> bool {
        self.associations
            .iter()
            .any(|assoc| assoc.subnet_id.as_deref() == Some(subnet_id))
    }

    /// Whether this table is the VPC's main routing table.
    pub fn is_main(&self) -> bool {
        self.associations.iter().any(|assoc| assoc.main)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RouteTableAssociation {
    pub subnet_id: Option<String>,
    pub main: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub gateway_id: Option<String>,
}
