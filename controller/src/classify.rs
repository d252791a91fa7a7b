//! Classifies subnets as public or private.
//!
//! There is no direct way in the EC2 API to determine whether a subnet is public. A subnet is public when the
//! route table it uses has a route through an internet gateway, or failing that, when it is tagged for internet
//! facing load balancers.
use models::constants::{INTERNET_GATEWAY_PREFIX, TAG_SUBNET_PUBLIC_ELB};
use models::network::{RouteTable, Subnet};

use snafu::{OptionExt, Snafu};
use std::collections::BTreeMap;
use tracing::{event, instrument, Level};

/// Subnets keyed by subnet id.
pub type SubnetsById = BTreeMap<String, Subnet>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClassifyError {
    #[snafu(display("could not locate routing table for {}", subnet_id))]
    MissingRouteTable { subnet_id: String },
}

/// Discovered subnets partitioned by reachability from the internet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClassifiedSubnets {
    pub public: SubnetsById,
    pub private: SubnetsById,
}

/// Partitions `subnets` into public and private subnets using the VPC's `route_tables`.
///
/// Any subnet without a usable route table aborts classification.
#[instrument(skip(subnets, route_tables), err)]
pub fn classify_subnets(
    subnets: &[Subnet],
    route_tables: &[RouteTable],
) -> Result<ClassifiedSubnets, ClassifyError> {
    let mut classified = ClassifiedSubnets::default();
    for subnet in subnets {
        let partition = if is_subnet_public(route_tables, subnet)? {
            &mut classified.public
        } else {
            &mut classified.private
        };
        partition.insert(subnet.id.clone(), subnet.clone());
    }
    Ok(classified)
}

/// Decides whether a single subnet is public.
pub fn is_subnet_public(route_tables: &[RouteTable], subnet: &Subnet) -> Result<bool, ClassifyError> {
    let subnet_table = route_table_for_subnet(route_tables, &subnet.id)?;

    // Internet gateway ids start with "igw", which tells them apart from the in-VPC "local" route,
    // virtual private gateways ("vgw") and peering connections ("pcx").
    let has_internet_route = subnet_table.routes.iter().any(|route| {
        route
            .gateway_id
            .as_deref()
            .map_or(false, |gateway| gateway.starts_with(INTERNET_GATEWAY_PREFIX))
    });
    if has_internet_route {
        return Ok(true);
    }

    // Without an internet route, users may still mark a subnet for internet-facing use by tag.
    Ok(matches!(subnet.tag(TAG_SUBNET_PUBLIC_ELB), Some("") | Some("1")))
}

/// Finds the route table a subnet uses: its explicitly associated table, or else the VPC's main table.
fn route_table_for_subnet<'a>(
    route_tables: &'a [RouteTable],
    subnet_id: &str,
) -> Result<&'a RouteTable, ClassifyError> {
    if let Some(table) = route_tables
        .iter()
        .find(|table| table.is_associated_with(subnet_id))
    {
        return Ok(table);
    }

    let main_table = route_tables
        .iter()
        .find(|table| table.is_main())
        .context(MissingRouteTableSnafu { subnet_id })?;
    event!(
        Level::DEBUG,
        route_table = %main_table.id,
        subnet_id,
        "Assuming implicit use of main routing table."
    );
    Ok(main_table)
}
