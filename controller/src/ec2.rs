/*!
  The EC2 describe calls topology resolution depends on, and the `aws-sdk-ec2` implementation of them.
  Only discovery happens here; nothing is created or modified.
!*/
use models::network::{AvailabilityZone, Route, RouteTable, RouteTableAssociation, Subnet};

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{Filter, Tag};
use lazy_static::lazy_static;
use regex::Regex;
use snafu::OptionExt;
use std::collections::BTreeMap;
use tracing::instrument;

#[cfg(any(feature = "mockall", test))]
use mockall::{mock, predicate::*};

lazy_static! {
    // Strips the provider's envelope from a "subnet not found" error, e.g.
    // "InvalidSubnetID.NotFound: The subnet ID 'subnet-1' does not exist\tstatus code: 400, request id: ..."
    static ref SUBNET_NOT_FOUND_RE: Regex =
        Regex::new(r"^InvalidSubnetID\.NotFound:\s+([^\t]+)").expect("Invalid regex literal.");
}

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, ec2_error::Error>;

#[async_trait]
/// A trait providing the EC2 describe calls used to resolve a pool's topology. This is provided as a trait
/// in order to allow mocks to be used for testing purposes.
pub trait Ec2Client: Send + Sync {
    /// Lists the availability zones of a region.
    async fn describe_availability_zones(&self, region: &str) -> Result<Vec<AvailabilityZone>>;
    /// Describes the given subnets.
    async fn describe_subnets(&self, subnet_ids: &[String]) -> Result<Vec<Subnet>>;
    /// Lists the route tables of a VPC.
    async fn describe_route_tables(&self, vpc_id: &str) -> Result<Vec<RouteTable>>;
}

#[cfg(any(feature = "mockall", test))]
mock! {
    /// A Mock Ec2Client for use in tests.
    pub Ec2Client {}
    #[async_trait]
    impl Ec2Client for Ec2Client {
        async fn describe_availability_zones(&self, region: &str) -> Result<Vec<AvailabilityZone>>;
        async fn describe_subnets(&self, subnet_ids: &[String]) -> Result<Vec<Subnet>>;
        async fn describe_route_tables(&self, vpc_id: &str) -> Result<Vec<RouteTable>>;
    }
}

/// Decides whether an error returned while describing subnets means some requested subnet does not exist, and
/// if so returns the human-readable part of it.
///
/// EC2 offers no typed error for this, so the decision rests on the error text. The inner message is extracted
/// from the `InvalidSubnetID.NotFound: <message>\t<envelope>` form; other `InvalidSubnet` errors are returned whole.
pub fn subnet_not_found_message(error_text: &str) -> Option<String> {
    if !error_text.contains("InvalidSubnet") {
        return None;
    }
    let message = SUBNET_NOT_FOUND_RE
        .captures(error_text)
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str().trim_end().to_string())
        .unwrap_or_else(|| error_text.to_string());
    Some(message)
}

#[derive(Clone)]
/// Concrete implementation of the `Ec2Client` trait, scoped to a single region. This implementation will almost
/// certainly be used in any case that isn't a unit test.
pub struct SdkEc2Client {
    ec2_client: aws_sdk_ec2::Client,
}

impl SdkEc2Client {
    /// Loads shared AWS configuration from the environment for the given region.
    pub async fn for_region(region: &str) -> Self {
        let region_provider = RegionProviderChain::first_try(Some(Region::new(region.to_string())));
        let shared_config = aws_config::from_env().region(region_provider).load().await;
        SdkEc2Client {
            ec2_client: aws_sdk_ec2::Client::new(&shared_config),
        }
    }
}

#[async_trait]
impl Ec2Client for SdkEc2Client {
    #[instrument(skip(self), err)]
    async fn describe_availability_zones(&self, region: &str) -> Result<Vec<AvailabilityZone>> {
        let output = self
            .ec2_client
            .describe_availability_zones()
            .filters(Filter::builder().name("region-name").values(region).build())
            .send()
            .await
            .map_err(|err| ec2_error::Error::DescribeAvailabilityZones {
                region: region.to_string(),
                message: render_sdk_error(&err),
            })?;

        output
            .availability_zones
            .unwrap_or_default()
            .into_iter()
            .map(|zone| {
                Ok(AvailabilityZone {
                    name: zone.zone_name.context(ec2_error::MissingFieldSnafu {
                        resource: "availability zone",
                        field: "zone_name",
                    })?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn describe_subnets(&self, subnet_ids: &[String]) -> Result<Vec<Subnet>> {
        let output = self
            .ec2_client
            .describe_subnets()
            .set_subnet_ids(Some(subnet_ids.to_vec()))
            .send()
            .await
            .map_err(|err| ec2_error::Error::DescribeSubnets {
                message: render_sdk_error(&err),
            })?;

        output
            .subnets
            .unwrap_or_default()
            .into_iter()
            .map(subnet_from_sdk)
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn describe_route_tables(&self, vpc_id: &str) -> Result<Vec<RouteTable>> {
        let output = self
            .ec2_client
            .describe_route_tables()
            .filters(Filter::builder().name("vpc-id").values(vpc_id).build())
            .send()
            .await
            .map_err(|err| ec2_error::Error::DescribeRouteTables {
                vpc_id: vpc_id.to_string(),
                message: render_sdk_error(&err),
            })?;

        Ok(output
            .route_tables
            .unwrap_or_default()
            .into_iter()
            .map(route_table_from_sdk)
            .collect())
    }
}

/// A subnet without an id is unusable and rejected. Other absent fields default to empty.
fn subnet_from_sdk(subnet: aws_sdk_ec2::types::Subnet) -> Result<Subnet> {
    Ok(Subnet {
        id: subnet.subnet_id.context(ec2_error::MissingFieldSnafu {
            resource: "subnet",
            field: "subnet_id",
        })?,
        availability_zone: subnet.availability_zone.unwrap_or_default(),
        vpc_id: subnet.vpc_id.unwrap_or_default(),
        tags: tags_to_map(subnet.tags),
    })
}

fn route_table_from_sdk(table: aws_sdk_ec2::types::RouteTable) -> RouteTable {
    RouteTable {
        id: table.route_table_id.unwrap_or_default(),
        associations: table
            .associations
            .unwrap_or_default()
            .into_iter()
            .map(|assoc| RouteTableAssociation {
                subnet_id: assoc.subnet_id,
                main: assoc.main.unwrap_or(false),
            })
            .collect(),
        routes: table
            .routes
            .unwrap_or_default()
            .into_iter()
            .map(|route| Route {
                gateway_id: route.gateway_id,
            })
            .collect(),
    }
}

/// Renders an SDK error as `<code>: <message>`, falling back to the error's own display.
fn render_sdk_error<E, R>(err: &SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code.to_string(),
        _ => err.to_string(),
    }
}

fn tags_to_map(tags: Option<Vec<Tag>>) -> BTreeMap<String, String> {
    tags.unwrap_or_default()
        .into_iter()
        .filter_map(|tag| {
            let value = tag.value;
            tag.key.map(|key| (key, value.unwrap_or_default()))
        })
        .collect()
}

pub mod ec2_error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Unable to describe availability zones in '{}': {}", region, message))]
        DescribeAvailabilityZones { region: String, message: String },

        #[snafu(display("{}", message))]
        DescribeSubnets { message: String },

        #[snafu(display("Unable to describe route tables of '{}': {}", vpc_id, message))]
        DescribeRouteTables { vpc_id: String, message: String },

        #[snafu(display("EC2 returned a {} without '{}'", resource, field))]
        MissingField {
            resource: &'static str,
            field: &'static str,
        },
    }

    impl Error {
        /// If this error reports that requested subnets do not exist, the readable text describing which.
        pub fn subnet_not_found_message(&self) -> Option<String> {
            match self {
                Error::DescribeSubnets { message } => super::subnet_not_found_message(message),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{
        Route as SdkRoute, RouteTable as SdkRouteTable, RouteTableAssociation as SdkAssociation,
        Subnet as SdkSubnet, Tag,
    };
    use maplit::btreemap;

    #[test]
    fn test_subnet_not_found_message() {
        let test_cases = vec![
            (
                "InvalidSubnetID.NotFound: The subnet ID 'subnet-1,subnet-2' does not exist\tstatus code: 400, request id: ea8b3bb7-de56-405f-9345-e5690a3ea8b2",
                Some("The subnet ID 'subnet-1,subnet-2' does not exist"),
            ),
            (
                "InvalidSubnetID.NotFound: The subnet ID 'subnet-1' does not exist",
                Some("The subnet ID 'subnet-1' does not exist"),
            ),
            (
                "InvalidSubnetID.Malformed: Invalid id: \"bogus\"",
                Some("InvalidSubnetID.Malformed: Invalid id: \"bogus\""),
            ),
            ("RequestLimitExceeded: Request limit exceeded.", None),
            ("dispatch failure", None),
        ];

        for (error_text, expected) in test_cases {
            assert_eq!(
                subnet_not_found_message(error_text),
                expected.map(String::from)
            );
        }
    }

    #[test]
    fn test_error_classification_only_for_subnet_describes() {
        let not_found = "InvalidSubnetID.NotFound: The subnet ID 'subnet-1' does not exist".to_string();
        let describe_subnets = ec2_error::Error::DescribeSubnets {
            message: not_found.clone(),
        };
        let describe_route_tables = ec2_error::Error::DescribeRouteTables {
            vpc_id: "vpc-1".to_string(),
            message: not_found,
        };
        assert_eq!(
            describe_subnets.subnet_not_found_message().as_deref(),
            Some("The subnet ID 'subnet-1' does not exist")
        );
        assert_eq!(describe_route_tables.subnet_not_found_message(), None);
    }

    #[test]
    fn test_tags_to_map() {
        let tags = vec![
            Tag::builder().key("Name").value("infra-private-a").build(),
            Tag::builder().key("kubernetes.io/role/elb").build(),
            Tag::builder().value("orphaned").build(),
        ];
        assert_eq!(
            tags_to_map(Some(tags)),
            btreemap! {
                "Name".to_string() => "infra-private-a".to_string(),
                "kubernetes.io/role/elb".to_string() => "".to_string(),
            }
        );
        assert!(tags_to_map(None).is_empty());
    }

    #[test]
    fn test_subnet_from_sdk() {
        let test_cases = vec![
            (
                SdkSubnet::builder()
                    .subnet_id("subnet-1")
                    .availability_zone("us-east-1a")
                    .vpc_id("vpc-1")
                    .tags(Tag::builder().key("Name").value("infra-private-a").build())
                    .build(),
                Some(Subnet {
                    id: "subnet-1".to_string(),
                    availability_zone: "us-east-1a".to_string(),
                    vpc_id: "vpc-1".to_string(),
                    tags: btreemap! { "Name".to_string() => "infra-private-a".to_string() },
                }),
            ),
            (
                SdkSubnet::builder().subnet_id("subnet-2").build(),
                Some(Subnet {
                    id: "subnet-2".to_string(),
                    ..Default::default()
                }),
            ),
            (
                SdkSubnet::builder()
                    .availability_zone("us-east-1a")
                    .vpc_id("vpc-1")
                    .build(),
                None,
            ),
        ];

        for (sdk_subnet, expected) in test_cases {
            match expected {
                Some(expected) => assert_eq!(subnet_from_sdk(sdk_subnet).unwrap(), expected),
                None => assert!(matches!(
                    subnet_from_sdk(sdk_subnet),
                    Err(ec2_error::Error::MissingField {
                        resource: "subnet",
                        field: "subnet_id",
                    })
                )),
            }
        }
    }

    #[test]
    fn test_route_table_from_sdk() {
        let test_cases = vec![
            (
                SdkRouteTable::builder()
                    .route_table_id("rtb-main")
                    .associations(SdkAssociation::builder().main(true).build())
                    .routes(SdkRoute::builder().gateway_id("local").build())
                    .routes(SdkRoute::builder().gateway_id("igw-1").build())
                    .build(),
                RouteTable {
                    id: "rtb-main".to_string(),
                    associations: vec![RouteTableAssociation {
                        subnet_id: None,
                        main: true,
                    }],
                    routes: vec![
                        Route {
                            gateway_id: Some("local".to_string()),
                        },
                        Route {
                            gateway_id: Some("igw-1".to_string()),
                        },
                    ],
                },
            ),
            (
                SdkRouteTable::builder()
                    .route_table_id("rtb-private")
                    .associations(SdkAssociation::builder().subnet_id("subnet-1").build())
                    .routes(SdkRoute::builder().nat_gateway_id("nat-1").build())
                    .build(),
                RouteTable {
                    id: "rtb-private".to_string(),
                    associations: vec![RouteTableAssociation {
                        subnet_id: Some("subnet-1".to_string()),
                        main: false,
                    }],
                    routes: vec![Route { gateway_id: None }],
                },
            ),
            (SdkRouteTable::builder().build(), RouteTable::default()),
        ];

        for (sdk_table, expected) in test_cases {
            let table = route_table_from_sdk(sdk_table);
            assert_eq!(table, expected);
        }
    }
}
