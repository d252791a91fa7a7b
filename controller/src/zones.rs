use crate::ec2::{self, Ec2Client};

use tracing::{event, instrument, Level};

/// Lists the names of the availability zones in `region`, in the order EC2 returns them.
///
/// An empty list is returned as-is; callers decide whether a region without zones is usable.
#[instrument(skip(ec2_client), err)]
pub async fn list_zones<E: Ec2Client>(ec2_client: &E, region: &str) -> ec2::Result<Vec<String>> {
    let zones: Vec<String> = ec2_client
        .describe_availability_zones(region)
        .await?
        .into_iter()
        .map(|zone| zone.name)
        .collect();
    event!(Level::DEBUG, ?zones, "Listed availability zones.");
    Ok(zones)
}
