/// Helper macro to avoid retyping the base domain-like name of our system when creating further
/// string constants from it. When given no parameters, this returns the base domain-like name of
/// the system. When given a string literal parameter it adds `/parameter` to the end.
#[macro_export]
macro_rules! poolgen_domain {
    () => {
        "poolgen.aws"
    };
    ($s:literal) => {
        concat!(poolgen_domain!(), "/", $s)
    };
}

pub const API_VERSION: &str = poolgen_domain!("v1");

// Annotation keys
/// Pools carrying this annotation use its value as the image id instead of the control plane's image.
pub const IMAGE_ID_OVERRIDE_ANNOTATION: &str = poolgen_domain!("image-id-override");

// Label keys stamped onto generated node groups.
pub const LABEL_CLUSTER_INFRA_ID: &str = poolgen_domain!("cluster-infra-id");
pub const LABEL_POOL: &str = poolgen_domain!("pool");
pub const LABEL_ROLE: &str = poolgen_domain!("role");
pub const WORKER_ROLE: &str = "worker";

// Subnet tags
/// The tag used on a subnet to designate that it should be used for internet ELBs.
pub const TAG_SUBNET_PUBLIC_ELB: &str = "kubernetes.io/role/elb";
/// Prefix of gateway ids which belong to internet gateways.
pub const INTERNET_GATEWAY_PREFIX: &str = "igw";
pub const TAG_NAME_FILTER: &str = "tag:Name";

// Condition types
pub const CONDITION_UNSUPPORTED_CONFIGURATION: &str = "UnsupportedConfiguration";
pub const CONDITION_INVALID_SUBNETS: &str = "InvalidSubnets";

// Condition reasons
pub const REASON_UNSUPPORTED_SPOT_MARKET_OPTIONS: &str = "UnsupportedSpotMarketOptions";
pub const REASON_CONFIGURATION_SUPPORTED: &str = "ConfigurationSupported";
pub const REASON_SUBNETS_NOT_FOUND: &str = "SubnetsNotFound";
pub const REASON_MORE_THAN_ONE_SUBNET_FOR_ZONE: &str = "MoreThanOneSubnetForZone";
pub const REASON_INSUFFICIENT_PUBLIC_SUBNETS: &str = "InsufficientPublicSubnets";
pub const REASON_NO_SUBNET_FOR_AVAILABILITY_ZONE: &str = "NoSubnetForAvailabilityZone";
pub const REASON_VALID_SUBNETS: &str = "ValidSubnets";
