//! Gates features on the version of the cluster a pool belongs to.
use lazy_static::lazy_static;
use semver::{Version, VersionReq};
use tracing::{event, instrument, Level};

lazy_static! {
    static ref VERSIONS_SUPPORTING_SPOT_INSTANCES: VersionReq =
        VersionReq::parse(">=4.5.0").expect("Invalid version requirement literal.");
    static ref VERSIONS_WITH_MANAGED_USER_DATA: VersionReq =
        VersionReq::parse(">=4.10.0").expect("Invalid version requirement literal.");
}

pub const WORKER_USER_DATA_SECRET: &str = "worker-user-data";
pub const MANAGED_WORKER_USER_DATA_SECRET: &str = "worker-user-data-managed";

/// Returns whether a pool requesting spot market options targets a cluster that cannot run spot instances.
///
/// Pools without spot market options are always supported. An unparsable cluster version cannot be shown to
/// support spot instances, so it counts as unsupported.
#[instrument]
pub fn is_using_unsupported_spot_market_options(spot_requested: bool, cluster_version: &str) -> bool {
    if !spot_requested {
        return false;
    }
    match parse_tolerant(cluster_version) {
        Ok(version) => !VERSIONS_SUPPORTING_SPOT_INSTANCES.matches(&version),
        Err(err) => {
            event!(
                Level::WARN,
                cluster_version,
                error = %err,
                "Could not parse the cluster version."
            );
            true
        }
    }
}

/// Returns the name of the secret holding the user data worker nodes bootstrap from.
///
/// Clusters from 4.10 on keep worker user data in a managed secret. An unparsable version is assumed to be recent
/// and gets the managed secret.
pub fn worker_user_data(cluster_version: &str) -> &'static str {
    match parse_tolerant(cluster_version) {
        Ok(version) if !VERSIONS_WITH_MANAGED_USER_DATA.matches(&version) => WORKER_USER_DATA_SECRET,
        Ok(_) => MANAGED_WORKER_USER_DATA_SECRET,
        Err(err) => {
            event!(
                Level::WARN,
                cluster_version,
                error = %err,
                "Could not parse the cluster version, using managed user data."
            );
            MANAGED_WORKER_USER_DATA_SECRET
        }
    }
}

/// Parses a version leniently, keeping only major, minor and patch.
///
/// Surrounding whitespace and a leading `v` are accepted, missing minor or patch components count as zero, and
/// pre-release and build suffixes are dropped so that `4.10.0-fc.3` compares as `4.10.0`.
pub fn parse_tolerant(raw: &str) -> std::result::Result<Version, semver::Error> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    let core = trimmed
        .split(|c| c == '-' || c == '+')
        .next()
        .unwrap_or_default();

    let mut components: Vec<String> = core
        .split('.')
        .map(|component| {
            // Leading zeros are rejected by strict semver.
            let stripped = component.trim_start_matches('0');
            if stripped.is_empty() && !component.is_empty() {
                "0".to_string()
            } else {
                stripped.to_string()
            }
        })
        .collect();
    while components.len() < 3 {
        components.push("0".to_string());
    }

    let version = Version::parse(&components.join("."))?;
    Ok(Version::new(version.major, version.minor, version.patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_spot_market_options() {
        let test_cases = vec![
            (false, "4.4.0", false),
            (false, "garbage", false),
            (true, "4.4.0", true),
            (true, "4.4.99", true),
            (true, "4.5.0", false),
            (true, "4.5.0-rc.1", false),
            (true, "4.9.0", false),
            (true, "4.10.0-fc.3", false),
            (true, "v4.6.1+build.7", false),
            (true, "3.11.0", true),
            (true, "5.0.0", false),
            (true, "4.5", false),
            (true, "", true),
            (true, "not-a-version", true),
        ];

        for (spot_requested, version, expected) in test_cases {
            assert_eq!(
                is_using_unsupported_spot_market_options(spot_requested, version),
                expected,
                "spot_requested={} version={}",
                spot_requested,
                version
            );
        }
    }

    #[test]
    fn test_worker_user_data() {
        let test_cases = vec![
            ("4.9.0", "worker-user-data"),
            ("4.10.0", "worker-user-data-managed"),
            ("4.10.0-fc.3", "worker-user-data-managed"),
            ("unparseable", "worker-user-data-managed"),
        ];

        for (version, expected) in test_cases {
            assert_eq!(worker_user_data(version), expected, "version={}", version);
        }
    }

    #[test]
    fn test_parse_tolerant() {
        let test_cases = vec![
            ("4.10.0-fc.3", Version::new(4, 10, 0)),
            (" v4.7.2 ", Version::new(4, 7, 2)),
            ("4.8", Version::new(4, 8, 0)),
            ("4", Version::new(4, 0, 0)),
            ("04.05.00", Version::new(4, 5, 0)),
            ("4.6.0+abc", Version::new(4, 6, 0)),
        ];

        for (raw, expected) in test_cases {
            assert_eq!(parse_tolerant(raw).unwrap(), expected);
        }
        assert!(parse_tolerant("4.x.0").is_err());
        assert!(parse_tolerant("1.2.3.4").is_err());
    }
}
