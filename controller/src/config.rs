use crate::naming::{
    NamingPolicy, DEFAULT_PRIVATE_SUBNET_TEMPLATE, DEFAULT_WORKER_PROFILE_TEMPLATE,
    DEFAULT_WORKER_SECURITY_GROUP_TEMPLATE,
};

use snafu::{ensure, ResultExt};
use std::env;
use std::time::Duration;
use validator::Validate;

const RECONCILE_INTERVAL_ENV_VAR: &str = "RECONCILE_INTERVAL_SECONDS";
const WORKER_PROFILE_TEMPLATE_ENV_VAR: &str = "WORKER_PROFILE_NAME_TEMPLATE";
const PRIVATE_SUBNET_TEMPLATE_ENV_VAR: &str = "PRIVATE_SUBNET_NAME_TEMPLATE";
const WORKER_SECURITY_GROUP_TEMPLATE_ENV_VAR: &str = "WORKER_SECURITY_GROUP_NAME_TEMPLATE";

const DEFAULT_RECONCILE_INTERVAL_SECONDS: u64 = 60;

/// The module-wide result type.
type Result<T> = std::result::Result<T, config_error::Error>;

/// Settings for the controller binary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    /// Time between reconciliation passes over all pools.
    pub reconcile_interval: Duration,
    pub naming: NamingPolicy,
}

impl ControllerConfig {
    pub fn from_environment() -> Result<Self> {
        Self::from_values(
            env::var(RECONCILE_INTERVAL_ENV_VAR).ok(),
            env::var(WORKER_PROFILE_TEMPLATE_ENV_VAR).ok(),
            env::var(PRIVATE_SUBNET_TEMPLATE_ENV_VAR).ok(),
            env::var(WORKER_SECURITY_GROUP_TEMPLATE_ENV_VAR).ok(),
        )
    }

    fn from_values(
        reconcile_interval: Option<String>,
        worker_profile: Option<String>,
        private_subnet: Option<String>,
        worker_security_group: Option<String>,
    ) -> Result<Self> {
        let reconcile_interval_seconds = match reconcile_interval {
            Some(seconds) => seconds
                .trim()
                .parse::<u64>()
                .context(config_error::InvalidIntervalSnafu {
                    variable: RECONCILE_INTERVAL_ENV_VAR,
                    value: seconds.clone(),
                })?,
            None => DEFAULT_RECONCILE_INTERVAL_SECONDS,
        };
        ensure!(
            reconcile_interval_seconds > 0,
            config_error::ZeroIntervalSnafu {
                variable: RECONCILE_INTERVAL_ENV_VAR
            }
        );

        let naming = NamingPolicy {
            worker_profile: worker_profile
                .unwrap_or_else(|| DEFAULT_WORKER_PROFILE_TEMPLATE.to_string()),
            private_subnet: private_subnet
                .unwrap_or_else(|| DEFAULT_PRIVATE_SUBNET_TEMPLATE.to_string()),
            worker_security_group: worker_security_group
                .unwrap_or_else(|| DEFAULT_WORKER_SECURITY_GROUP_TEMPLATE.to_string()),
        };
        naming
            .validate()
            .context(config_error::InvalidNameTemplateSnafu {
                variables: format!(
                    "{}, {}, {}",
                    WORKER_PROFILE_TEMPLATE_ENV_VAR,
                    PRIVATE_SUBNET_TEMPLATE_ENV_VAR,
                    WORKER_SECURITY_GROUP_TEMPLATE_ENV_VAR
                ),
            })?;

        Ok(ControllerConfig {
            reconcile_interval: Duration::from_secs(reconcile_interval_seconds),
            naming,
        })
    }
}

pub mod config_error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Invalid value '{}' for {}: '{}'", value, variable, source))]
        InvalidInterval {
            variable: &'static str,
            value: String,
            source: std::num::ParseIntError,
        },

        #[snafu(display("{} must be greater than zero", variable))]
        ZeroInterval { variable: &'static str },

        #[snafu(display(
            "Name templates must contain '{{infra_id}}', and the private subnet template also '{{zone}}' ({}): '{}'",
            variables,
            source
        ))]
        InvalidNameTemplate {
            variables: String,
            source: validator::ValidationErrors,
        },
    }
}
