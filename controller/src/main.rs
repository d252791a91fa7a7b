use std::convert::TryFrom;

use controller::{
    config::ControllerConfig, status::K8SPoolStatusClient, synthesize::NodeGroupSynthesizer,
    PoolController,
};
use models::{cluster::WorkloadCluster, pool::WorkerPool, telemetry};

use futures::StreamExt;
use kube::{
    api::Api,
    runtime::{
        reflector,
        watcher::{watcher, Config},
        WatchStreamExt,
    },
    ResourceExt,
};
use snafu::ResultExt;
use tracing::{event, Level};

/// The module-wide result type.
type Result<T> = std::result::Result<T, controller_error::Error>;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_telemetry_from_env().context(controller_error::TelemetryInitSnafu)?;

    let config = ControllerConfig::from_environment().context(controller_error::ConfigSnafu)?;
    event!(Level::INFO, ?config, "Loaded controller configuration.");

    let incluster_config =
        kube::Config::incluster_dns().context(controller_error::ConfigCreateSnafu)?;

    // Use the incluster config to infer the namespace
    let namespace = incluster_config.default_namespace.to_string();

    let k8s_client = kube::client::Client::try_from(incluster_config)
        .context(controller_error::ClientCreateSnafu)?;

    // The `PoolController` reads pools and clusters from `reflector::Store`s, which are updated by reflectors
    // that run concurrently. We'll create the stores and run the reflectors here.
    let pools = Api::<WorkerPool>::namespaced(k8s_client.clone(), &namespace);
    let pool_store = reflector::store::Writer::<WorkerPool>::default();
    let pool_reader = pool_store.as_reader();
    let pool_reflector =
        reflector::reflector(pool_store, watcher(pools, Config::default()).default_backoff());
    let pool_drainer = pool_reflector
        .touched_objects()
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|pool| {
            event!(
                Level::TRACE,
                pool_name = %pool.name_any(),
                "Processed a k8s event for a WorkerPool object."
            );
            futures::future::ready(())
        });

    let clusters = Api::<WorkloadCluster>::namespaced(k8s_client.clone(), &namespace);
    let cluster_store = reflector::store::Writer::<WorkloadCluster>::default();
    let cluster_reader = cluster_store.as_reader();
    let cluster_reflector = reflector::reflector(
        cluster_store,
        watcher(clusters, Config::default()).default_backoff(),
    );
    let cluster_drainer = cluster_reflector
        .touched_objects()
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|cluster| {
            event!(
                Level::TRACE,
                cluster_name = %cluster.name_any(),
                "Processed a k8s event for a WorkloadCluster object."
            );
            futures::future::ready(())
        });

    // Setup and run the controller.
    let mut controller = PoolController::new(
        K8SPoolStatusClient::new(k8s_client),
        NodeGroupSynthesizer::new(config.naming),
        pool_reader,
        cluster_reader,
        config.reconcile_interval,
    );
    let controller_runner = controller.run();

    tokio::select! {
        _ = pool_drainer => {
            event!(Level::ERROR, "pool reflector drained");
            return controller_error::KubernetesWatcherFailedSnafu { object: "WorkerPool" }.fail();
        },
        _ = cluster_drainer => {
            event!(Level::ERROR, "cluster reflector drained");
            return controller_error::KubernetesWatcherFailedSnafu { object: "WorkloadCluster" }.fail();
        },
        controller = controller_runner => {
            event!(Level::ERROR, "controller exited");
            controller.context(controller_error::ControllerSnafu)?
        },
    };
    Ok(())
}

pub mod controller_error {
    use controller::{config::config_error, controllerclient_error};
    use models::telemetry;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Unable to load controller configuration: '{}'", source))]
        Config { source: config_error::Error },

        #[snafu(display("Unable to create Kubernetes client config: '{}'", source))]
        ConfigCreate {
            source: kube::config::InClusterError,
        },

        #[snafu(display("Unable to create Kubernetes client: '{}'", source))]
        ClientCreate { source: kube::Error },

        #[snafu(display("Error running controller: '{}'", source))]
        Controller {
            source: controllerclient_error::Error,
        },

        #[snafu(display("The Kubernetes WATCH on {} objects has failed.", object))]
        KubernetesWatcherFailed { object: String },

        #[snafu(display("Error configuring telemetry: '{}'", source))]
        TelemetryInit {
            source: telemetry::TelemetryConfigError,
        },
    }
}
