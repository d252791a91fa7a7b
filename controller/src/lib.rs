mod controller;

pub mod classify;
pub mod config;
pub mod ec2;
pub mod image;
pub mod naming;
pub mod reconciler;
pub mod resolver;
pub mod status;
pub mod synthesize;
pub mod template;
pub mod topology;
pub mod version;
pub mod zones;

pub use crate::controller::controllerclient_error;
pub use crate::controller::PoolController;
