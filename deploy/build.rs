/*!

The custom resource definitions are modeled as Rust structs. Here we generate
the corresponding k8s yaml files.

!*/

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

const DEPLOY_DIR: &str = env!("CARGO_MANIFEST_DIR");
const YAML_DOC_LEADER: &str = "---\n";

fn main() {
    // Re-run this build script if the model changes.
    println!("cargo:rerun-if-changed=../models/src");

    let golden_dir = PathBuf::from(DEPLOY_DIR).join("tests").join("golden");
    fs::create_dir_all(&golden_dir).unwrap();
    let mut poolgen_crds = File::create(golden_dir.join("custom-resource-definition.yaml")).unwrap();

    for crd in models::crds() {
        poolgen_crds.write_all(YAML_DOC_LEADER.as_bytes()).unwrap();
        serde_yaml::to_writer(&poolgen_crds, &crd).unwrap();
    }
}
