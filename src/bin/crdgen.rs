//! # CRD Generator
//!
//! Prints the `CustomSecret` CustomResourceDefinition as YAML, derived from
//! the Rust types.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/customsecret.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use custom_secret_controller::crd::CustomSecret;
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&CustomSecret::crd())?);
    Ok(())
}
