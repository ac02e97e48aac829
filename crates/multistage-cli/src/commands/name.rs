//! Name command: print the generated names for a credential group

use clap::Args;

use multistage_common::crd::CredentialReference;
use multistage_credentials::{csi_volume_name, secret_provider_class_name};

use crate::Result;

#[derive(Args, Debug)]
pub struct NameArgs {
    /// Namespace the pods run in
    #[arg(short, long)]
    pub namespace: String,

    /// Secret Manager collection of the group
    #[arg(long)]
    pub collection: String,

    /// Mount path of the group
    #[arg(long)]
    pub mount_path: String,

    /// Credential names in the group, in step order
    #[arg(long = "credential")]
    pub credentials: Vec<String>,
}

pub async fn run(args: NameArgs) -> Result<()> {
    for line in names(&args) {
        println!("{}", line);
    }
    Ok(())
}

fn names(args: &NameArgs) -> Vec<String> {
    let mut lines = vec![format!(
        "volume: {}",
        csi_volume_name(&args.namespace, &args.collection, &args.mount_path)
    )];
    if args.credentials.is_empty() {
        return lines;
    }

    let members: Vec<CredentialReference> = args
        .credentials
        .iter()
        .map(|name| CredentialReference {
            name: name.clone(),
            collection: args.collection.clone(),
            mount_path: args.mount_path.clone(),
            ..Default::default()
        })
        .collect();
    lines.push(format!(
        "secretProviderClass: {}",
        secret_provider_class_name(&args.namespace, &args.collection, &args.mount_path, &members)
    ));
    lines
}
