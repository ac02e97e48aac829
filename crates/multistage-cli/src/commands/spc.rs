//! SecretProviderClass command: provider classes for every CSI credential
//! group of a test

use std::collections::HashSet;

use clap::Args;
use tracing::debug;

use multistage_credentials::{build_secret_provider_classes, SecretProviderClass};

use super::{format_manifests, DefinitionArgs};
use crate::config::TestDefinition;
use crate::Result;

#[derive(Args, Debug)]
pub struct SpcArgs {
    #[command(flatten)]
    pub definition: DefinitionArgs,

    /// Secret Manager project; overrides the definition's `gsm_project`
    #[arg(long, env = "MULTISTAGE_GSM_PROJECT")]
    pub gsm_project: Option<String>,
}

pub async fn run(args: SpcArgs) -> Result<()> {
    let definition = args.definition.load()?;
    let classes = secret_provider_classes(&definition, args.gsm_project.as_deref())?;
    print!("{}", format_manifests(&classes, args.definition.output)?);
    Ok(())
}

/// Provider classes for the credentials of every step.
///
/// Steps sharing an identical credential group share its provider class;
/// each class is emitted once.
pub fn secret_provider_classes(
    definition: &TestDefinition,
    gsm_project: Option<&str>,
) -> Result<Vec<SecretProviderClass>> {
    let project = definition.gsm_project(gsm_project);
    let mut seen = HashSet::new();
    let mut classes = Vec::new();

    for step in definition.all_steps() {
        let built = build_secret_provider_classes(
            &definition.job.namespace,
            &definition.name,
            project,
            &step.credentials,
        )?;
        for class in built {
            if seen.insert(class.metadata.name.clone()) {
                classes.push(class);
            } else {
                debug!(step = %step.as_, spc = %class.metadata.name, "provider class already emitted");
            }
        }
    }
    Ok(classes)
}
