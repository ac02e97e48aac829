//! Schema command: print the JSON schema of test definition files

use crate::config::TestDefinition;
use crate::Result;

pub async fn run() -> Result<()> {
    let schema = schemars::schema_for!(TestDefinition);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
