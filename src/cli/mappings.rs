//! `fqcn mappings` - inspect the merged mapping table

use anyhow::{bail, Result};
use clap::Subcommand;

use super::common::Session;
use super::output::Output;
use crate::domain::is_already_qualified;

#[derive(Subcommand, Debug)]
pub enum MappingsCommands {
    /// List every short name and its fully-qualified name
    List,

    /// Look up one short module name
    Show {
        /// Short module name (e.g. `apt`)
        name: String,
    },
}

pub fn run(cmd: MappingsCommands, session: &Session, output: &Output) -> Result<()> {
    let store = session.store(output)?;

    match cmd {
        MappingsCommands::List => {
            let sorted = store.sorted();
            if output.is_json() {
                output.data(&sorted);
            } else {
                println!("{:<32} FQCN", "MODULE");
                println!("{}", "-".repeat(72));
                for (short_name, fqcn) in &sorted {
                    println!("{:<32} {}", short_name, fqcn);
                }
                println!("{} mapping(s)", sorted.len());
            }
        }

        MappingsCommands::Show { name } => match store.resolve(&name) {
            Some(fqcn) => {
                if output.is_json() {
                    output.data(&serde_json::json!({ "module": name, "fqcn": fqcn }));
                } else {
                    println!("{} -> {}", name, fqcn);
                }
            }
            None if is_already_qualified(&name) => {
                output.success(&format!("{} is already fully qualified", name));
            }
            None => bail!("No mapping for module '{}'", name),
        },
    }

    Ok(())
}
