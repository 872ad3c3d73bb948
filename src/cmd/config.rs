//! Configuration view and validation commands: `script-bridge config`.

use anyhow::Result;
use script_bridge::config::ScriptToml;
use script_bridge::script::Lifecycle;
use std::path::Path;

use super::super::ConfigCommands;

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let toml = ScriptToml::load(config_path)?;
            let resolved = toml.resolve()?;

            println!();
            println!("Script Bridge Configuration");
            println!("===========================");
            println!();
            println!("Config file: {}", config_path.display());
            println!("Operating system: {}", std::env::consts::OS);
            println!();

            println!("[commands]");
            for phase in Lifecycle::ALL {
                match resolved.commands.for_phase(phase) {
                    Some(command) => println!(
                        "  {:<7} {:?} {}",
                        phase.as_str(),
                        command.interpreter,
                        command.command
                    ),
                    None => println!("  {:<7} (not set)", phase.as_str()),
                }
            }
            println!();

            println!("[timeouts]");
            for phase in Lifecycle::ALL {
                println!("  {:<7} {:?}", phase.as_str(), resolved.timeouts.for_phase(phase));
            }
            println!();

            println!("[settings]");
            println!("  log_output = {}", resolved.log_output);
            println!("  output_drift = {}", resolved.output_drift);
            if let Some(dir) = &resolved.working_dir {
                println!("  working_directory = \"{}\"", dir.display());
            }
            if let Some(inputs) = &resolved.inputs {
                println!("  inputs = {}", inputs);
            }
            println!();

            if !resolved.environment.is_empty() {
                let mut keys: Vec<&String> = resolved.environment.keys().collect();
                keys.sort();
                println!("[environment]");
                for key in keys {
                    println!("  {} = \"{}\"", key, resolved.environment[key]);
                }
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let toml = ScriptToml::load(config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
    }

    Ok(())
}
