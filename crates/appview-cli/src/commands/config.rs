use anyhow::Context;
use appview_core::config::IndexerConfig;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the merged configuration as TOML
    Show,
}

pub fn execute(args: ConfigArgs, config: &IndexerConfig) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let rendered =
                toml::to_string_pretty(config).context("failed to render configuration")?;
            print!("{}", rendered);
            Ok(())
        }
    }
}
