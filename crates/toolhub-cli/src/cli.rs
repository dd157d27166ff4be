//! CLI argument and command definitions.

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;

#[derive(Parser)]
#[command(name = "toolhub", version, about = "Configure MCP tool servers and use their tools")]
pub struct Cli {
    /// Project whose instances are managed.
    #[arg(long, default_value = "default", global = true, env = "TOOLHUB_PROJECT")]
    pub project: String,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List known server definitions, or show one in detail.
    Servers {
        /// Server id to describe.
        id: Option<String>,
    },

    /// Manage server instances.
    Instance {
        #[command(subcommand)]
        action: InstanceAction,
    },

    /// Start every enabled instance and list the merged tools.
    Tools {
        /// Tool name to describe.
        name: Option<String>,
    },

    /// Start every enabled instance and call one tool.
    Call {
        /// Tool name.
        tool: String,

        /// Arguments as a JSON object.
        args: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum InstanceAction {
    /// Create an instance of a server definition.
    Add {
        /// Server definition id.
        server: String,

        /// Display name (defaults to the server's name).
        #[arg(long)]
        name: Option<String>,

        /// Parameter value as key=value. Repeatable.
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// List instances, oldest first.
    List,
    /// Show one instance.
    Show { id: String },
    /// Change parameter values. An empty value removes the parameter.
    Update {
        id: String,

        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Change the display name.
    Rename { id: String, name: String },
    Enable { id: String },
    Disable { id: String },
    /// Delete one instance.
    Remove { id: String },
    /// Delete every instance of the project.
    Clear,
    /// Check parameter values against a server definition.
    Validate {
        server: String,

        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Start the instance's server once and list its tools.
    Test { id: String },
    /// Instance counts.
    Stats,
}

/// Parse `key=value`. The value may be empty or contain further `=`.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn params_map(params: Vec<(String, String)>) -> BTreeMap<String, String> {
    params.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("root=/srv/data").unwrap(),
            ("root".to_string(), "/srv/data".to_string())
        );
        assert_eq!(
            parse_param("env=A=1,B=2").unwrap(),
            ("env".to_string(), "A=1,B=2".to_string())
        );
        assert_eq!(parse_param("flag=").unwrap().1, "");
        assert!(parse_param("novalue").is_err());
        assert!(parse_param(" =x").is_err());
    }

    #[test]
    fn test_cli_parses_instance_add() {
        let cli = Cli::try_parse_from([
            "toolhub",
            "--project",
            "work",
            "instance",
            "add",
            "filesystem",
            "-p",
            "root=/srv",
            "--param",
            "extra_root=/tmp",
        ])
        .unwrap();
        assert_eq!(cli.project, "work");
        match cli.command {
            Commands::Instance {
                action: InstanceAction::Add { server, name, params },
            } => {
                assert_eq!(server, "filesystem");
                assert!(name.is_none());
                assert_eq!(params.len(), 2);
            }
            _ => panic!("expected instance add"),
        }
    }
}
