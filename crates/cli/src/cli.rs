use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rerouter_core::{ResourceType, RuleType};

/// Manage URL redirect rules held by the rerouter background process.
#[derive(Parser, Debug)]
#[command(name = "rerouter", version, about)]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/rerouter/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Bridge endpoint override (`ipc://<path>` or `tcp://<host>:<port>`)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Reply timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all rules
    List,

    /// Add a rule
    Add(RuleArgs),

    /// Change fields of an existing rule
    Edit {
        id: u64,
        #[command(flatten)]
        fields: EditArgs,
    },

    /// Delete a rule
    Delete {
        id: u64,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Turn a single rule on or off (flips it when no state is given)
    Toggle {
        id: u64,
        #[arg(value_enum)]
        state: Option<Switch>,
    },

    /// Write all rules to a JSON file
    Export {
        /// Output path (default: rerouter-rules-<unix-millis>.json)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Add rules from a native or third-party export file
    Import { file: PathBuf },

    /// Show whether redirection is on
    Status,

    /// Turn redirection on
    Enable,

    /// Turn redirection off
    Disable,

    /// Show where a URL would be redirected
    Test {
        url: String,
        #[arg(long, value_parser = parse_resource_type)]
        resource_type: Option<ResourceType>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Wildcard,
    Regex,
}

impl From<KindArg> for RuleType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Wildcard => RuleType::Wildcard,
            KindArg::Regex => RuleType::Regex,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct RuleArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    /// URL pattern (wildcard) or regular expression (regex)
    #[arg(long)]
    pub from: String,

    /// Redirect target; for regex rules this is the substitution (`\1` etc.)
    #[arg(long)]
    pub to: String,

    #[arg(long = "type", value_enum, default_value = "wildcard")]
    pub kind: KindArg,

    #[arg(long)]
    pub priority: Option<u32>,

    /// Restrict to these request kinds (repeatable)
    #[arg(long = "resource-type", value_parser = parse_resource_type)]
    pub resource_types: Vec<ResourceType>,

    /// Store the rule switched off
    #[arg(long)]
    pub disabled: bool,
}

#[derive(clap::Args, Debug, Default)]
pub struct EditArgs {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub from: Option<String>,

    #[arg(long)]
    pub to: Option<String>,

    #[arg(long = "type", value_enum)]
    pub kind: Option<KindArg>,

    #[arg(long)]
    pub priority: Option<u32>,

    #[arg(long = "resource-type", value_parser = parse_resource_type)]
    pub resource_types: Option<Vec<ResourceType>>,
}

fn parse_resource_type(s: &str) -> Result<ResourceType, String> {
    s.parse()
}
