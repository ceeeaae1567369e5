mod cli;
mod config;
mod remote;
mod terminal;
mod validation;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::info;

use rerouter_bridge::{Request, ResponseBody};
use rerouter_core::{Rule, RuleDraft, RulePatch, RuleType};
use rerouter_rules::convert::{export_json, parse_import, ImportSource};

use crate::cli::{CliArgs, Command, EditArgs, RuleArgs, Switch};
use crate::config::CliConfig;
use crate::remote::Remote;
use crate::terminal::Terminal;
use crate::validation::validate_draft;

#[tokio::main]
async fn main() -> Result<()> {
    rerouter_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let terminal = Terminal::new();

    let config = CliConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let env = rerouter_core::Config::from_env();
    let resolved = config.resolve(&env.bridge, args.endpoint.as_deref(), args.timeout_ms);
    info!(endpoint = %resolved.endpoint, "using bridge endpoint");

    if let Err(e) = run(args.command, &resolved, &terminal).await {
        terminal.print_error(&format!("{e:#}"))?;
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, resolved: &config::Resolved, terminal: &Terminal) -> Result<()> {
    let remote = Remote::connect(resolved).await?;

    match command {
        Command::List => terminal.print_rules(&remote.list().await?)?,

        Command::Add(args) => {
            let mut draft = draft_from_args(args);
            validate_draft(&mut draft).map_err(|e| anyhow!(e))?;
            match remote.send(Request::AddRule { rule: draft }).await? {
                ResponseBody::Id { id } => terminal.print_success(&format!("Added rule {id}."))?,
                other => bail!("unexpected reply to ADD_RULE: {other:?}"),
            }
        }

        Command::Edit { id, fields } => {
            let current = remote.find(id).await?;
            let patch = checked_patch(&current, fields)?;
            match remote.send(Request::UpdateRule { rule: patch }).await? {
                ResponseBody::Rule { rule } => {
                    terminal.print_success(&format!("Updated rule {}.", rule.id))?;
                    terminal.print_rules(std::slice::from_ref(&rule))?;
                }
                other => bail!("unexpected reply to UPDATE_RULE: {other:?}"),
            }
        }

        Command::Delete { id, yes } => {
            if !yes && !terminal.confirm(&format!("Delete rule {id}?"))? {
                return terminal.print_info("Cancelled.");
            }
            remote.send(Request::DeleteRule { id }).await?;
            terminal.print_success(&format!("Deleted rule {id}."))?;
        }

        Command::Toggle { id, state } => {
            let enabled = match state {
                Some(Switch::On) => true,
                Some(Switch::Off) => false,
                None => !remote.find(id).await?.enabled,
            };
            remote.send(Request::ToggleRule { id, enabled }).await?;
            let word = if enabled { "on" } else { "off" };
            terminal.print_success(&format!("Rule {id} is {word}."))?;
        }

        Command::Export { output } => {
            let rules = remote.export().await?;
            let path = output.unwrap_or_else(default_export_path);
            std::fs::write(&path, export_json(&rules))
                .with_context(|| format!("failed to write {}", path.display()))?;
            terminal.print_success(&format!("Exported {} rules to {}.", rules.len(), path.display()))?;
        }

        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let batch = parse_import(&text).map_err(|e| anyhow!("{e}"))?;
            let count = batch.rules.len();
            let format = match batch.source {
                ImportSource::Native => "native",
                ImportSource::ThirdParty => "third-party",
            };
            let rules = checked_import(batch.rules)?;
            remote.send(Request::ImportRules { rules }).await?;
            terminal.print_success(&format!("Imported {count} rules ({format} format)."))?;
        }

        Command::Status => match remote.send(Request::GetEnabled).await? {
            ResponseBody::Enabled { enabled } => {
                let word = if enabled { "enabled" } else { "disabled" };
                terminal.print_info(&format!("Redirection is {word}."))?;
            }
            other => bail!("unexpected reply to GET_ENABLED: {other:?}"),
        },

        Command::Enable => set_enabled(&remote, terminal, true).await?,
        Command::Disable => set_enabled(&remote, terminal, false).await?,

        Command::Test { url, resource_type } => {
            let request = Request::ResolveUrl {
                url: url.clone(),
                resource_type,
            };
            match remote.send(request).await? {
                ResponseBody::Resolution { resolution } => {
                    terminal.print_resolution(&url, &resolution)?
                }
                other => bail!("unexpected reply to RESOLVE_URL: {other:?}"),
            }
        }
    }
    Ok(())
}

async fn set_enabled(remote: &Remote, terminal: &Terminal, enabled: bool) -> Result<()> {
    remote.send(Request::SetEnabled { enabled }).await?;
    let word = if enabled { "enabled" } else { "disabled" };
    terminal.print_success(&format!("Redirection {word}."))
}

fn draft_from_args(args: RuleArgs) -> RuleDraft {
    let kind = RuleType::from(args.kind);
    let (to, regex_substitution) = match kind {
        RuleType::Regex => (None, Some(args.to)),
        RuleType::Wildcard => (Some(args.to), None),
    };
    RuleDraft {
        name: args.name,
        from: args.from,
        kind,
        to,
        regex_substitution,
        enabled: Some(!args.disabled),
        priority: args.priority,
        resource_types: args.resource_types,
    }
}

/// Merge the edit onto the current rule, validate the result, and build the
/// patch from the normalized values.
fn checked_patch(current: &Rule, fields: EditArgs) -> Result<RulePatch> {
    let kind = fields.kind.map(RuleType::from).unwrap_or(current.kind);
    let mut merged = current.to_draft();
    merged.kind = kind;
    if let Some(name) = &fields.name {
        merged.name = name.clone();
    }
    if let Some(from) = &fields.from {
        merged.from = from.clone();
    }
    if let Some(target) = &fields.to {
        match kind {
            RuleType::Regex => merged.regex_substitution = Some(target.clone()),
            RuleType::Wildcard => merged.to = Some(target.clone()),
        }
    }
    validate_draft(&mut merged).map_err(|e| anyhow!(e))?;

    let mut patch = RulePatch::new(current.id);
    patch.name = fields.name;
    patch.kind = fields.kind.map(RuleType::from);
    patch.priority = fields.priority;
    patch.resource_types = fields.resource_types;
    if fields.from.is_some() || fields.kind.is_some() {
        patch.from = Some(merged.from);
    }
    if fields.to.is_some() || fields.kind.is_some() {
        patch.to = merged.to;
        patch.regex_substitution = merged.regex_substitution;
    }
    Ok(patch)
}

/// Validate every imported draft; the whole file is refused on the first bad
/// entry so nothing is sent.
fn checked_import(drafts: Vec<RuleDraft>) -> Result<Vec<RuleDraft>> {
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, mut draft)| {
            validate_draft(&mut draft)
                .map_err(|e| anyhow!("entry {} ({:?}): {e}", index + 1, draft.name))?;
            Ok(draft)
        })
        .collect()
}

fn default_export_path() -> PathBuf {
    PathBuf::from(format!(
        "rerouter-rules-{}.json",
        chrono::Utc::now().timestamp_millis()
    ))
}
