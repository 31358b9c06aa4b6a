use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::entity::EntityKind;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "daybook",
    version,
    about = "Daybook: personal task and debt ledger",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "daybookrc")]
    pub daybookrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[derive(Debug, Clone)]
pub enum Invocation {
    Entity {
        kind: EntityKind,
        command: String,
        args: Vec<String>,
    },
    User,
    Help,
    Version,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let mut tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        if tokens.is_empty() {
            let cmd = cfg
                .get("default.command")
                .unwrap_or_else(|| "task list".to_string());
            debug!(command = %cmd, "no explicit command, using default");
            tokens = cmd.split_whitespace().map(|tok| tok.to_string()).collect();
        }

        let Some(head) = tokens.first() else {
            return Ok(Self::Help);
        };

        let known = crate::commands::known_command_names();
        let full = crate::commands::expand_command_abbrev(head, &known)
            .ok_or_else(|| anyhow!("unknown command: {head}"))?;
        debug!(token = %head, expanded = %full, "resolved command token");

        let kind = match full {
            "task" => EntityKind::Task,
            "debt" => EntityKind::Debt,
            "user" => {
                if tokens.len() > 1 {
                    warn!(args = ?&tokens[1..], "user command ignores arguments");
                }
                return Ok(Self::User);
            }
            "help" => return Ok(Self::Help),
            "version" => return Ok(Self::Version),
            other => return Err(anyhow!("unknown command: {other}")),
        };

        let Some(sub) = tokens.get(1) else {
            return Ok(Self::Entity {
                kind,
                command: "list".to_string(),
                args: vec![],
            });
        };

        if sub.parse::<i64>().is_ok() {
            debug!(token = %sub, "numeric token interpreted as show query");
            return Ok(Self::Entity {
                kind,
                command: "show".to_string(),
                args: tokens[1..].to_vec(),
            });
        }

        let entity_known = crate::commands::entity_command_names();
        let command = crate::commands::expand_command_abbrev(sub, &entity_known)
            .ok_or_else(|| anyhow!("unknown {kind} command: {sub}"))?;
        debug!(token = %sub, expanded = %command, "resolved entity command token");

        Ok(Self::Entity {
            kind,
            command: command.to_string(),
            args: tokens[2..].to_vec(),
        })
    }
}
