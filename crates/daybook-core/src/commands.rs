use std::io::{self, Write};

use anyhow::{Context, anyhow};
use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, instrument};

use crate::backend::Backend;
use crate::cascade::CascadeAction;
use crate::cli::Invocation;
use crate::config::{self, Config};
use crate::datastore::DataStore;
use crate::datemask::{self, DEADLINE_LEN, DEADLINE_PLACEHOLDER};
use crate::entity::{Debt, DebtPatch, EntityId, EntityKind, Task, TaskPatch};
use crate::form::{Form, Selection};
use crate::notify::{Notice, Notifier};
use crate::persist::{self, PersistPolicy};
use crate::render::Renderer;

pub fn known_command_names() -> Vec<&'static str> {
    vec!["task", "debt", "user", "help", "version"]
}

pub fn entity_command_names() -> Vec<&'static str> {
    vec!["list", "show", "form"]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub async fn dispatch(
    store: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();

    debug!(invocation = ?inv, "dispatching command");

    match inv {
        Invocation::Entity {
            kind,
            command,
            args,
        } => match (kind, command.as_str()) {
            (EntityKind::Task, "list") => cmd_task_list(store, cfg, renderer, now).await,
            (EntityKind::Task, "show") => cmd_task_show(store, cfg, renderer, &args).await,
            (EntityKind::Task, "form") => cmd_task_form(store, cfg, renderer, &args).await,
            (EntityKind::Debt, "list") => cmd_debt_list(store, cfg, renderer, now).await,
            (EntityKind::Debt, "show") => cmd_debt_show(store, cfg, renderer, &args).await,
            (EntityKind::Debt, "form") => cmd_debt_form(store, cfg, renderer, &args).await,
            (kind, other) => Err(anyhow!("unknown {kind} command: {other}")),
        },
        Invocation::User => cmd_user(store, cfg),
        Invocation::Help => cmd_help(),
        Invocation::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[instrument(skip(store, cfg, renderer, now))]
async fn cmd_task_list(
    store: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    now: chrono::DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command task list");

    let user = config::resolve_user(cfg, &store.data_dir)?;
    let tasks: Vec<Task> = store.list(user).await?;
    debug!(count = tasks.len(), "listing tasks");
    renderer.print_task_table(&tasks, now)?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, now))]
async fn cmd_debt_list(
    store: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    now: chrono::DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command debt list");

    let user = config::resolve_user(cfg, &store.data_dir)?;
    let debts: Vec<Debt> = store.list(user).await?;
    debug!(count = debts.len(), "listing debts");
    renderer.print_debt_table(&debts, now)?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args))]
async fn cmd_task_show(
    store: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command task show");

    let id = parse_entity_id(args)?;
    let user = config::resolve_user(cfg, &store.data_dir)?;
    let tasks: Vec<Task> = store.list(user).await?;
    let task = tasks
        .iter()
        .find(|task| task.id == id)
        .ok_or_else(|| anyhow!("task {id} not found"))?;
    renderer.print_task_info(task)?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args))]
async fn cmd_debt_show(
    store: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command debt show");

    let id = parse_entity_id(args)?;
    let user = config::resolve_user(cfg, &store.data_dir)?;
    let debts: Vec<Debt> = store.list(user).await?;
    let debt = debts
        .iter()
        .find(|debt| debt.id == id)
        .ok_or_else(|| anyhow!("debt {id} not found"))?;
    renderer.print_debt_info(debt)?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args))]
async fn cmd_task_form(
    store: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command task form");

    let user = config::resolve_user(cfg, &store.data_dir)?;
    let policy = PersistPolicy {
        rollback_on_failure: cfg.get_bool("persistence.rollback").unwrap_or(false),
    };

    let mut selection: Selection<Task> = Selection::new();
    if !args.is_empty() {
        let id = parse_entity_id(args)?;
        let tasks: Vec<Task> = store.list(user).await?;
        let task = tasks
            .into_iter()
            .find(|task| task.id == id)
            .ok_or_else(|| anyhow!("task {id} not found"))?;
        selection.set(task);
    }

    let (notifier, mut notices) = Notifier::channel();
    let mut form = Form::open(&selection);
    renderer.print_task_form(&form)?;
    println!(
        "form commands: title, desc, deadline, sub add|edit|toggle|rm, save, complete, delete, reset, clear, show, quit"
    );

    loop {
        print!("task> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        let (word, rest) = split_first_word(line);

        match word {
            "title" => form.apply(TaskPatch {
                title: Some(rest.to_string()),
                ..Default::default()
            }),
            "desc" => form.apply(TaskPatch {
                description: Some(rest.to_string()),
                ..Default::default()
            }),
            "deadline" => {
                if let Some(value) = report(parse_deadline_input(rest)) {
                    form.apply(TaskPatch {
                        deadline: Some(value),
                        ..Default::default()
                    });
                }
            }
            "sub" => {
                if rest.is_empty() {
                    println!("error: sub requires add, edit, toggle or rm");
                } else if let Some(CascadeAction::Complete(flag)) =
                    report(apply_subtask_command(&mut form, rest))
                {
                    report(
                        persist::complete(
                            &mut form,
                            &mut selection,
                            store,
                            &notifier,
                            policy,
                            flag,
                        )
                        .await,
                    );
                }
            }
            "save" => {
                report(persist::save(&mut form, store, &notifier, policy, user, Utc::now()).await);
            }
            "complete" => {
                let flag = !form.draft().completed;
                report(
                    persist::complete(&mut form, &mut selection, store, &notifier, policy, flag)
                        .await,
                );
            }
            "delete" => {
                if report(persist::delete(&mut form, &mut selection, store, &notifier).await)
                    .is_some()
                {
                    break;
                }
            }
            "reset" => {
                report(form.reset());
            }
            "clear" => {
                report(form.clear(&mut selection));
            }
            "show" => renderer.print_task_form(&form)?,
            "quit" => break,
            other => println!("error: unknown form command: {other}"),
        }

        drain_notices(renderer, &mut notices);
    }

    drain_notices(renderer, &mut notices);
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args))]
async fn cmd_debt_form(
    store: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command debt form");

    let user = config::resolve_user(cfg, &store.data_dir)?;
    let policy = PersistPolicy {
        rollback_on_failure: cfg.get_bool("persistence.rollback").unwrap_or(false),
    };

    let mut selection: Selection<Debt> = Selection::new();
    if !args.is_empty() {
        let id = parse_entity_id(args)?;
        let debts: Vec<Debt> = store.list(user).await?;
        let debt = debts
            .into_iter()
            .find(|debt| debt.id == id)
            .ok_or_else(|| anyhow!("debt {id} not found"))?;
        selection.set(debt);
    }

    let (notifier, mut notices) = Notifier::channel();
    let mut form = Form::open(&selection);
    renderer.print_debt_form(&form)?;
    println!(
        "form commands: receiver, currency, deadline, save, paid, delete, reset, clear, show, quit"
    );

    loop {
        print!("debt> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        let (word, rest) = split_first_word(line);

        match word {
            "receiver" => form.apply(DebtPatch {
                title: Some(rest.to_string()),
                ..Default::default()
            }),
            "currency" => form.apply(DebtPatch {
                currency: Some(rest.to_string()),
                ..Default::default()
            }),
            "deadline" => {
                if let Some(value) = report(parse_deadline_input(rest)) {
                    form.apply(DebtPatch {
                        deadline: Some(value),
                        ..Default::default()
                    });
                }
            }
            "save" => {
                report(persist::save(&mut form, store, &notifier, policy, user, Utc::now()).await);
            }
            "paid" => {
                let flag = !form.draft().paid;
                report(
                    persist::complete(&mut form, &mut selection, store, &notifier, policy, flag)
                        .await,
                );
            }
            "delete" => {
                if report(persist::delete(&mut form, &mut selection, store, &notifier).await)
                    .is_some()
                {
                    break;
                }
            }
            "reset" => {
                report(form.reset());
            }
            "clear" => {
                report(form.clear(&mut selection));
            }
            "show" => renderer.print_debt_form(&form)?,
            "quit" => break,
            other => println!("error: unknown form command: {other}"),
        }

        drain_notices(renderer, &mut notices);
    }

    drain_notices(renderer, &mut notices);
    Ok(())
}

#[instrument(skip(store, cfg))]
fn cmd_user(store: &DataStore, cfg: &Config) -> anyhow::Result<()> {
    info!("command user");

    let user = config::resolve_user(cfg, &store.data_dir)?;
    println!("{user}");
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("usage: daybook [global options] <command> [args]");
    println!();
    println!("commands:");
    println!("  task list           list tasks for the current user");
    println!("  task show <id>      show one task");
    println!("  task form [id]      open the interactive task form");
    println!("  debt list           list debts for the current user");
    println!("  debt show <id>      show one debt");
    println!("  debt form [id]      open the interactive debt form");
    println!("  user                print the current user id");
    println!("  help                show this help");
    println!("  version             show the version");
    println!();
    println!("global options:");
    println!("  -v/--verbose -q/--quiet --rc KEY=VALUE --daybookrc FILE --data DIR");
    Ok(())
}

fn apply_subtask_command(form: &mut Form<Task>, rest: &str) -> anyhow::Result<CascadeAction> {
    let (op, tail) = split_first_word(rest);
    let action = match op {
        "add" => form.add_subtask(tail)?,
        "edit" => {
            let (idx_raw, text) = split_first_word(tail);
            form.edit_subtask(parse_index(idx_raw)?, text)?
        }
        "toggle" => form.toggle_subtask(parse_index(tail)?)?,
        "rm" => form.remove_subtask(parse_index(tail)?)?,
        other => return Err(anyhow!("unknown subtask command: {other}")),
    };
    Ok(action)
}

fn parse_deadline_input(rest: &str) -> anyhow::Result<String> {
    let value = rest.trim();
    if value.is_empty() {
        return Ok(DEADLINE_PLACEHOLDER.to_string());
    }
    if value.chars().count() > DEADLINE_LEN {
        return Err(anyhow!("deadline is longer than {DEADLINE_LEN} characters"));
    }
    if let Some((position, slot)) = datemask::first_reject(value) {
        return Err(anyhow!("deadline position {} expects {slot}", position + 1));
    }
    Ok(value.to_string())
}

fn parse_entity_id(args: &[String]) -> anyhow::Result<EntityId> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("an id argument is required"))?;
    raw.parse::<EntityId>()
        .with_context(|| format!("invalid id: {raw}"))
}

fn parse_index(raw: &str) -> anyhow::Result<usize> {
    let value: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid subtask number: {raw}"))?;
    if value == 0 {
        return Err(anyhow!("subtask numbers start at 1"));
    }
    Ok(value - 1)
}

fn split_first_word(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (line, ""),
    }
}

fn report<T, E: Into<anyhow::Error>>(result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            let err: anyhow::Error = err.into();
            println!("error: {err:#}");
            None
        }
    }
}

fn drain_notices(renderer: &mut Renderer, notices: &mut UnboundedReceiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        renderer.print_notice(&notice);
    }
}
