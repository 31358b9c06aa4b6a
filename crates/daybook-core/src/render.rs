use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Local, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datemask::{self, DEADLINE_PLACEHOLDER};
use crate::entity::{Debt, EntityId, EntityKind, Task, UserId};
use crate::form::{Form, FormFlags};
use crate::notify::{Notice, NoticeLevel};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_table(&mut self, tasks: &[Task], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Title".to_string(),
            "Deadline".to_string(),
            "Done".to_string(),
            "Subtasks".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let id = self.paint(&task.id.to_string(), "33");
            let deadline = self.deadline_cell(&task.deadline, now);
            let done = if task.completed {
                self.paint("yes", "32")
            } else {
                String::new()
            };
            let finished = task.subtasks.iter().filter(|sub| sub.completed).count();
            let subtasks = if task.subtasks.is_empty() {
                String::new()
            } else {
                format!("{finished}/{}", task.subtasks.len())
            };

            rows.push(vec![id, task.title.clone(), deadline, done, subtasks]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, debts, now))]
    pub fn print_debt_table(&mut self, debts: &[Debt], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Receiver".to_string(),
            "Currency".to_string(),
            "Deadline".to_string(),
            "Paid".to_string(),
        ];

        let mut rows = Vec::with_capacity(debts.len());

        for debt in debts {
            let id = self.paint(&debt.id.to_string(), "33");
            let deadline = self.deadline_cell(&debt.deadline, now);
            let paid = if debt.paid {
                self.paint("yes", "32")
            } else {
                String::new()
            };

            rows.push(vec![
                id,
                debt.title.clone(),
                debt.currency.clone(),
                deadline,
                paid,
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "owner     {}", owner_display(task.owner))?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(out, "desc      {}", task.description)?;
        writeln!(out, "start     {}", start_display(task.start))?;
        writeln!(out, "deadline  {}", blank_dash(&task.deadline))?;
        writeln!(out, "done      {}", yes_no(task.completed))?;

        if !task.subtasks.is_empty() {
            writeln!(out, "subtasks")?;
            for (idx, sub) in task.subtasks.iter().enumerate() {
                let mark = if sub.completed { "x" } else { " " };
                writeln!(out, "  {}. [{mark}] {}", idx + 1, sub.text)?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, debt))]
    pub fn print_debt_info(&mut self, debt: &Debt) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", debt.id)?;
        writeln!(out, "owner     {}", owner_display(debt.owner))?;
        writeln!(out, "receiver  {}", debt.title)?;
        writeln!(out, "currency  {}", debt.currency)?;
        writeln!(out, "start     {}", start_display(debt.start))?;
        writeln!(out, "deadline  {}", blank_dash(&debt.deadline))?;
        writeln!(out, "paid      {}", yes_no(debt.paid))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, form))]
    pub fn print_task_form(&mut self, form: &Form<Task>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let draft = form.draft();
        let flags = form.flags();

        writeln!(out, "{}", form_heading(EntityKind::Task, draft.id, &flags))?;
        writeln!(out, "title     {}", draft.title)?;
        writeln!(out, "desc      {}", draft.description)?;
        writeln!(out, "deadline  {}", deadline_field(&draft.deadline))?;
        writeln!(out, "done      {}", yes_no(draft.completed))?;

        if !draft.subtasks.is_empty() {
            writeln!(out, "subtasks")?;
            for (idx, sub) in draft.subtasks.iter().enumerate() {
                let mark = if sub.completed { "x" } else { " " };
                writeln!(out, "  {}. [{mark}] {}", idx + 1, sub.text)?;
            }
        }

        writeln!(out, "action    {}", status_line(&flags))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, form))]
    pub fn print_debt_form(&mut self, form: &Form<Debt>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let draft = form.draft();
        let flags = form.flags();

        writeln!(out, "{}", form_heading(EntityKind::Debt, draft.id, &flags))?;
        writeln!(out, "receiver  {}", draft.title)?;
        writeln!(out, "currency  {}", draft.currency)?;
        writeln!(out, "deadline  {}", deadline_field(&draft.deadline))?;
        writeln!(out, "paid      {}", yes_no(draft.paid))?;
        writeln!(out, "action    {}", status_line(&flags))?;
        Ok(())
    }

    pub fn print_notice(&mut self, notice: &Notice) {
        let code = match notice.level {
            NoticeLevel::Success => "32",
            NoticeLevel::Error => "31",
        };
        println!("{}", self.paint(&notice.message, code));
    }

    fn deadline_cell(&self, deadline: &str, now: DateTime<Utc>) -> String {
        if let Some(date) = datemask::parse_deadline(deadline)
            && date < now.with_timezone(&Local).date_naive()
        {
            return self.paint(deadline, "31");
        }
        deadline.to_string()
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn form_heading(kind: EntityKind, id: EntityId, flags: &FormFlags) -> String {
    if flags.edit_mode {
        format!("{} form (editing {id})", kind.label())
    } else {
        format!("{} form (new)", kind.label())
    }
}

fn status_line(flags: &FormFlags) -> String {
    let label = match (flags.busy, flags.edit_mode) {
        (true, true) => "Updating…",
        (true, false) => "Saving…",
        (false, true) => "Update",
        (false, false) => "Save",
    };
    if flags.dirty && !flags.busy {
        format!("{label} (unsaved changes)")
    } else {
        label.to_string()
    }
}

fn deadline_field(deadline: &str) -> &str {
    if deadline.is_empty() {
        DEADLINE_PLACEHOLDER
    } else {
        deadline
    }
}

fn blank_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn owner_display(owner: Option<UserId>) -> String {
    owner
        .map(|user| user.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn start_display(start: Option<DateTime<Utc>>) -> String {
    start
        .map(|ts| ts.format("%Y%m%dT%H%M%SZ").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
