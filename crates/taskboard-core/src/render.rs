use std::io::{self, IsTerminal, Write};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::board::Column;
use crate::config::Config;
use crate::task::{Status, Task};

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    column_width: usize,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color").unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            column_width: cfg.column_width()?,
        })
    }

    #[tracing::instrument(skip_all)]
    pub fn print_board(&mut self, columns: &[Column]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_board(&mut out, columns)
    }

    pub fn print_task(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", self.task_line(task))?;
        Ok(())
    }

    pub fn print_message(&mut self, message: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{message}")?;
        Ok(())
    }

    fn task_line(&self, task: &Task) -> String {
        let mut line = format!(
            "{} {} {}",
            self.paint(task.id.as_str(), "33"),
            self.paint(&format!("[{}]", task.status), status_color(task.status)),
            task.title
        );
        if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
            line.push_str(": ");
            line.push_str(description);
        }
        line
    }

    fn write_board<W: Write>(&self, mut writer: W, columns: &[Column]) -> anyhow::Result<()> {
        let width = self.column_width;

        let headers: Vec<String> = columns
            .iter()
            .map(|column| {
                let text = truncate(
                    &format!("{} ({})", column.status.title(), column.tasks.len()),
                    width,
                );
                pad(&self.paint(&text, status_color(column.status)), &text, width)
            })
            .collect();
        writeln!(writer, "{}", headers.join(" | ").trim_end())?;

        let rule: Vec<String> = columns.iter().map(|_| "-".repeat(width)).collect();
        writeln!(writer, "{}", rule.join("-+-"))?;

        let depth = columns
            .iter()
            .map(|column| column.tasks.len())
            .max()
            .unwrap_or(0);

        for row in 0..depth {
            let mut cells: Vec<Option<String>> = columns
                .iter()
                .map(|column| {
                    column.tasks.get(row).map(|task| {
                        let id = short_id(task.id.as_str());
                        let title_width = width.saturating_sub(UnicodeWidthStr::width(id) + 1);
                        let title = truncate(&task.title, title_width);
                        let visible = format!("{id} {title}");
                        pad(
                            &format!("{} {title}", self.paint(id, "33")),
                            &visible,
                            width,
                        )
                    })
                })
                .collect();
            // Empty trailing columns would leave dangling separators.
            while cells.last().is_some_and(Option::is_none) {
                cells.pop();
            }
            let line = cells
                .into_iter()
                .map(|cell| cell.unwrap_or_else(|| " ".repeat(width)))
                .collect::<Vec<_>>()
                .join(" | ");
            writeln!(writer, "{}", line.trim_end())?;
        }

        if depth == 0 {
            writeln!(writer, "(no tasks)")?;
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn status_color(status: Status) -> &'static str {
    match status {
        Status::Todo => "34",
        Status::InProgress => "33",
        Status::Done => "32",
    }
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Pads `rendered` to `width` using the display width of `visible`, which is
/// the same text without colour codes.
fn pad(rendered: &str, visible: &str, width: usize) -> String {
    let padding = width.saturating_sub(UnicodeWidthStr::width(visible));
    format!("{rendered}{}", " ".repeat(padding))
}

fn truncate(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + ch_width > width - 1 {
            break;
        }
        used += ch_width;
        out.push(ch);
    }
    out.push('…');
    out
}
