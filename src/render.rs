use std::io::{self, Write};

use logsaw_logs::{ChangeReason, EventContainer, Rgb, RuleColorizer, StructureChange};
use logsaw_types::LogEvent;

/// Turns one table row into output
pub trait RowRenderer {
    fn render_row(&self, event: &LogEvent, out: &mut dyn Write) -> io::Result<()>;
}

/// One line per event, stack frames indented below it
pub struct TextRenderer {
    colorizer: Option<RuleColorizer>,
}

impl TextRenderer {
    pub fn plain() -> Self {
        Self { colorizer: None }
    }

    /// Paint rows with the colorizer's 24-bit ANSI colours
    pub fn colored(colorizer: RuleColorizer) -> Self {
        Self {
            colorizer: Some(colorizer),
        }
    }

    fn format_line(event: &LogEvent) -> String {
        let timestamp = event
            .datetime()
            .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
            .unwrap_or_else(|| event.timestamp.to_string());

        let mut line = format!("{} {:<5} ", timestamp, event.level.as_str());
        if !event.thread_name.is_empty() {
            line.push_str(&format!("[{}] ", event.thread_name));
        }
        line.push_str(&event.logger_name);
        if let Some(ndc) = &event.ndc {
            line.push_str(&format!(" {{{}}}", ndc));
        }
        line.push_str(" - ");
        line.push_str(&event.message);

        let properties = event.properties_text();
        if !properties.is_empty() {
            line.push_str(&format!(" ({})", properties));
        }
        line
    }
}

fn ansi_prefix(foreground: Option<Rgb>, background: Option<Rgb>) -> String {
    let mut prefix = String::new();
    if let Some(Rgb(r, g, b)) = foreground {
        prefix.push_str(&format!("\x1b[38;2;{};{};{}m", r, g, b));
    }
    if let Some(Rgb(r, g, b)) = background {
        prefix.push_str(&format!("\x1b[48;2;{};{};{}m", r, g, b));
    }
    prefix
}

impl RowRenderer for TextRenderer {
    fn render_row(&self, event: &LogEvent, out: &mut dyn Write) -> io::Result<()> {
        let line = Self::format_line(event);
        let prefix = self
            .colorizer
            .as_ref()
            .map(|c| ansi_prefix(c.foreground(event), c.background(event)))
            .unwrap_or_default();

        if prefix.is_empty() {
            writeln!(out, "{}", line)?;
        } else {
            writeln!(out, "{}{}\x1b[0m", prefix, line)?;
        }

        for frame in event.throwable.iter().flatten() {
            writeln!(out, "    {}", frame)?;
        }
        Ok(())
    }
}

/// Prints rows of a container as they become visible, like `tail -f`.
///
/// Rows are tracked by synthetic id, so eviction and re-sorting do not cause
/// rows to be printed twice.
pub struct TailView<R> {
    container: EventContainer,
    renderer: R,
    last_id: u64,
}

impl<R: RowRenderer> TailView<R> {
    pub fn new(container: EventContainer, renderer: R) -> Self {
        Self {
            container,
            renderer,
            last_id: 0,
        }
    }

    /// Print visible rows added since the previous call, in table order
    pub fn print_new(&mut self, out: &mut dyn Write) -> io::Result<usize> {
        let fresh: Vec<_> = self
            .container
            .filtered_events()
            .into_iter()
            .filter(|event| event.id().is_some_and(|id| id > self.last_id))
            .collect();

        for event in &fresh {
            self.renderer.render_row(event, out)?;
            self.last_id = self.last_id.max(event.id().unwrap_or_default());
        }
        out.flush()?;
        Ok(fresh.len())
    }

    /// Print every visible row again, e.g. after a clear or a sort
    pub fn reprint(&mut self, out: &mut dyn Write) -> io::Result<usize> {
        self.last_id = 0;
        self.print_new(out)
    }

    /// React to a structural change: a new rule, sort or clear redraws the
    /// table, anything else is picked up by the next `print_new`
    pub fn apply(&mut self, change: &StructureChange, out: &mut dyn Write) -> io::Result<usize> {
        match change {
            StructureChange::DataChanged(
                ChangeReason::RuleChanged | ChangeReason::Sorted | ChangeReason::Cleared,
            ) => self.reprint(out),
            _ => Ok(0),
        }
    }
}
