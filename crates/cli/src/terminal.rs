use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use rerouter_bridge::Resolution;
use rerouter_core::Rule;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const ID: Color = Color::Magenta;
    const ON: Color = Color::Green;
    const OFF: Color = Color::DarkGrey;
    const TARGET: Color = Color::Cyan;
    const SUCCESS: Color = Color::Green;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
}

/// Formats command results for the terminal.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// One line per rule: id, state, name, type, pattern and target.
    pub fn print_rules(&self, rules: &[Rule]) -> Result<()> {
        if rules.is_empty() {
            return self.print_info("No rules yet.");
        }

        let mut stdout = io::stdout();
        for rule in rules {
            let (state, state_color) = if rule.enabled {
                ("on ", Colors::ON)
            } else {
                ("off", Colors::OFF)
            };
            execute!(
                stdout,
                SetForegroundColor(Colors::ID),
                Print(format!("{:>4} ", rule.id)),
                SetForegroundColor(state_color),
                Print(format!("[{state}] ")),
                ResetColor,
                Print(format!("{} ({}, p{})\n", rule.name, rule.kind, rule.priority)),
                SetForegroundColor(Colors::DIM),
                Print(format!("       {}", rule.from)),
                ResetColor,
                Print(" -> "),
                SetForegroundColor(Colors::TARGET),
                Print(rule.target().unwrap_or("<none>")),
                ResetColor,
                Print("\n"),
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    pub fn print_resolution(&self, url: &str, resolution: &Resolution) -> Result<()> {
        match (&resolution.rule_id, &resolution.url) {
            (Some(id), Some(target)) => {
                let mut stdout = io::stdout();
                execute!(
                    stdout,
                    Print(format!("{url}\n  -> ")),
                    SetForegroundColor(Colors::TARGET),
                    Print(target),
                    ResetColor,
                    SetForegroundColor(Colors::DIM),
                    Print(format!("  (rule {id})\n")),
                    ResetColor,
                )?;
                stdout.flush()?;
                Ok(())
            }
            _ => self.print_info(&format!("{url} is not redirected.")),
        }
    }

    pub fn print_success(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::SUCCESS),
            Print(format!("{msg}\n")),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{msg}\n")),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::ERROR),
            Print(format!("error: {msg}\n")),
            ResetColor,
        )?;
        stderr.flush()?;
        Ok(())
    }

    /// Ask a yes/no question; anything but `y`/`yes` is a no.
    pub fn confirm(&self, question: &str) -> Result<bool> {
        let mut stdout = io::stdout();
        execute!(stdout, Print(format!("{question} [y/N] ")))?;
        stdout.flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}
