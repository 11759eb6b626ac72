//! User-facing surface: how turns, notices and prompts reach the terminal.

use anyhow::Result;
use dialoguer::{Input, theme::ColorfulTheme};

use crate::transcript::{Role, Turn};

/// Typed instead of a message to end the session
pub const QUIT_COMMAND: &str = "/quit";

pub trait Surface {
    fn show_turn(&mut self, turn: &Turn);
    fn show_notice(&mut self, message: &str);
    fn show_error(&mut self, message: &str);
    /// Next user message, or `None` when the user is done
    fn read_input(&mut self) -> Result<Option<String>>;
}

/// `[2024-11-05 10:00:05] Write about climate change`
pub fn format_turn(turn: &Turn) -> String {
    format!(
        "[{}] {}",
        turn.timestamp.as_deref().unwrap_or(""),
        turn.content
    )
}

fn role_colour(role: Role) -> &'static str {
    match role {
        Role::User => "\x1b[36m",
        Role::Assistant => "\x1b[35m",
        Role::System => "\x1b[2m",
    }
}

/// Interactive stdin/stdout chat
pub struct TerminalSurface {
    theme: ColorfulTheme,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for TerminalSurface {
    fn show_turn(&mut self, turn: &Turn) {
        if turn.role == Role::System {
            return;
        }
        println!(
            "{}{}\x1b[0m {}",
            role_colour(turn.role),
            turn.role.display_name(),
            format_turn(turn)
        );
        println!();
    }

    fn show_notice(&mut self, message: &str) {
        println!("\x1b[32m{message}\x1b[0m");
    }

    fn show_error(&mut self, message: &str) {
        eprintln!("\x1b[31merror: {message}\x1b[0m");
    }

    fn read_input(&mut self) -> Result<Option<String>> {
        let line = match Input::<String>::with_theme(&self.theme)
            .with_prompt("Message")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            // stdin closed
            Err(dialoguer::Error::IO(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        if line.trim() == QUIT_COMMAND {
            return Ok(None);
        }
        Ok(Some(line))
    }
}
