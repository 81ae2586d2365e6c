use anyhow::Result;
use cliclack::{input, spinner};
use console::style;
use fibreflow::agent::Agent;

use crate::render::{print_reply, Theme};

/// What the user asked for at the prompt
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Message(String),
    Reset,
    ToggleTheme,
    Help,
    Exit,
    Empty,
}

impl Input {
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() {
            return Input::Empty;
        }
        if text.eq_ignore_ascii_case("/exit") || text.eq_ignore_ascii_case("/quit") {
            Input::Exit
        } else if text.eq_ignore_ascii_case("/reset") {
            Input::Reset
        } else if text.eq_ignore_ascii_case("/t") {
            Input::ToggleTheme
        } else if text.eq_ignore_ascii_case("/?") {
            Input::Help
        } else {
            Input::Message(text.to_string())
        }
    }
}

/// Interactive chat against a single agent
pub struct ChatSession {
    agent: Agent,
    max_turns: usize,
    theme: Theme,
}

impl ChatSession {
    pub fn new(agent: Agent, max_turns: usize) -> Self {
        Self {
            agent,
            max_turns,
            theme: Theme::Dark,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        cliclack::intro(style(format!(" {} ", self.agent.name())).on_cyan().black())?;

        loop {
            let raw: String = match input("Message:  [Help: /?]").placeholder("").interact() {
                Ok(raw) => raw,
                // Ctrl+C or Esc at the prompt
                Err(_) => break,
            };

            match Input::parse(&raw) {
                Input::Exit => break,
                Input::Empty => continue,
                Input::Help => print_help(),
                Input::Reset => {
                    self.agent.reset();
                    println!("{}", style("Conversation cleared").dim());
                }
                Input::ToggleTheme => {
                    self.theme = self.theme.toggle();
                    println!("Switched to {:?} theme", self.theme);
                }
                Input::Message(message) => self.send(&message).await?,
            }
        }

        cliclack::outro("Session closed")?;
        Ok(())
    }

    async fn send(&mut self, message: &str) -> Result<()> {
        let busy = spinner();
        busy.start("awaiting reply...");

        let reply = tokio::select! {
            reply = self.agent.chat(message, self.max_turns) => reply,
            _ = tokio::signal::ctrl_c() => {
                busy.stop("interrupted");
                // The interrupted exchange may be half recorded
                self.agent.reset();
                println!("{}", style("Interrupted: conversation cleared").yellow());
                return Ok(());
            }
        };
        busy.stop("");

        match reply {
            Ok(reply) => {
                tracing::debug!(turns = reply.turns, tools = reply.tool_calls.len(), "reply");
                print_reply(&reply, self.theme)?;
            }
            Err(err) => eprintln!("{} {}", style("Error:").red().bold(), err),
        }
        Ok(())
    }
}

fn print_help() {
    println!("Commands:");
    println!("/exit - Exit the session");
    println!("/reset - Clear the conversation");
    println!("/t - Toggle Light/Dark theme");
    println!("/? - Display this help message");
    println!("Ctrl+C - Interrupt the current request and clear the conversation");
}
