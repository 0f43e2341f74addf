use std::str::FromStr;

use thiserror::Error;

use crate::domain::entities::{ContentFamily, EmbedStyle};

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Plain text posted as a chat message.
    Message(String),
    /// Re-evaluate every embed against the current settings.
    Regenerate,
    /// Re-apply presentation to live embeds.
    Refresh,
    /// Flip one family switch.
    Toggle(ContentFamily),
    /// Set the maximum image width.
    Width(u32),
    /// Set the maximum image height.
    Height(u32),
    /// Switch the embed style.
    Style(EmbedStyle),
    /// Replace the feed container, as a host re-render would.
    Rerender,
    /// Print cache and controller counters.
    Stats,
    /// Print the command list.
    Help,
    /// Leave.
    Quit,
}

/// Why a slash command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command name is not known.
    #[error("unknown command /{0}, try /help")]
    Unknown(String),

    /// A required argument is absent.
    #[error("/{command} needs {expected}")]
    MissingArgument {
        /// Command name.
        command: &'static str,
        /// What was expected.
        expected: &'static str,
    },

    /// An argument did not parse.
    #[error("/{command}: {message}")]
    InvalidArgument {
        /// Command name.
        command: &'static str,
        /// Parse failure.
        message: String,
    },
}

/// Help text listing every command.
pub const HELP: &str = "\
/regen            re-evaluate embeds against current settings
/refresh          re-apply style and image bounds
/toggle <family>  flip youtube|twitch|discord|steam|gamesplanet|meta|image|default
/width <px>       max image width (100-800)
/height <px>      max image height (100-600)
/style <name>     dark-glass|light-glass
/rerender         replace the chat container
/stats            cache and embed counters
/quit             exit
anything else is posted as a chat message";

fn argument<T>(
    command: &'static str,
    expected: &'static str,
    raw: Option<&str>,
) -> Result<T, CommandError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw.ok_or(CommandError::MissingArgument { command, expected })?;
    raw.parse().map_err(|e: T::Err| CommandError::InvalidArgument {
        command,
        message: e.to_string(),
    })
}

impl FromStr for ConsoleCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Message(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();
        match name.as_str() {
            "regen" | "regenerate" => Ok(Self::Regenerate),
            "refresh" => Ok(Self::Refresh),
            "toggle" => argument("toggle", "a family", arg).map(Self::Toggle),
            "width" => argument("width", "a pixel count", arg).map(Self::Width),
            "height" => argument("height", "a pixel count", arg).map(Self::Height),
            "style" => argument("style", "a style name", arg).map(Self::Style),
            "rerender" => Ok(Self::Rerender),
            "stats" => Ok(Self::Stats),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            _ => Err(CommandError::Unknown(name)),
        }
    }
}
