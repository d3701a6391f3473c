//! Slash-command parsing.
//!
//! A prompt that starts with the command prefix carries a command name as
//! its first whitespace-delimited token. The rest of the prompt (after the
//! name and exactly one separator character) is the residual prompt that is
//! sent onward.
//!
//! ```rust
//! use rag_chat_core::command::{parse, Command};
//!
//! assert_eq!(parse("/source find gaussians"), ("find gaussians".to_string(), Command::Source));
//! assert_eq!(parse("hello"), ("hello".to_string(), Command::None));
//! ```

/// Default command prefix character.
pub const DEFAULT_PREFIX: char = '/';

/// Response returned for the `reset` command.
pub const RESET_CONFIRMATION: &str = "History reset.";

/// Control command derived from one user prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain prompt, no command.
    None,
    /// Answer, then list where the supporting chunks come from.
    Source,
    /// Forget the session history.
    Reset,
    /// Only list where matching chunks come from; no answer.
    Find,
    /// Print the command list.
    Help,
    /// Answer with a more detailed, step-by-step explanation.
    Explain,
    /// Anything else after the prefix.
    Unrecognized(String),
}

impl Command {
    /// Map a command name (prefix already stripped) to its variant.
    ///
    /// Matching is case-sensitive.
    pub fn from_name(name: &str) -> Self {
        match name {
            "source" => Command::Source,
            "reset" => Command::Reset,
            "find" => Command::Find,
            "help" => Command::Help,
            "explain" => Command::Explain,
            other => Command::Unrecognized(other.to_string()),
        }
    }

    /// Static help text listing every command, rendered with `prefix`.
    pub fn help_text(prefix: char) -> String {
        let rows = [
            ("source", "answer, then list the document and line each source chunk comes from"),
            ("find", "list where the chunks matching the prompt come from, without answering"),
            ("explain", "answer with a detailed, step-by-step explanation"),
            ("reset", "forget the conversation history"),
            ("help", "show this message"),
        ];
        let mut out = String::from("Available commands:\n");
        for (name, what) in rows {
            out.push_str(&format!("  {}{} <prompt> - {}\n", prefix, name, what));
        }
        out.push_str("Any other prompt is answered using the document collection.");
        out
    }
}

/// Parse `raw` with the default `/` prefix.
pub fn parse(raw: &str) -> (String, Command) {
    parse_with_prefix(raw, DEFAULT_PREFIX)
}

/// Split a raw prompt into `(residual_prompt, command)`.
///
/// Without a leading `prefix` the prompt is returned unchanged with
/// [`Command::None`]. Otherwise the name runs up to the first whitespace
/// character; exactly one character after it is dropped and the remainder
/// is returned as-is.
pub fn parse_with_prefix(raw: &str, prefix: char) -> (String, Command) {
    let Some(rest) = raw.strip_prefix(prefix) else {
        return (raw.to_string(), Command::None);
    };

    let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (name, tail) = rest.split_at(name_end);

    let mut tail = tail.chars();
    tail.next();

    (tail.as_str().to_string(), Command::from_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prompt_is_untouched() {
        assert_eq!(parse("hello"), ("hello".to_string(), Command::None));
        assert_eq!(parse("  /not a command"), ("  /not a command".to_string(), Command::None));
    }

    #[test]
    fn known_command_strips_name_and_one_separator() {
        assert_eq!(
            parse("/source find gaussians"),
            ("find gaussians".to_string(), Command::Source)
        );
        assert_eq!(parse("/explain  two spaces"), (" two spaces".to_string(), Command::Explain));
    }

    #[test]
    fn unknown_command_keeps_its_name() {
        assert_eq!(
            parse("/bogus x"),
            ("x".to_string(), Command::Unrecognized("bogus".to_string()))
        );
    }

    #[test]
    fn bare_command_yields_empty_prompt() {
        assert_eq!(parse("/reset"), (String::new(), Command::Reset));
        assert_eq!(parse("/help"), (String::new(), Command::Help));
    }

    #[test]
    fn lone_prefix_is_unrecognized_empty_name() {
        assert_eq!(parse("/"), (String::new(), Command::Unrecognized(String::new())));
    }

    #[test]
    fn newline_separates_name() {
        assert_eq!(parse("/find\nlemma 3"), ("lemma 3".to_string(), Command::Find));
    }

    #[test]
    fn names_are_case_sensitive() {
        assert_eq!(
            parse("/Source x").1,
            Command::Unrecognized("Source".to_string())
        );
    }

    #[test]
    fn custom_prefix() {
        assert_eq!(parse_with_prefix("!find x", '!'), ("x".to_string(), Command::Find));
        assert_eq!(parse_with_prefix("/find x", '!').1, Command::None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = Command::help_text('/');
        for name in ["/source", "/find", "/explain", "/reset", "/help"] {
            assert!(help.contains(name), "missing {name}");
        }
    }
}
