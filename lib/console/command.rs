//! Parsing of operator input lines.

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Choice at the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    /// Show all connections.
    List,

    /// Close everything and exit.
    Exit,
}

/// Input at the connection list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingCommand {
    /// Go back to the menu.
    Back,

    /// Interact with the entry at this zero-based index.
    Select(usize),
}

/// Input while interacting with a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Return to the menu.
    Exit,

    /// Ask the peer to send a file.
    Download(String),

    /// Push a local file to the peer.
    Upload(String),

    /// Run a command on the peer.
    Shell(String),

    /// Nothing to do.
    Empty,
}

/// Operator input errors. All of them just re-prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Invalid option. Please choose 1 or 2.")]
    InvalidOption,

    #[error("Invalid connection number.")]
    InvalidSelection,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MenuCommand {
    /// Parse a menu line.
    pub fn parse(line: &str) -> Result<Self, InputError> {
        match line.trim().to_ascii_lowercase().as_str() {
            "1" | "list" => Ok(Self::List),
            "2" | "exit" => Ok(Self::Exit),
            _ => Err(InputError::InvalidOption),
        }
    }
}

impl ListingCommand {
    /// Parse a listing line. Entries are numbered from 1 on screen.
    pub fn parse(line: &str) -> Result<Self, InputError> {
        let line = line.trim();
        if line.eq_ignore_ascii_case("b") || line.eq_ignore_ascii_case("back") {
            return Ok(Self::Back);
        }
        match line.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(Self::Select(n - 1)),
            _ => Err(InputError::InvalidSelection),
        }
    }
}

impl SessionCommand {
    /// Parse a command line typed while interacting with a session.
    pub fn parse(line: &str) -> Self {
        if line.trim().eq_ignore_ascii_case("exit") {
            return Self::Exit;
        }
        if line.trim().is_empty() {
            return Self::Empty;
        }
        if let Some(path) = line.strip_prefix("download ") {
            return Self::Download(path.trim().to_string());
        }
        if let Some(path) = line.strip_prefix("upload ") {
            return Self::Upload(path.trim().to_string());
        }
        Self::Shell(line.to_string())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_parse() {
        assert_eq!(MenuCommand::parse("1"), Ok(MenuCommand::List));
        assert_eq!(MenuCommand::parse(" 2 "), Ok(MenuCommand::Exit));
        assert_eq!(MenuCommand::parse("EXIT"), Ok(MenuCommand::Exit));
        assert_eq!(MenuCommand::parse("3"), Err(InputError::InvalidOption));
        assert_eq!(MenuCommand::parse(""), Err(InputError::InvalidOption));
    }

    #[test]
    fn test_listing_parse() {
        assert_eq!(ListingCommand::parse("b"), Ok(ListingCommand::Back));
        assert_eq!(ListingCommand::parse("B"), Ok(ListingCommand::Back));
        assert_eq!(ListingCommand::parse("1"), Ok(ListingCommand::Select(0)));
        assert_eq!(ListingCommand::parse(" 12"), Ok(ListingCommand::Select(11)));
        assert_eq!(ListingCommand::parse("0"), Err(InputError::InvalidSelection));
        assert_eq!(ListingCommand::parse("-1"), Err(InputError::InvalidSelection));
        assert_eq!(ListingCommand::parse("x"), Err(InputError::InvalidSelection));
    }

    #[test]
    fn test_session_parse() {
        assert_eq!(SessionCommand::parse("exit"), SessionCommand::Exit);
        assert_eq!(SessionCommand::parse("  Exit "), SessionCommand::Exit);
        assert_eq!(SessionCommand::parse("   "), SessionCommand::Empty);
        assert_eq!(
            SessionCommand::parse("download notes.txt"),
            SessionCommand::Download("notes.txt".into())
        );
        assert_eq!(
            SessionCommand::parse("upload  ./tool.bin "),
            SessionCommand::Upload("./tool.bin".into())
        );
        assert_eq!(
            SessionCommand::parse("ls -la /tmp"),
            SessionCommand::Shell("ls -la /tmp".into())
        );
        // Without an argument these are ordinary shell commands.
        assert_eq!(
            SessionCommand::parse("download"),
            SessionCommand::Shell("download".into())
        );
    }
}
