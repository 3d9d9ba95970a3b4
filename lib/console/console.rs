//! Operator console state machine.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::listener::EventSender;
use crate::protocol::Outbound;
use crate::session::{SessionId, SessionInfo, SessionRegistry};
use crate::transfer;
use crate::types::ListenerError;

use super::command::{InputError, ListingCommand, MenuCommand, SessionCommand};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const MENU_TEXT: &str = "Choose an option:\n1. Show all connections\n2. Exit";
const MENU_PROMPT: &str = "Enter option > ";
const LISTING_PROMPT: &str = "Enter connection number to interact or press B to go back > ";
const SESSION_PROMPT: &str = "Enter command or \"exit\" to go back > ";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Where the console currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleState {
    /// Main menu.
    Menu,

    /// Connection list. Holds the ids shown, in display order, as of entry.
    Listing(Vec<SessionId>),

    /// Sending commands to one session.
    Interacting { id: SessionId, peer: SocketAddr },

    /// Operator chose to exit.
    Exited,
}

/// Single operator console.
///
/// Each input line drives exactly one transition and ends with the prompt
/// for the resulting state, so nothing is sent to a peer without a prompt
/// round-trip. Replies from peers arrive on the event stream and are never
/// awaited here.
pub struct Console<W> {
    registry: Arc<SessionRegistry>,
    events: EventSender,
    state: ConsoleState,
    out: W,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<W: Write> Console<W> {
    /// Create a console in the menu state.
    pub fn new(registry: Arc<SessionRegistry>, events: EventSender, out: W) -> Self {
        Self {
            registry,
            events,
            state: ConsoleState::Menu,
            out,
        }
    }

    /// Current state.
    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    /// Output written so far.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Show the menu and process lines until the operator exits or input ends.
    pub async fn run(&mut self, input: &mut mpsc::Receiver<String>) -> io::Result<()> {
        self.show_menu()?;

        while self.state != ConsoleState::Exited {
            match input.recv().await {
                Some(line) => self.handle_line(&line).await?,
                None => {
                    tracing::debug!("Operator input ended, exiting");
                    self.state = ConsoleState::Exited;
                }
            }
        }

        Ok(())
    }

    /// Apply one line of operator input.
    pub async fn handle_line(&mut self, line: &str) -> io::Result<()> {
        match std::mem::replace(&mut self.state, ConsoleState::Menu) {
            ConsoleState::Menu => self.on_menu(line).await,
            ConsoleState::Listing(snapshot) => self.on_listing(line, snapshot).await,
            ConsoleState::Interacting { id, peer } => self.on_command(line, id, peer).await,
            ConsoleState::Exited => {
                self.state = ConsoleState::Exited;
                Ok(())
            }
        }
    }

    async fn on_menu(&mut self, line: &str) -> io::Result<()> {
        match MenuCommand::parse(line) {
            Ok(MenuCommand::List) => self.show_listing().await,
            Ok(MenuCommand::Exit) => {
                writeln!(self.out, "Exiting server...")?;
                self.out.flush()?;
                self.state = ConsoleState::Exited;
                Ok(())
            }
            Err(e) => {
                writeln!(self.out, "{}", e)?;
                self.show_menu()
            }
        }
    }

    async fn on_listing(&mut self, line: &str, snapshot: Vec<SessionId>) -> io::Result<()> {
        let selected = match ListingCommand::parse(line) {
            Ok(ListingCommand::Back) => return self.show_menu(),
            Ok(ListingCommand::Select(index)) => snapshot.get(index).copied(),
            Err(_) => None,
        };

        // The session may have disconnected since the list was drawn.
        let session = match selected {
            Some(id) => self.registry.get(id).await,
            None => None,
        };

        match session {
            Some(session) => {
                let (id, peer) = (session.id(), session.peer());
                writeln!(self.out, "Interacting with {}", peer)?;
                self.state = ConsoleState::Interacting { id, peer };
                self.prompt(SESSION_PROMPT)
            }
            None => {
                writeln!(self.out, "{}", InputError::InvalidSelection)?;
                self.show_listing().await
            }
        }
    }

    async fn on_command(&mut self, line: &str, id: SessionId, peer: SocketAddr) -> io::Result<()> {
        let command = SessionCommand::parse(line);
        if command == SessionCommand::Exit {
            return self.show_menu();
        }

        let session = match self.registry.require(id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(session_id = %id, "Command for vanished session: {}", e);
                writeln!(self.out, "[!] {} is no longer connected.", peer)?;
                return self.show_menu();
            }
        };

        let sent = match command {
            SessionCommand::Download(path) => session.send(Outbound::DownloadFile(path)),
            SessionCommand::Shell(text) => session.send(Outbound::ShellCommand(text)),
            SessionCommand::Upload(path) => {
                // Success and failure are both reported on the event stream.
                match transfer::send_file(&session, &path, &self.events).await {
                    Err(e @ ListenerError::SessionClosed(_)) => Err(e),
                    _ => Ok(()),
                }
            }
            SessionCommand::Empty | SessionCommand::Exit => Ok(()),
        };
        drop(session);

        if let Err(e) = sent {
            writeln!(self.out, "[!] {}: {}", peer, e)?;
            return self.show_menu();
        }

        self.state = ConsoleState::Interacting { id, peer };
        self.prompt(SESSION_PROMPT)
    }

    fn show_menu(&mut self) -> io::Result<()> {
        self.state = ConsoleState::Menu;
        writeln!(self.out, "{}", MENU_TEXT)?;
        self.prompt(MENU_PROMPT)
    }

    async fn show_listing(&mut self) -> io::Result<()> {
        let sessions = self.registry.list().await;
        if sessions.is_empty() {
            writeln!(self.out, "No active connections.")?;
            return self.show_menu();
        }

        writeln!(self.out, "Active connections:")?;
        for (index, info) in sessions.iter().enumerate() {
            writeln!(self.out, "{}", format_entry(index, info))?;
        }

        self.state = ConsoleState::Listing(sessions.iter().map(|s| s.session_id).collect());
        self.prompt(LISTING_PROMPT)
    }

    fn prompt(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "{}", text)?;
        self.out.flush()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn format_entry(index: usize, info: &SessionInfo) -> String {
    let mut line = format!(
        "{}. {}:{} (cwd: {})",
        index + 1,
        info.peer.ip(),
        info.peer.port(),
        info.context.display()
    );
    if info.transfer_in_progress {
        line.push_str(" [transfer]");
    }
    line
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::session::Session;

    struct Harness {
        console: Console<Vec<u8>>,
        registry: Arc<SessionRegistry>,
    }

    impl Harness {
        fn new() -> Self {
            let registry = Arc::new(SessionRegistry::new(10));
            let (events, _rx) = mpsc::unbounded_channel();
            Self {
                console: Console::new(registry.clone(), events, Vec::new()),
                registry,
            }
        }

        async fn add_session(&self, port: u16) -> (SessionId, mpsc::UnboundedReceiver<Outbound>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let session = Session::new(
                self.registry.next_id(),
                format!("10.1.1.1:{}", port).parse().unwrap(),
                PathBuf::from("/opt/listener"),
                tx,
            );
            let id = session.id();
            self.registry.register(Arc::new(session)).await.unwrap();
            (id, rx)
        }

        fn output(&self) -> String {
            String::from_utf8_lossy(self.console.output()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_invalid_menu_option_reprompts() {
        let mut h = Harness::new();
        h.console.handle_line("9").await.unwrap();
        assert_eq!(h.console.state(), &ConsoleState::Menu);
        assert!(h.output().contains("Invalid option. Please choose 1 or 2."));
    }

    #[tokio::test]
    async fn test_list_with_no_sessions_returns_to_menu() {
        let mut h = Harness::new();
        h.console.handle_line("1").await.unwrap();
        assert_eq!(h.console.state(), &ConsoleState::Menu);
        assert!(h.output().contains("No active connections."));
    }

    #[tokio::test]
    async fn test_listing_renders_snapshot() {
        let mut h = Harness::new();
        let (a, _rx_a) = h.add_session(4001).await;
        let (b, _rx_b) = h.add_session(4002).await;

        h.console.handle_line("1").await.unwrap();
        assert_eq!(h.console.state(), &ConsoleState::Listing(vec![a, b]));

        let out = h.output();
        assert!(out.contains("1. 10.1.1.1:4001 (cwd: /opt/listener)"));
        assert!(out.contains("2. 10.1.1.1:4002 (cwd: /opt/listener)"));
        assert!(out.ends_with(LISTING_PROMPT));
    }

    #[tokio::test]
    async fn test_listing_back() {
        let mut h = Harness::new();
        let _s = h.add_session(4001).await;
        h.console.handle_line("1").await.unwrap();
        h.console.handle_line("b").await.unwrap();
        assert_eq!(h.console.state(), &ConsoleState::Menu);
    }

    #[tokio::test]
    async fn test_stale_selection_stays_in_listing() {
        let mut h = Harness::new();
        let (a, _rx_a) = h.add_session(4001).await;
        let (b, _rx_b) = h.add_session(4002).await;

        h.console.handle_line("1").await.unwrap();
        h.registry.remove(a).await;

        h.console.handle_line("1").await.unwrap();
        assert!(h.output().contains("Invalid connection number."));
        assert_eq!(h.console.state(), &ConsoleState::Listing(vec![b]));
    }

    #[tokio::test]
    async fn test_out_of_range_selection() {
        let mut h = Harness::new();
        let (a, _rx) = h.add_session(4001).await;
        h.console.handle_line("1").await.unwrap();
        h.console.handle_line("5").await.unwrap();
        assert_eq!(h.console.state(), &ConsoleState::Listing(vec![a]));
    }

    #[tokio::test]
    async fn test_interacting_dispatch() {
        let mut h = Harness::new();
        let (id, mut rx) = h.add_session(4001).await;

        h.console.handle_line("1").await.unwrap();
        h.console.handle_line("1").await.unwrap();
        assert!(matches!(
            h.console.state(),
            ConsoleState::Interacting { id: got, .. } if *got == id
        ));

        h.console.handle_line("whoami").await.unwrap();
        h.console.handle_line("download notes.txt").await.unwrap();
        h.console.handle_line("").await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), Outbound::ShellCommand("whoami".into()));
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::DownloadFile("notes.txt".into())
        );
        assert!(rx.try_recv().is_err());
        assert!(h.output().ends_with(SESSION_PROMPT));

        h.console.handle_line("exit").await.unwrap();
        assert_eq!(h.console.state(), &ConsoleState::Menu);
    }

    #[tokio::test]
    async fn test_interacting_with_vanished_session() {
        let mut h = Harness::new();
        let (id, _rx) = h.add_session(4001).await;

        h.console.handle_line("1").await.unwrap();
        h.console.handle_line("1").await.unwrap();
        h.registry.remove(id).await;

        h.console.handle_line("id").await.unwrap();
        assert_eq!(h.console.state(), &ConsoleState::Menu);
        assert!(h.output().contains("is no longer connected"));
    }

    #[tokio::test]
    async fn test_run_exit_and_eof() {
        let mut h = Harness::new();
        let (tx, mut rx) = mpsc::channel(4);
        tx.send("2".to_string()).await.unwrap();
        h.console.run(&mut rx).await.unwrap();
        assert_eq!(h.console.state(), &ConsoleState::Exited);
        assert!(h.output().contains("Exiting server..."));

        let mut h = Harness::new();
        let (tx, mut rx) = mpsc::channel::<String>(4);
        drop(tx);
        h.console.run(&mut rx).await.unwrap();
        assert_eq!(h.console.state(), &ConsoleState::Exited);
    }
}
