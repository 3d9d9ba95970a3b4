//! Background stdin reader thread.

use std::io::BufRead;

use tokio::sync::mpsc;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Spawn a thread that forwards stdin lines to the returned receiver.
///
/// A plain OS thread is used so a pending read never holds up runtime
/// shutdown. The channel closes on EOF or read error.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
}

/// Spawn a thread that forwards lines from any blocking reader.
pub fn spawn_line_reader<R: BufRead + Send + 'static>(reader: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel::<String>(16);
    std::thread::spawn(move || forward_lines(reader, tx));
    rx
}

fn forward_lines<R: BufRead>(reader: R, tx: mpsc::Sender<String>) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if tx.blocking_send(line).is_err() {
                    // Receiver dropped
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Operator input error: {}", e);
                break;
            }
        }
    }
    tracing::debug!("Operator input closed");
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
