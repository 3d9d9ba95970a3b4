//! Line-oriented wire protocol between the listener and its peers.
//!
//! Every message is a single chunk of UTF-8 text framed as `<TAG>:<field>...`:
//! ```text
//! in   Command output: <text>            display only
//! in   Error executing command: <text>   display only
//! in   FILE_CONTENT:<name>:<base64>      save file locally
//! in   UPLOAD_FILE:<path>                peer wants this file pushed to it
//! out  SHELL_COMMAND:<command>           ask peer to execute
//! out  DOWNLOAD_FILE:<path>              ask peer to send this file
//! out  FILE_CONTENT:<name>:<base64>      push file to peer
//! ```
//!
//! Field values cannot contain the `:` delimiter, except for the final field of
//! `UPLOAD_FILE`, `DOWNLOAD_FILE` and `SHELL_COMMAND`. File names containing `:`
//! are refused on encode and desynchronize the field count on decode.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Field delimiter.
pub const DELIMITER: char = ':';

/// Prefix of successful command output from a peer.
pub const COMMAND_OUTPUT_PREFIX: &str = "Command output:";

/// Prefix of failed command output from a peer.
pub const COMMAND_ERROR_PREFIX: &str = "Error executing command:";

/// Tag: file payload (either direction).
pub const TAG_FILE_CONTENT: &str = "FILE_CONTENT";

/// Tag: peer asks for a local file (peer -> listener).
pub const TAG_UPLOAD_FILE: &str = "UPLOAD_FILE";

/// Tag: shell command dispatch (listener -> peer).
pub const TAG_SHELL_COMMAND: &str = "SHELL_COMMAND";

/// Tag: file pull request (listener -> peer).
pub const TAG_DOWNLOAD_FILE: &str = "DOWNLOAD_FILE";

/// Prefix of the text sent to a peer when a requested file cannot be read.
pub const READ_ERROR_PREFIX: &str = "Error reading file:";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Messages received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Command output or command error text, displayed verbatim.
    Output(String),

    /// File payload to save locally.
    FileContent { name: String, data: Vec<u8> },

    /// Peer asks for this local file to be pushed to it.
    UploadRequest(String),

    /// Text with no known prefix.
    Unrecognized(String),
}

/// Messages sent to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Ask the peer to execute a command.
    ShellCommand(String),

    /// Ask the peer to send a file.
    DownloadFile(String),

    /// Push a file to the peer.
    FileContent { name: String, data: Vec<u8> },

    /// Plain error text, sent instead of a file when a read fails.
    ErrorText(String),
}

/// Protocol error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("{tag} expects {expected} fields, got {actual}")]
    FieldCount {
        tag: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("Missing {field} in {tag} message")]
    EmptyField {
        tag: &'static str,
        field: &'static str,
    },

    #[error("File name {0:?} contains the ':' delimiter")]
    DelimiterInName(String),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Inbound {
    /// Classify one received chunk.
    ///
    /// The chunk is decoded as lossy UTF-8 and trimmed before matching prefixes.
    /// Returns `Ok(None)` for whitespace-only chunks.
    pub fn decode(chunk: &[u8]) -> Result<Option<Self>, ProtocolError> {
        let text = String::from_utf8_lossy(chunk);
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        Self::decode_str(text).map(Some)
    }

    /// Classify one already-trimmed message.
    pub fn decode_str(text: &str) -> Result<Self, ProtocolError> {
        if text.starts_with(COMMAND_OUTPUT_PREFIX) || text.starts_with(COMMAND_ERROR_PREFIX) {
            return Ok(Inbound::Output(text.to_string()));
        }

        if text.starts_with(&format!("{TAG_FILE_CONTENT}{DELIMITER}")) {
            let fields: Vec<&str> = text.split(DELIMITER).collect();
            if fields.len() != 3 {
                return Err(ProtocolError::FieldCount {
                    tag: TAG_FILE_CONTENT,
                    expected: 3,
                    actual: fields.len(),
                });
            }
            let name = fields[1].trim();
            if name.is_empty() {
                return Err(ProtocolError::EmptyField {
                    tag: TAG_FILE_CONTENT,
                    field: "file name",
                });
            }
            let data = BASE64
                .decode(fields[2].trim())
                .map_err(|e| ProtocolError::InvalidBase64(e.to_string()))?;
            return Ok(Inbound::FileContent {
                name: name.to_string(),
                data,
            });
        }

        if let Some(rest) = text.strip_prefix(&format!("{TAG_UPLOAD_FILE}{DELIMITER}")) {
            let path = rest.trim();
            if path.is_empty() {
                return Err(ProtocolError::EmptyField {
                    tag: TAG_UPLOAD_FILE,
                    field: "path",
                });
            }
            return Ok(Inbound::UploadRequest(path.to_string()));
        }

        Ok(Inbound::Unrecognized(text.to_string()))
    }
}

impl Outbound {
    /// Build a file push, refusing names that would break field boundaries.
    pub fn file_content(name: impl Into<String>, data: Vec<u8>) -> Result<Self, ProtocolError> {
        let name = name.into();
        validate_file_name(&name)?;
        Ok(Outbound::FileContent { name, data })
    }

    /// Encode the message to bytes. No terminator is appended.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let text = match self {
            Outbound::ShellCommand(command) => format!("{TAG_SHELL_COMMAND}{DELIMITER}{command}"),
            Outbound::DownloadFile(path) => format!("{TAG_DOWNLOAD_FILE}{DELIMITER}{path}"),
            Outbound::FileContent { name, data } => {
                validate_file_name(name)?;
                format!(
                    "{TAG_FILE_CONTENT}{DELIMITER}{name}{DELIMITER}{}",
                    BASE64.encode(data)
                )
            }
            Outbound::ErrorText(text) => text.clone(),
        };
        Ok(text.into_bytes())
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::ShellCommand(_) => TAG_SHELL_COMMAND,
            Outbound::DownloadFile(_) => TAG_DOWNLOAD_FILE,
            Outbound::FileContent { .. } => TAG_FILE_CONTENT,
            Outbound::ErrorText(_) => "ERROR_TEXT",
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn validate_file_name(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() {
        return Err(ProtocolError::EmptyField {
            tag: TAG_FILE_CONTENT,
            field: "file name",
        });
    }
    if name.contains(DELIMITER) {
        return Err(ProtocolError::DelimiterInName(name.to_string()));
    }
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_command_output() {
        let msg = Inbound::decode(b"Command output: total 0\n").unwrap();
        assert_eq!(msg, Some(Inbound::Output("Command output: total 0".into())));

        let msg = Inbound::decode(b"Error executing command: not found  ").unwrap();
        assert_eq!(
            msg,
            Some(Inbound::Output("Error executing command: not found".into()))
        );
    }

    #[test]
    fn test_decode_whitespace_only() {
        assert_eq!(Inbound::decode(b" \r\n\t").unwrap(), None);
    }

    #[test]
    fn test_decode_file_content() {
        let msg = Inbound::decode(b"FILE_CONTENT:notes.txt:aGVsbG8=\n").unwrap();
        assert_eq!(
            msg,
            Some(Inbound::FileContent {
                name: "notes.txt".into(),
                data: b"hello".to_vec(),
            })
        );
    }

    #[test]
    fn test_decode_empty_file_content() {
        let msg = Inbound::decode_str("FILE_CONTENT:empty.bin:").unwrap();
        assert_eq!(
            msg,
            Inbound::FileContent {
                name: "empty.bin".into(),
                data: Vec::new(),
            }
        );
    }

    #[test]
    fn test_decode_file_content_wrong_field_count() {
        let err = Inbound::decode_str("FILE_CONTENT:onlyonefield").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FieldCount {
                tag: TAG_FILE_CONTENT,
                expected: 3,
                actual: 2,
            }
        );

        // A colon in the name shifts the payload into a fourth field.
        let err = Inbound::decode_str("FILE_CONTENT:C:notes.txt:aGVsbG8=").unwrap_err();
        assert!(matches!(err, ProtocolError::FieldCount { actual: 4, .. }));
    }

    #[test]
    fn test_decode_file_content_bad_base64() {
        let err = Inbound::decode_str("FILE_CONTENT:a.bin:not*base64").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidBase64(_)));
    }

    #[test]
    fn test_decode_upload_request() {
        let msg = Inbound::decode(b"UPLOAD_FILE: report.txt \n").unwrap();
        assert_eq!(msg, Some(Inbound::UploadRequest("report.txt".into())));

        let msg = Inbound::decode_str("UPLOAD_FILE:C:\\Users\\report.txt").unwrap();
        assert_eq!(msg, Inbound::UploadRequest("C:\\Users\\report.txt".into()));
    }

    #[test]
    fn test_decode_upload_request_empty_path() {
        let err = Inbound::decode_str("UPLOAD_FILE:").unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyField { .. }));
    }

    #[test]
    fn test_decode_unrecognized() {
        let msg = Inbound::decode_str("hello there").unwrap();
        assert_eq!(msg, Inbound::Unrecognized("hello there".into()));

        // Tags are case-sensitive.
        let msg = Inbound::decode_str("file_content:a:b").unwrap();
        assert!(matches!(msg, Inbound::Unrecognized(_)));
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let msg = Inbound::decode(&[0xff, b'h', b'i']).unwrap();
        assert!(matches!(msg, Some(Inbound::Unrecognized(_))));
    }

    #[test]
    fn test_encode_shell_and_download() {
        assert_eq!(
            Outbound::ShellCommand("ls -la".into()).encode().unwrap(),
            b"SHELL_COMMAND:ls -la"
        );
        assert_eq!(
            Outbound::DownloadFile("notes.txt".into()).encode().unwrap(),
            b"DOWNLOAD_FILE:notes.txt"
        );
    }

    #[test]
    fn test_encode_error_text_is_verbatim() {
        let msg = Outbound::ErrorText("Error reading file: gone".into());
        assert_eq!(msg.encode().unwrap(), b"Error reading file: gone");
    }

    #[test]
    fn test_file_content_round_trip_binary() {
        let data: Vec<u8> = (0..=255u8).chain([0, 58, 10, 13]).collect();
        let wire = Outbound::file_content("blob.bin", data.clone())
            .unwrap()
            .encode()
            .unwrap();

        match Inbound::decode(&wire).unwrap() {
            Some(Inbound::FileContent { name, data: decoded }) => {
                assert_eq!(name, "blob.bin");
                assert_eq!(decoded, data);
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn test_file_content_round_trip_padding_edges() {
        // 0..=3 bytes cover every base64 padding case; the rest cross chunk sizes.
        for len in [0usize, 1, 2, 3, 4, 5, 57, 1024, 70_000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31 % 256) as u8).collect();
            let wire = Outbound::file_content("f.bin", data.clone())
                .unwrap()
                .encode()
                .unwrap();

            match Inbound::decode(&wire).unwrap() {
                Some(Inbound::FileContent { data: decoded, .. }) => {
                    assert_eq!(decoded, data, "length {}", len)
                }
                other => panic!("length {}: unexpected decode: {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_file_content_rejects_delimiter_in_name() {
        let err = Outbound::file_content("a:b.txt", vec![1]).unwrap_err();
        assert_eq!(err, ProtocolError::DelimiterInName("a:b.txt".into()));

        let raw = Outbound::FileContent {
            name: "a:b.txt".into(),
            data: vec![1],
        };
        assert!(raw.encode().is_err());
    }
}
