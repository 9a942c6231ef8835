//! Decoding raw datagram lines into commands.
//!
//! Decoding never panics and never touches monitor state. Anything that
//! cannot be turned into a command is reported as `Unrecognized` or as a
//! `DecodeError`; the caller logs it and drops the message.

use thiserror::Error;
use udpmon_core::{MachineId, SessionName};

use crate::message::{Command, HEARTBEAT_TAG, MACHINE_JOIN_TAG, SEPARATOR, SESSION_ANNOUNCE_TAG};

/// Errors produced while decoding a line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The line produced no fields at all.
    #[error("message is empty")]
    Empty,

    /// The version field of a heartbeat is not a finite number.
    #[error("invalid version {value:?} in heartbeat from {machine_id}")]
    InvalidVersion { machine_id: MachineId, value: String },

    /// The fps field of a heartbeat is not an integer.
    #[error("invalid fps {value:?} in heartbeat from {machine_id}")]
    InvalidFps { machine_id: MachineId, value: String },
}

/// Splits a line into its fields.
///
/// Trailing line terminators and NUL padding are ignored. A trailing
/// separator does not produce an empty last field, but empty fields in the
/// middle of the line are kept.
pub fn split_fields(line: &str) -> Vec<&str> {
    let line = line.trim_end_matches(&['\r', '\n', '\0'][..]);
    if line.is_empty() {
        return Vec::new();
    }

    let mut fields: Vec<&str> = line.split(SEPARATOR).collect();
    if line.ends_with(SEPARATOR) {
        fields.pop();
    }
    fields
}

/// Decodes one line into a command.
///
/// # Errors
///
/// - `DecodeError::Empty` if the line has no fields
/// - `DecodeError::InvalidVersion` / `DecodeError::InvalidFps` if a heartbeat
///   carries a field that does not parse
pub fn decode(line: &str) -> Result<Command, DecodeError> {
    let fields = split_fields(line);

    let command = match fields.as_slice() {
        [] => return Err(DecodeError::Empty),
        [tag, session, creator, rest @ ..] if *tag == SESSION_ANNOUNCE_TAG => {
            let mut members = Vec::with_capacity(rest.len() + 1);
            members.push(MachineId::new(*creator));
            members.extend(rest.iter().map(|m| MachineId::new(*m)));
            Command::SessionAnnounce {
                session: SessionName::new(*session),
                creator: MachineId::new(*creator),
                members,
            }
        }
        [tag, machine_id, session] if *tag == MACHINE_JOIN_TAG => Command::MachineJoin {
            machine_id: MachineId::new(*machine_id),
            session: SessionName::new(*session),
        },
        [tag, machine_id, version, fps] if *tag == HEARTBEAT_TAG => {
            let machine_id = MachineId::new(*machine_id);
            let version = parse_version(&machine_id, version)?;
            let fps = parse_fps(&machine_id, fps)?;
            Command::Heartbeat {
                machine_id,
                version,
                fps,
            }
        }
        [tag, ..] => Command::Unrecognized {
            tag: (*tag).to_string(),
            field_count: fields.len(),
        },
    };

    Ok(command)
}

fn parse_version(machine_id: &MachineId, raw: &str) -> Result<f32, DecodeError> {
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeError::InvalidVersion {
            machine_id: machine_id.clone(),
            value: raw.to_string(),
        })
}

fn parse_fps(machine_id: &MachineId, raw: &str) -> Result<i32, DecodeError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DecodeError::InvalidFps {
            machine_id: machine_id.clone(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fields_basic() {
        assert_eq!(split_fields("a|b|c"), vec!["a", "b", "c"]);
        assert_eq!(split_fields("a||c"), vec!["a", "", "c"]);
        assert_eq!(split_fields("a|b|"), vec!["a", "b"]);
        assert_eq!(split_fields("|"), vec![""]);
        assert!(split_fields("").is_empty());
    }

    #[test]
    fn test_split_fields_strips_line_terminators() {
        assert_eq!(split_fields("MACHINE|m1|s\r\n"), vec!["MACHINE", "m1", "s"]);
        assert_eq!(split_fields("MACHINE|m1|s\0\0"), vec!["MACHINE", "m1", "s"]);
        assert!(split_fields("\n").is_empty());
    }

    #[test]
    fn test_decode_session_announce() {
        let cmd = decode("SESSION2|roomA|m1|m1|m2").unwrap();
        assert_eq!(
            cmd,
            Command::SessionAnnounce {
                session: SessionName::new("roomA"),
                creator: MachineId::new("m1"),
                members: vec![MachineId::new("m1"), MachineId::new("m1"), MachineId::new("m2")],
            }
        );
    }

    #[test]
    fn test_decode_session_announce_creator_only() {
        let cmd = decode("SESSION2|roomA|m1").unwrap();
        match cmd {
            Command::SessionAnnounce { members, .. } => {
                assert_eq!(members, vec![MachineId::new("m1")]);
            }
            other => panic!("Expected SessionAnnounce, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_session_announce_too_short() {
        let cmd = decode("SESSION2|roomA").unwrap();
        assert_eq!(
            cmd,
            Command::Unrecognized {
                tag: "SESSION2".to_string(),
                field_count: 2
            }
        );
    }

    #[test]
    fn test_decode_machine_join() {
        let cmd = decode("MACHINE|m2|roomA").unwrap();
        assert_eq!(cmd, Command::machine_join("m2", "roomA"));
    }

    #[test]
    fn test_decode_machine_join_wrong_field_count() {
        let cmd = decode("MACHINE|m2|roomA|extra").unwrap();
        assert!(matches!(cmd, Command::Unrecognized { field_count: 4, .. }));

        let cmd = decode("MACHINE|m2").unwrap();
        assert!(matches!(cmd, Command::Unrecognized { field_count: 2, .. }));
    }

    #[test]
    fn test_decode_heartbeat() {
        let cmd = decode("MACHINESTATUS|m1|1.5|60").unwrap();
        assert_eq!(cmd, Command::heartbeat("m1", 1.5, 60));
    }

    #[test]
    fn test_heartbeat_encode_decode_is_exact() {
        let line = Command::heartbeat("m1", 1.5, 60).encode().unwrap();
        match decode(&line).unwrap() {
            Command::Heartbeat { version, fps, .. } => {
                assert_eq!(version, 1.5);
                assert_eq!(fps, 60);
            }
            other => panic!("Expected Heartbeat, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_heartbeat_tolerates_trailing_newline() {
        let cmd = decode("MACHINESTATUS|m1|2.0|30\n").unwrap();
        assert_eq!(cmd, Command::heartbeat("m1", 2.0, 30));
    }

    #[test]
    fn test_decode_heartbeat_bad_version() {
        let err = decode("MACHINESTATUS|m1|abc|60").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidVersion { .. }));

        let err = decode("MACHINESTATUS|m1|NaN|60").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidVersion { .. }));
    }

    #[test]
    fn test_decode_heartbeat_bad_fps() {
        let err = decode("MACHINESTATUS|m1|1.0|sixty").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidFps {
                machine_id: MachineId::new("m1"),
                value: "sixty".to_string(),
            }
        );

        let err = decode("MACHINESTATUS|m1|1.0|60.5").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidFps { .. }));
    }

    #[test]
    fn test_decode_heartbeat_wrong_field_count() {
        let cmd = decode("MACHINESTATUS|m1|1.0").unwrap();
        assert!(matches!(cmd, Command::Unrecognized { field_count: 3, .. }));
    }

    #[test]
    fn test_decode_unknown_tag() {
        let cmd = decode("FOO|bar").unwrap();
        assert_eq!(
            cmd,
            Command::Unrecognized {
                tag: "FOO".to_string(),
                field_count: 2
            }
        );
    }

    #[test]
    fn test_decode_tags_are_case_sensitive() {
        let cmd = decode("machine|m2|roomA").unwrap();
        assert!(matches!(cmd, Command::Unrecognized { .. }));
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode(""), Err(DecodeError::Empty));
        assert_eq!(decode("\r\n"), Err(DecodeError::Empty));
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::InvalidFps {
            machine_id: MachineId::new("m1"),
            value: "x".to_string(),
        };
        assert_eq!(err.to_string(), "invalid fps \"x\" in heartbeat from m1");
    }
}
