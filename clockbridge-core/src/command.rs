// command.rs
//
// The JSON command plane. Payloads arrive as raw bytes from the command
// characteristic and parse borrowed, without allocation:
//
//   { "id": "<correlation id>", "command": "<name>", "params": { ... } }
//
// A command without a usable id cannot be answered and is dropped; every
// other defect produces an error response correlated to the id.

use heapless::String;
use serde::Deserialize;

use crate::frame::{BEEP_MAX, DISPLAY_TEXT_MAX, LEFT_DOTS_MASK, RIGHT_DOTS_MASK};
use crate::types::{ClockTime, ErrorCode, MAX_COMMAND_ID_LEN, RunMode};

pub type CommandId = String<MAX_COMMAND_ID_LEN>;

/// A validated, executable command.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<'a> {
    SetTime {
        time: ClockTime,
        left_mode: RunMode,
        right_mode: RunMode,
    },
    DisplayText {
        text: &'a str,
        beep: u8,
        left_dots: u8,
        right_dots: u8,
    },
    EndDisplay,
    Stop,
    Run {
        left_mode: RunMode,
        right_mode: RunMode,
    },
    GetTime,
    GetStatus,
}

impl Command<'_> {
    /// Everything except getStatus talks to the clock.
    pub fn requires_clock(&self) -> bool {
        !matches!(self, Command::GetStatus)
    }
}

/// What to do with a payload after parsing.
#[derive(Debug, PartialEq)]
pub enum ParseOutcome<'a> {
    /// No recoverable id; per protocol the payload is dropped silently.
    Discard,
    /// Answer with a success path command or a correlated error.
    Respond {
        id: CommandId,
        parsed: Result<Command<'a>, (ErrorCode, &'static str)>,
    },
}

#[derive(Deserialize)]
struct CommandFrame<'a> {
    id: Option<&'a str>,
    command: Option<&'a str>,
    params: Option<Params<'a>>,
}

/// Union of every command's parameters. Absent numeric fields read as zero,
/// mirroring the lenient client behavior the protocol grew up with; range
/// validation happens afterwards.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Params<'a> {
    left_mode: Option<u16>,
    left_hours: Option<u16>,
    left_minutes: Option<u16>,
    left_seconds: Option<u16>,
    right_mode: Option<u16>,
    right_hours: Option<u16>,
    right_minutes: Option<u16>,
    right_seconds: Option<u16>,
    text: Option<&'a str>,
    beep: Option<u16>,
    left_dots: Option<u16>,
    right_dots: Option<u16>,
}

/// Parses and validates one command payload.
pub fn parse_command(payload: &[u8]) -> ParseOutcome<'_> {
    let frame: CommandFrame<'_> = match serde_json_core::from_slice(payload) {
        Ok((frame, _)) => frame,
        Err(_) => {
            // The document is broken, but a response still helps the client
            // if the id survived; scan for it directly.
            return match extract_id(payload) {
                Some(id) => ParseOutcome::Respond {
                    id,
                    parsed: Err((ErrorCode::JsonParseError, "JSON parse error")),
                },
                None => ParseOutcome::Discard,
            };
        }
    };

    let Some(id) = frame.id else {
        return ParseOutcome::Discard;
    };
    let id = truncate_id(id);

    let Some(name) = frame.command else {
        return ParseOutcome::Respond {
            id,
            parsed: Err((
                ErrorCode::JsonInvalidCommand,
                "Missing 'id' or 'command' field",
            )),
        };
    };

    let params = frame.params.unwrap_or_default();
    let parsed = build_command(name, &params);
    ParseOutcome::Respond { id, parsed }
}

fn build_command<'a>(
    name: &str,
    params: &Params<'a>,
) -> Result<Command<'a>, (ErrorCode, &'static str)> {
    match name {
        "setTime" => {
            let time = ClockTime {
                left_hours: params.left_hours.unwrap_or(0) as u8,
                left_minutes: params.left_minutes.unwrap_or(0) as u8,
                left_seconds: params.left_seconds.unwrap_or(0) as u8,
                right_hours: params.right_hours.unwrap_or(0) as u8,
                right_minutes: params.right_minutes.unwrap_or(0) as u8,
                right_seconds: params.right_seconds.unwrap_or(0) as u8,
            };
            let modes = parse_modes(params);
            match modes {
                Some((left_mode, right_mode))
                    if in_byte_range(params) && time.is_valid() =>
                {
                    Ok(Command::SetTime {
                        time,
                        left_mode,
                        right_mode,
                    })
                }
                _ => Err((ErrorCode::JsonInvalidParameters, "Invalid time parameters")),
            }
        }
        "displayText" => {
            let Some(text) = params.text else {
                return Err((
                    ErrorCode::JsonInvalidParameters,
                    "Invalid display text parameters",
                ));
            };
            let beep = params.beep.unwrap_or(0);
            let left_dots = params.left_dots.unwrap_or(0);
            let right_dots = params.right_dots.unwrap_or(0);

            let valid = text.len() <= DISPLAY_TEXT_MAX
                && beep <= BEEP_MAX as u16
                && left_dots & !(LEFT_DOTS_MASK as u16) == 0
                && right_dots & !(RIGHT_DOTS_MASK as u16) == 0;
            if !valid {
                return Err((
                    ErrorCode::JsonInvalidParameters,
                    "Invalid display text parameters",
                ));
            }
            Ok(Command::DisplayText {
                text,
                beep: beep as u8,
                left_dots: left_dots as u8,
                right_dots: right_dots as u8,
            })
        }
        "endDisplay" => Ok(Command::EndDisplay),
        "stop" => Ok(Command::Stop),
        "run" => match parse_modes(params) {
            Some((left_mode, right_mode)) => Ok(Command::Run {
                left_mode,
                right_mode,
            }),
            None => Err((ErrorCode::JsonInvalidParameters, "Invalid run parameters")),
        },
        "getTime" => Ok(Command::GetTime),
        "getStatus" => Ok(Command::GetStatus),
        _ => Err((ErrorCode::JsonInvalidCommand, "Unknown command")),
    }
}

fn parse_modes(params: &Params<'_>) -> Option<(RunMode, RunMode)> {
    let left = RunMode::from_u8(u8::try_from(params.left_mode.unwrap_or(0)).ok()?)?;
    let right = RunMode::from_u8(u8::try_from(params.right_mode.unwrap_or(0)).ok()?)?;
    Some((left, right))
}

/// Rejects time fields that would wrap when narrowed to a byte.
fn in_byte_range(params: &Params<'_>) -> bool {
    [
        params.left_hours,
        params.left_minutes,
        params.left_seconds,
        params.right_hours,
        params.right_minutes,
        params.right_seconds,
    ]
    .iter()
    .all(|field| field.unwrap_or(0) <= u8::MAX as u16)
}

fn truncate_id(id: &str) -> CommandId {
    let mut out = CommandId::new();
    for c in id.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Last-resort scan for `"id": "..."` in a payload that failed to parse.
fn extract_id(payload: &[u8]) -> Option<CommandId> {
    let text = core::str::from_utf8(payload).ok()?;
    let key = text.find("\"id\"")?;
    let rest = &text[key + 4..];
    let colon = rest.find(':')?;
    let rest = rest[colon + 1..].trim_start();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    if rest[..end].is_empty() {
        return None;
    }
    Some(truncate_id(&rest[..end]))
}

#[cfg(test)]
mod tests;
