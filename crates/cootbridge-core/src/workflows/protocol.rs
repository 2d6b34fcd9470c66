//! Inbound and outbound worker messages and the dispatcher that answers them.

use crate::engine::context::WorkerContext;
use crate::engine::error::{BridgeError, ProtocolFault};
use crate::engine::materialize::{ResultPayload, ReturnType};
use crate::engine::module::ModuleKind;
use crate::engine::router::{CommandRequest, CommandRouter, CoordinateFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, warn};

/// Wire names of every message kind the worker understands.
pub const MESSAGE_KINDS: [&str; 11] = [
    "CootInitialize",
    "coot_command",
    "coot_command_list",
    "get_mtz_data",
    "get_map",
    "delete_file_name",
    "get_atoms",
    "read_mtz",
    "get_rama",
    "copy_fragment",
    "delete",
];

/// Milliseconds since the Unix epoch, the clock hosts stamp their messages with.
pub fn epoch_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
        .unwrap_or_default()
}

/// The fields of a single engine command, as carried alone or inside a command list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFields {
    pub command: String,
    #[serde(default)]
    pub command_args: Vec<Value>,
    pub return_type: String,
    #[serde(rename = "chainID", default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub module: Option<ModuleKind>,
}

impl CommandFields {
    /// Resolves the return-type tag; a list entry without its own chain falls back to the
    /// list's chain.
    pub fn to_request(&self, fallback_chain: Option<&str>) -> Result<CommandRequest, ProtocolFault> {
        let return_type: ReturnType = self.return_type.parse()?;
        Ok(CommandRequest {
            command: self.command.clone(),
            args: self.command_args.clone(),
            return_type,
            chain_id: self
                .chain_id
                .clone()
                .or_else(|| fallback_chain.map(str::to_string)),
            module: self.module.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "message")]
pub enum Inbound {
    #[serde(rename = "CootInitialize")]
    Initialize,
    #[serde(rename = "coot_command")]
    Command(CommandFields),
    #[serde(rename = "coot_command_list")]
    CommandList {
        #[serde(rename = "commandList")]
        command_list: Vec<CommandFields>,
        #[serde(rename = "chainID", default)]
        chain_id: Option<String>,
    },
    #[serde(rename = "get_mtz_data")]
    GetMtzData {
        #[serde(rename = "fileName")]
        file_name: String,
        #[serde(rename = "molNo")]
        mol_no: i64,
    },
    #[serde(rename = "get_map")]
    GetMap {
        #[serde(rename = "molNo")]
        mol_no: i64,
    },
    #[serde(rename = "delete_file_name")]
    DeleteFileName {
        #[serde(rename = "fileName")]
        file_name: String,
    },
    #[serde(rename = "get_atoms")]
    GetAtoms {
        #[serde(rename = "molNo")]
        mol_no: i64,
        format: String,
    },
    #[serde(rename = "read_mtz")]
    ReadMtz { data: Value, name: String },
    #[serde(rename = "get_rama")]
    GetRama {
        #[serde(rename = "molNo")]
        mol_no: i64,
        #[serde(rename = "chainId")]
        chain_id: String,
    },
    #[serde(rename = "copy_fragment")]
    CopyFragment {
        #[serde(rename = "molNo")]
        mol_no: i64,
        #[serde(rename = "chainId")]
        chain_id: String,
        res_no_start: i64,
        res_no_end: i64,
    },
    #[serde(rename = "delete")]
    Delete {
        #[serde(rename = "molNo")]
        mol_no: i64,
    },
}

/// Correlation fields read from a message before its kind is known.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    pub message_id: Value,
    pub kind: Option<String>,
    pub time_stamp: Option<f64>,
}

impl MessageHeader {
    pub fn read(raw: &Value) -> Self {
        Self {
            message_id: raw.get("messageId").cloned().unwrap_or(Value::Null),
            kind: raw
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            time_stamp: raw.get("myTimeStamp").and_then(Value::as_f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Completed,
    Exception,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyResult {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultPayload>,
}

/// Timings attached to a command reply, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub engine_ms: f64,
    pub conversion_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transit_ms: Option<f64>,
}

/// One outbound message. Command-list replies carry `resultList` in place of `result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub message_id: Value,
    pub message_send_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_time_stamp: Option<f64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub console_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ReplyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_list: Option<Vec<Reply>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl Reply {
    fn to(header: &MessageHeader) -> Self {
        Self {
            message_id: header.message_id.clone(),
            message_send_time: epoch_ms(),
            message: header.kind.clone(),
            my_time_stamp: header.time_stamp,
            console_message: String::new(),
            result: None,
            result_list: None,
            diagnostics: None,
        }
    }

    fn completed(header: &MessageHeader, console: String, payload: ResultPayload) -> Self {
        Self {
            console_message: console,
            result: Some(ReplyResult {
                status: Status::Completed,
                result: Some(payload),
            }),
            ..Self::to(header)
        }
    }

    fn exception(header: &MessageHeader, console: String) -> Self {
        Self {
            console_message: console,
            result: Some(ReplyResult {
                status: Status::Exception,
                result: None,
            }),
            ..Self::to(header)
        }
    }

    pub fn status(&self) -> Option<Status> {
        self.result.as_ref().map(|result| result.status)
    }
}

/// Answers decoded messages against one worker context, one message at a time.
pub struct Dispatcher {
    router: CommandRouter,
    ctx: WorkerContext,
}

impl Dispatcher {
    pub fn new(router: CommandRouter, ctx: WorkerContext) -> Self {
        Self { router, ctx }
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut WorkerContext {
        &mut self.ctx
    }

    /// Decodes and answers one JSON message. Every message gets exactly one reply.
    pub fn handle_raw(&mut self, raw: &str, received_at: f64) -> Reply {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                let header = MessageHeader {
                    message_id: Value::Null,
                    kind: None,
                    time_stamp: None,
                };
                let fault = ProtocolFault::Malformed {
                    kind: "message".to_string(),
                    reason: e.to_string(),
                };
                warn!(error = %fault, "Rejected undecodable message");
                return Reply::exception(&header, fault.to_string());
            }
        };
        self.handle_value(value, received_at)
    }

    pub fn handle_value(&mut self, value: Value, received_at: f64) -> Reply {
        let header = MessageHeader::read(&value);
        let reply = match decode(&header, value) {
            Ok(inbound) => self.handle(&header, inbound, received_at),
            Err(fault) => {
                warn!(message_id = %header.message_id, error = %fault, "Rejected message");
                Reply::exception(&header, fault.to_string())
            }
        };
        self.ctx.flush_heap_journals();
        reply
    }

    pub fn handle(&mut self, header: &MessageHeader, inbound: Inbound, received_at: f64) -> Reply {
        let transit_ms = header.time_stamp.map(|sent| (received_at - sent).max(0.0));
        match inbound {
            Inbound::Initialize => {
                let availability = self.ctx.availability();
                let ready = availability
                    .iter()
                    .filter(|status| status.available)
                    .count();
                let console = format!(
                    "Initialized engine ({} of {} modules available)",
                    ready,
                    availability.len()
                );
                Reply::completed(header, console, ResultPayload::Plain(json!(availability)))
            }
            Inbound::Command(fields) => self.run_command(header, &fields, None, transit_ms),
            Inbound::CommandList {
                command_list,
                chain_id,
            } => {
                let replies = command_list
                    .iter()
                    .map(|fields| self.run_command(header, fields, chain_id.as_deref(), transit_ms))
                    .collect();
                Reply {
                    result_list: Some(replies),
                    ..Reply::to(header)
                }
            }
            other => self.run_worker_message(header, other),
        }
    }

    fn run_command(
        &mut self,
        header: &MessageHeader,
        fields: &CommandFields,
        fallback_chain: Option<&str>,
        transit_ms: Option<f64>,
    ) -> Reply {
        let outcome = fields
            .to_request(fallback_chain)
            .map_err(BridgeError::from)
            .and_then(|request| self.router.execute(&mut self.ctx, &request));
        match outcome {
            Ok(outcome) => {
                let total_ms = header
                    .time_stamp
                    .map_or(outcome.engine_ms + outcome.conversion_ms, |sent| {
                        (epoch_ms() - sent).max(0.0)
                    });
                let mut reply = Reply::completed(
                    header,
                    format!("Completed {} in {} ms", fields.command, total_ms.round()),
                    outcome.payload,
                );
                reply.diagnostics = Some(Diagnostics {
                    engine_ms: outcome.engine_ms,
                    conversion_ms: outcome.conversion_ms,
                    transit_ms,
                });
                reply
            }
            Err(e) => {
                error!(command = %fields.command, error = %e, "Command raised an exception");
                Reply::exception(
                    header,
                    format!("EXCEPTION RAISED IN {}, {}", fields.command, e),
                )
            }
        }
    }

    fn run_worker_message(&mut self, header: &MessageHeader, inbound: Inbound) -> Reply {
        let kind = header.kind.clone().unwrap_or_default();
        match self.worker_message(inbound) {
            Ok((console, payload)) => {
                debug!(message = %kind, "Worker message completed");
                Reply::completed(header, console, ResultPayload::Plain(payload))
            }
            Err(e) => {
                error!(message = %kind, error = %e, "Worker message raised an exception");
                Reply::exception(header, format!("EXCEPTION RAISED IN {}, {}", kind, e))
            }
        }
    }

    fn worker_message(&mut self, inbound: Inbound) -> Result<(String, Value), BridgeError> {
        let router = &self.router;
        let ctx = &mut self.ctx;
        match inbound {
            Inbound::GetAtoms { mol_no, format } => {
                let format = CoordinateFormat::parse(&format)?;
                let text = router.fetch_atoms(ctx, mol_no, format)?;
                Ok((
                    format!("Fetched coordinates of molecule {}", mol_no),
                    json!({ "molNo": mol_no, "pdbData": text }),
                ))
            }
            Inbound::GetMtzData { file_name, mol_no } => {
                let bytes = router.fetch_file(ctx, &file_name)?;
                Ok((
                    format!("Fetched mtz data for map {}", mol_no),
                    json!({ "molNo": mol_no, "mtzData": bytes }),
                ))
            }
            Inbound::GetMap { mol_no } => {
                let bytes = router.fetch_map(ctx, mol_no)?;
                Ok((
                    format!("Fetched map of map {}", mol_no),
                    json!({ "molNo": mol_no, "mapData": bytes }),
                ))
            }
            Inbound::ReadMtz { data, name } => {
                let bytes = crate::engine::staging::payload_bytes(&data, "data")?;
                let mol_no = router.read_mtz(ctx, &bytes, &name)?;
                Ok((
                    format!("Read map MTZ as molecule {}", mol_no),
                    json!({ "molNo": mol_no, "name": name }),
                ))
            }
            Inbound::GetRama { mol_no, chain_id } => {
                let records = router.ramachandran(ctx, mol_no, &chain_id)?;
                Ok((
                    format!("Fetched Ramachandran data for molecule {} chain {}", mol_no, chain_id),
                    serde_json::to_value(records).map_err(|e| ProtocolFault::Malformed {
                        kind: "get_rama".to_string(),
                        reason: e.to_string(),
                    })?,
                ))
            }
            Inbound::CopyFragment {
                mol_no,
                chain_id,
                res_no_start,
                res_no_end,
            } => {
                let copy = router.copy_fragment(ctx, mol_no, &chain_id, res_no_start, res_no_end)?;
                Ok((
                    format!("Copied fragment of molecule {} as molecule {}", mol_no, copy),
                    json!(copy),
                ))
            }
            Inbound::Delete { mol_no } => {
                let status = router.close_molecule(ctx, mol_no)?;
                Ok((format!("Closed molecule {}", mol_no), status))
            }
            Inbound::DeleteFileName { file_name } => {
                router.delete_file(ctx, &file_name)?;
                Ok((format!("Deleted {}", file_name), Value::Null))
            }
            Inbound::Initialize | Inbound::Command(_) | Inbound::CommandList { .. } => {
                Err(ProtocolFault::UnknownMessage(
                    "command message routed as a worker message".to_string(),
                )
                .into())
            }
        }
    }
}

/// Checks the message kind before decoding so that an unknown kind is reported as such
/// rather than as a shape error.
fn decode(header: &MessageHeader, value: Value) -> Result<Inbound, ProtocolFault> {
    let kind = header
        .kind
        .as_deref()
        .ok_or(ProtocolFault::MissingField("message"))?;
    if !MESSAGE_KINDS.contains(&kind) {
        return Err(ProtocolFault::UnknownMessage(kind.to_string()));
    }
    serde_json::from_value(value).map_err(|e| ProtocolFault::Malformed {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}
