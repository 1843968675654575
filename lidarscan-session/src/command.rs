//! Method-call command surface
//!
//! UI layers talk to the scanner by method name plus a JSON argument map.
//! Both historical spellings of the lifecycle commands map onto one
//! [`ScanCommand`], so hosts on either platform share a single dispatcher.

use crate::controller::ScanController;
use crate::error::{ScanError, ScanResult};
use crate::session::PointRecord;
use lidarscan_io::ModelFormat;
use lidarscan_reconstruction::ExportResult;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanCommand {
    CheckDeviceSupport,
    InitializeScan,
    StartScan,
    PauseScan,
    ResumeScan,
    /// `None` uses the configured default format
    CompleteScan { format: Option<ModelFormat> },
    CancelScan,
    ResetScan,
    GetPointCloudData,
    GetAvailableModels,
    DeleteModel { path: PathBuf },
}

impl ScanCommand {
    /// Parse a method name and its arguments
    ///
    /// `args` may be `null` for commands without parameters.
    pub fn parse(method: &str, args: &Value) -> ScanResult<Self> {
        let command = match method {
            "checkDeviceSupport" | "supportsLiDAR" | "hasLiDAR" => ScanCommand::CheckDeviceSupport,
            "initializeScan" => ScanCommand::InitializeScan,
            "startScan" | "startScanning" => ScanCommand::StartScan,
            "pauseScan" | "pauseSession" => ScanCommand::PauseScan,
            "resumeScan" | "resumeSession" => ScanCommand::ResumeScan,
            "completeScan" => ScanCommand::CompleteScan {
                format: optional_format(args)?,
            },
            "processPointCloudData" => ScanCommand::CompleteScan { format: None },
            "cancelScan" => ScanCommand::CancelScan,
            "resetScan" => ScanCommand::ResetScan,
            "getPointCloudData" => ScanCommand::GetPointCloudData,
            "getAvailableModels" => ScanCommand::GetAvailableModels,
            "deleteModel" => {
                let path = args
                    .get("path")
                    .and_then(Value::as_str)
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| ScanError::InvalidArgument("Path is required".to_string()))?;
                ScanCommand::DeleteModel { path: PathBuf::from(path) }
            }
            other => {
                return Err(ScanError::InvalidArgument(format!("Unknown method: {other}")));
            }
        };
        Ok(command)
    }

    /// Canonical method name
    pub fn name(&self) -> &'static str {
        match self {
            ScanCommand::CheckDeviceSupport => "checkDeviceSupport",
            ScanCommand::InitializeScan => "initializeScan",
            ScanCommand::StartScan => "startScan",
            ScanCommand::PauseScan => "pauseScan",
            ScanCommand::ResumeScan => "resumeScan",
            ScanCommand::CompleteScan { .. } => "completeScan",
            ScanCommand::CancelScan => "cancelScan",
            ScanCommand::ResetScan => "resetScan",
            ScanCommand::GetPointCloudData => "getPointCloudData",
            ScanCommand::GetAvailableModels => "getAvailableModels",
            ScanCommand::DeleteModel { .. } => "deleteModel",
        }
    }
}

fn optional_format(args: &Value) -> ScanResult<Option<ModelFormat>> {
    match args.get("format") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| ScanError::InvalidArgument(format!("Unsupported format: {s}"))),
        Some(other) => Err(ScanError::InvalidArgument(format!(
            "format must be a string, got {other}"
        ))),
    }
}

/// The single result of a command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandReply {
    /// Commands with no payload answer `true`, like the platform handlers did
    Done,
    Bool(bool),
    Export(ExportResult),
    Points(Vec<PointRecord>),
    Models(Vec<String>),
}

impl CommandReply {
    pub fn to_json(&self) -> Value {
        match self {
            CommandReply::Done => Value::Bool(true),
            // Serializing these types cannot fail: no maps with non-string keys
            other => serde_json::to_value(other).unwrap_or(Value::Null),
        }
    }
}

impl ScanController {
    /// Execute a parsed command
    pub fn handle(&self, command: ScanCommand) -> ScanResult<CommandReply> {
        debug!(command = command.name(), "handling command");
        let reply = match command {
            ScanCommand::CheckDeviceSupport => CommandReply::Bool(self.check_device_support()),
            ScanCommand::InitializeScan => {
                self.initialize_scan()?;
                CommandReply::Done
            }
            ScanCommand::StartScan => {
                self.start_scan()?;
                CommandReply::Done
            }
            ScanCommand::PauseScan => {
                self.pause_scan()?;
                CommandReply::Done
            }
            ScanCommand::ResumeScan => {
                self.resume_scan()?;
                CommandReply::Done
            }
            ScanCommand::CompleteScan { format } => CommandReply::Export(self.complete_scan(format)?),
            ScanCommand::CancelScan => {
                self.cancel_scan()?;
                CommandReply::Done
            }
            ScanCommand::ResetScan => {
                self.reset_scan()?;
                CommandReply::Done
            }
            ScanCommand::GetPointCloudData => CommandReply::Points(self.get_point_cloud_data()?),
            ScanCommand::GetAvailableModels => CommandReply::Models(
                self.get_available_models()
                    .into_iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect(),
            ),
            ScanCommand::DeleteModel { path } => CommandReply::Bool(self.delete_model(path)),
        };
        Ok(reply)
    }

    /// Parse and execute a method call, returning its JSON result
    pub fn call(&self, method: &str, args: &Value) -> ScanResult<Value> {
        let command = ScanCommand::parse(method, args)?;
        self.handle(command).map(|reply| reply.to_json())
    }
}
