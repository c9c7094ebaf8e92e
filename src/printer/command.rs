//! Command payloads for the printer's request topic.

use serde_json::json;

/// Command published to the device-scoped request topic.
#[derive(Debug, Clone)]
pub enum PrinterCommand {
    /// Start printing a file previously uploaded to the printer's storage,
    /// addressed by its name under the `ftp/` root.
    ProjectFile {
        /// File name on the printer, as used during the upload.
        remote_name: String,
    },
}

impl PrinterCommand {
    /// Convert the command to its JSON payload. The field set and the
    /// `ftp/` path prefix are part of the device's accepted protocol.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PrinterCommand::ProjectFile { remote_name } => json!({
                "print": {
                    "command": "project_file",
                    "param": format!("ftp/{remote_name}"),
                    "project_id": "0",
                    "profile_id": "0",
                    "task_id": "0",
                    "subtask_id": "0"
                }
            }),
        }
    }

    /// MQTT topic for this command on the given printer.
    pub fn topic(&self, serial: &str) -> String {
        format!("device/{serial}/request")
    }
}
