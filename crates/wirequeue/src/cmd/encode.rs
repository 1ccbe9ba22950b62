use std::fs::{self, OpenOptions};
use std::io::Write;

use serde_json::Value;
use wirequeue_frame::{MessageWriter, QueueConfig};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let body = resolve_body(&args)?;
    let wire = encode(args.id, args.receptive, &body)?;

    match &args.output {
        Some(path) => {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(args.append)
                .truncate(!args.append)
                .open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            file.write_all(&wire)
                .map_err(|err| io_error("write failed", err))?;
        }
        None => {
            let mut out = std::io::stdout().lock();
            out.write_all(&wire)
                .and_then(|()| out.flush())
                .map_err(|err| io_error("write failed", err))?;
        }
    }

    tracing::debug!(id = args.id, bytes = wire.len(), "encoded message");
    Ok(SUCCESS)
}

fn resolve_body(args: &EncodeArgs) -> CliResult<Value> {
    if let Some(json) = &args.json {
        return serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")));
    }
    if let Some(text) = &args.text {
        return Ok(Value::String(text.clone()));
    }
    if let Some(path) = &args.file {
        let raw = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return serde_json::from_slice(&raw).map_err(|err| {
            CliError::new(USAGE, format!("{} is not valid JSON: {err}", path.display()))
        });
    }
    Ok(Value::Null)
}

/// Encode through a writer so size limits match what peers accept.
fn encode(id: u64, receptive: bool, body: &Value) -> CliResult<Vec<u8>> {
    let mut writer = MessageWriter::with_config(Vec::new(), QueueConfig::default());
    writer
        .send(id, receptive, body)
        .map_err(|err| frame_error("encode failed", err))?;
    Ok(writer.into_inner())
}
