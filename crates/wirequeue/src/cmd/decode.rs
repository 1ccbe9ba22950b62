use std::fs::File;
use std::io::{ErrorKind, Read};

use serde_json::Value;
use wirequeue_frame::{JsonDecoder, Queue, QueueConfig, Record};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{OutputFormat, RecordPrinter};

/// Largest accepted `--chunk-size`.
pub const MAX_CHUNK_SIZE: u64 = 1024 * 1024;

/// Totals for one decoded stream.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    pub messages: usize,
    pub framing_errors: usize,
    /// Bytes still carried when the stream ended.
    pub trailing_bytes: usize,
}

impl DecodeSummary {
    pub fn exit_code(&self) -> i32 {
        if self.framing_errors > 0 || self.trailing_bytes > 0 {
            DATA_INVALID
        } else {
            SUCCESS
        }
    }
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = QueueConfig::default();
    if let Some(max) = args.max_message_size {
        config.max_message_size = max;
    }
    let chunk_size = usize::try_from(args.chunk_size).unwrap_or(usize::MAX);

    let input: Box<dyn Read> = match &args.input {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            Box::new(file)
        }
        _ => Box::new(std::io::stdin().lock()),
    };

    let mut printer = RecordPrinter::new(format);
    let limit = args.count.map(|n| usize::try_from(n).unwrap_or(usize::MAX));
    let summary = decode_stream(input, chunk_size, config, limit, |record| {
        printer.print(record)
    })?;
    printer.finish();

    tracing::info!(
        messages = summary.messages,
        framing_errors = summary.framing_errors,
        trailing_bytes = summary.trailing_bytes,
        "decode finished"
    );
    if summary.trailing_bytes > 0 {
        tracing::warn!(
            bytes = summary.trailing_bytes,
            "stream ended inside a message"
        );
    }

    Ok(summary.exit_code())
}

/// Feed `input` through a JSON queue `chunk_size` bytes at a time.
pub fn decode_stream<R, F>(
    mut input: R,
    chunk_size: usize,
    config: QueueConfig,
    limit: Option<usize>,
    mut on_record: F,
) -> CliResult<DecodeSummary>
where
    R: Read,
    F: FnMut(&Record<Value>),
{
    let mut queue = Queue::with_config(JsonDecoder::<Value>::new(), config);
    let mut summary = DecodeSummary::default();
    if limit == Some(0) {
        return Ok(summary);
    }
    let mut chunk = vec![0u8; chunk_size];

    loop {
        let read = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("read failed", err)),
        };

        for record in queue.process(Some(&chunk[..read])) {
            match &record {
                Ok(_) => summary.messages += 1,
                Err(_) => summary.framing_errors += 1,
            }
            on_record(&record);

            if limit.is_some_and(|n| summary.messages + summary.framing_errors >= n) {
                return Ok(summary);
            }
        }
    }

    summary.trailing_bytes = queue.buffered_len();
    Ok(summary)
}
