use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use wirequeue_frame::Record;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordOutput {
    Message {
        id: u64,
        receptive: bool,
        data: Value,
    },
    FramingError {
        error: String,
    },
}

impl From<&Record<Value>> for RecordOutput {
    fn from(record: &Record<Value>) -> Self {
        match record {
            Ok(msg) => RecordOutput::Message {
                id: msg.id,
                receptive: msg.receptive,
                data: msg.data.clone(),
            },
            Err(err) => RecordOutput::FramingError {
                error: err.to_string(),
            },
        }
    }
}

/// Collects table rows until the stream ends; other formats print
/// immediately.
pub struct RecordPrinter {
    format: OutputFormat,
    table: Option<Table>,
}

impl RecordPrinter {
    pub fn new(format: OutputFormat) -> Self {
        let table = matches!(format, OutputFormat::Table).then(|| {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "RECEPTIVE", "DATA"]);
            table
        });
        Self { format, table }
    }

    pub fn print(&mut self, record: &Record<Value>) {
        let out = RecordOutput::from(record);
        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Pretty => println!("{}", pretty_line(&out)),
            OutputFormat::Table => {
                if let Some(table) = self.table.as_mut() {
                    table.add_row(table_row(&out));
                }
            }
        }
    }

    pub fn finish(self) {
        if let Some(table) = self.table {
            println!("{table}");
        }
    }
}

fn pretty_line(out: &RecordOutput) -> String {
    match out {
        RecordOutput::Message {
            id,
            receptive,
            data,
        } => format!("id={id} receptive={receptive} data={data}"),
        RecordOutput::FramingError { error } => format!("framing error: {error}"),
    }
}

fn table_row(out: &RecordOutput) -> Vec<String> {
    match out {
        RecordOutput::Message {
            id,
            receptive,
            data,
        } => vec![id.to_string(), receptive.to_string(), data.to_string()],
        RecordOutput::FramingError { error } => {
            vec!["-".into(), "-".into(), format!("<error: {error}>")]
        }
    }
}
