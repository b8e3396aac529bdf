use crate::error::{Error, Result};
use crate::models::ModelDocument;
use crate::structs::*;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

#[derive(Deserialize)]
struct Row {
    #[serde(rename = "Time")]
    time: f64,
    #[serde(rename = "Size")]
    size: u64,
    // absent from unclustered tables
    #[serde(rename = "Label", default)]
    label: Option<Label>,
}

/// Read a packet table. The `Label` column is optional: without it, every packet belongs to the
/// flow "0". Other columns are ignored.
pub fn read_packet_table(path: &Path) -> Result<PacketTable> {
    log::trace!("Reading {}", path.display());
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();
    for column in ["Time", "Size"] {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::InputValidation(format!(
                "{} has no \"{column}\" column",
                path.display()
            )));
        }
    }
    let packets = reader
        .deserialize::<Row>()
        .map(|row| {
            let row = row?;
            Ok(Packet::new(
                row.time,
                row.size,
                row.label.unwrap_or_else(|| Label::from("0")),
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    log::info!("{} packets read from {}", packets.len(), path.display());
    Ok(PacketTable::new(packets))
}

/// Write a packet table with the header `Time,Size,Label`
pub fn write_packet_table(path: &Path, table: &PacketTable) -> Result<()> {
    // the header is written even when there is no packet
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(["Time", "Size", "Label"])?;
    for p in table.packets.iter() {
        writer.serialize(p)?;
    }
    writer.flush()?;
    log::info!("{} packets written to {}", table.len(), path.display());
    Ok(())
}

pub fn read_models(path: &Path) -> Result<ModelDocument> {
    let doc = ModelDocument::from_json(&fs::read_to_string(path)?)?;
    log::info!(
        "{} sub-flow models read from {}",
        doc.sub_flows.len(),
        path.display()
    );
    Ok(doc)
}

pub fn write_models(path: &Path, doc: &ModelDocument) -> Result<()> {
    fs::write(path, doc.to_json()?)?;
    log::info!("Models written to {}", path.display());
    Ok(())
}

/// Write any serializable report as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, report)?;
    log::info!("Report written to {}", path.display());
    Ok(())
}
