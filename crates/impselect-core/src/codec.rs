//! Cache file codec: gzip-compressed, UTF-8, comma-separated, header row first.

use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};

use crate::error::{ImpselectError, ImpselectResult};
use crate::table::{Table, Value};

/// Encode a table as gzip-compressed CSV.
///
/// The gzip header carries no timestamp, so equal tables encode to equal bytes.
pub fn encode(table: &Table) -> ImpselectResult<Vec<u8>> {
    let gz = GzBuilder::new().mtime(0).write(Vec::new(), Compression::default());
    let mut writer = csv::Writer::from_writer(gz);

    if table.num_columns() > 0 {
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(row.iter().map(Value::to_string))?;
        }
    }

    let gz = writer
        .into_inner()
        .map_err(|e| ImpselectError::codec(format!("flush csv: {}", e)))?;
    Ok(gz.finish()?)
}

/// Decode gzip-compressed CSV into a table, inferring cell types.
pub fn decode(bytes: &[u8]) -> ImpselectResult<Table> {
    let mut text = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .map_err(|e| ImpselectError::codec(format!("gzip/utf-8: {}", e)))?;

    if text.is_empty() {
        return Ok(Table::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(Value::infer).collect())?;
    }
    Ok(table)
}

/// Read a cached table. A missing file is a [`ImpselectError::CacheMiss`].
pub fn read_table(path: &Path) -> ImpselectResult<Table> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ImpselectError::CacheMiss {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    decode(&bytes).map_err(|e| match e {
        ImpselectError::Codec { message } => {
            ImpselectError::codec(format!("{}: {}", path.display(), message))
        }
        other => other,
    })
}

/// Write a table to `path` and return it as it will read back.
///
/// Cells go through their CSV text form, so the returned table is what a
/// later [`read_table`] of `path` yields, not necessarily `table` itself.
/// Goes through a sibling `.tmp` file and a rename, so `path` either does
/// not exist or holds a complete file.
pub fn write_table(path: &Path, table: &Table) -> ImpselectResult<Table> {
    let bytes = encode(table)?;
    let stored = decode(&bytes)?;
    write_atomic(path, &bytes)?;
    Ok(stored)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> ImpselectResult<()> {
    let temp_path = temp_path_for(path);

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
