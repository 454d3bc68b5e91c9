use std::{
    io::{self, BufReader, BufWriter, ErrorKind, Read, Write},
    path::Path,
};

use log::info;

use super::{ProjectRecord, PREAMBLE, VERSION};

/// Loads a project stored either as plain JSON or in the compressed container
/// written by [`save_compact`].
pub fn load(path: impl AsRef<Path>) -> io::Result<ProjectRecord> {
    let path = path.as_ref();
    info!("Load from: {path:?}");
    let mut bytes = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.starts_with(&PREAMBLE) {
        read_compact(bytes.as_slice())
    } else {
        read_json(bytes.as_slice())
    }
}

pub fn save_json(path: impl AsRef<Path>, project: &ProjectRecord) -> io::Result<()> {
    let path = path.as_ref();
    info!("Store at: {path:?}");
    let mut f = BufWriter::new(std::fs::File::create(path)?);
    write_json(&mut f, project)?;
    f.flush()
}

pub fn save_compact(path: impl AsRef<Path>, project: &ProjectRecord) -> io::Result<()> {
    let path = path.as_ref();
    info!("Store at: {path:?}");
    write_compact(std::fs::File::create(path)?, project)
}

pub fn read_json(reader: impl Read) -> io::Result<ProjectRecord> {
    serde_json::from_reader(BufReader::new(reader))
        .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
}

pub fn write_json(writer: impl Write, project: &ProjectRecord) -> io::Result<()> {
    serde_json::to_writer_pretty(writer, project).map_err(io::Error::other)
}

pub fn read_compact(mut reader: impl Read) -> io::Result<ProjectRecord> {
    let mut preamble = [0; PREAMBLE.len()];
    reader.read_exact(&mut preamble)?;
    if preamble != PREAMBLE {
        return Err(io::Error::new(ErrorKind::InvalidInput, "Invalid preamble"));
    }
    let mut version_bytes = [0; 2];
    reader.read_exact(&mut version_bytes)?;
    let version = u16::from_le_bytes(version_bytes);
    if version != VERSION {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("Unsupported version {version}, expected {VERSION}"),
        ));
    }
    read_json(brotli::Decompressor::new(reader, 4096))
}

pub fn write_compact(mut writer: impl Write, project: &ProjectRecord) -> io::Result<()> {
    writer.write_all(&PREAMBLE)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    let mut f = brotli::CompressorWriter::new(writer, 4096, 11, 22);
    serde_json::to_writer(&mut f, project).map_err(io::Error::other)?;
    f.flush()
}
