//! Binary layout of the fingerprint store. Little-endian throughout.
//!
//! ```text
//! header   magic[16] version:u32 count:u64
//! string   len:u64 bytes[len]                      (UTF-8)
//! path     len:u64 bytes[len]                      (native encoding)
//! record   path size:u64 time:u64 hash:u32
//!          format:i32 width:u32 height:u32
//!          blockiness:f64                          (v2+)
//!          blurring:f64                            (v3+)
//!          metadata                                (v4+)
//!          defect:i32 pixel_hash:u32
//!          fingerprints:u8                         (v1-3: 0/1 filled flag)
//!          { side:u64 main[side*side]
//!            average:f32 variance_square:f32 }     (statistics v4+)
//! metadata present:u8 [pairs:u64 { key:string value:string }]
//! ```

use crate::entity::{DefectKind, FingerprintEntity, ImageFormat, ImageMetadata, UNKNOWN_SCORE};
use crate::error::{Error, Result};
use crate::identity::{hash_path, FileIdentity};
use crate::path::Path;
use crate::pixels::{PixelFingerprint, FAST_SIDE};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const MAGIC: &[u8; 16] = b"PIXELDUPER-STORE";
pub const CURRENT_VERSION: u32 = 4;

const MAX_STRING_LEN: u64 = 1 << 16;
const MAX_SIDE: u64 = 1 << 12;
const MAX_METADATA_PAIRS: u64 = 1 << 10;

pub fn write_header<W: Write>(w: &mut W, count: u64) -> Result<()> {
    w.write_all(MAGIC)?;
    w.write_u32::<LittleEndian>(CURRENT_VERSION)?;
    w.write_u64::<LittleEndian>(count)?;
    Ok(())
}

/// Returns the stream version and the record count.
pub fn read_header<R: Read>(r: &mut R) -> Result<(u32, u64)> {
    let mut magic = [0u8; 16];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::BadMagic);
    }
    let version = r.read_u32::<LittleEndian>()?;
    if version == 0 || version > CURRENT_VERSION {
        return Err(Error::UnsupportedVersion {
            found: version,
            supported: CURRENT_VERSION,
        });
    }
    let count = r.read_u64::<LittleEndian>()?;
    Ok((version, count))
}

/// Write a whole store: header followed by every entity.
pub fn write_store<'a, W, I>(w: &mut W, entities: I) -> Result<u64>
where
    W: Write,
    I: ExactSizeIterator<Item = &'a FingerprintEntity>,
{
    let count = entities.len() as u64;
    write_header(w, count)?;
    for entity in entities {
        write_entity(w, entity)?;
    }
    Ok(count)
}

/// Read a whole store. Fails on the first malformed or truncated record.
pub fn read_store<R: Read>(r: &mut R, ignore_frame_width: usize) -> Result<Vec<FingerprintEntity>> {
    let (version, count) = read_header(r)?;
    let mut entities = Vec::with_capacity(count.min(1 << 16) as usize);
    for _ in 0..count {
        entities.push(read_entity(r, version, ignore_frame_width)?);
    }
    Ok(entities)
}

pub fn write_entity<W: Write>(w: &mut W, entity: &FingerprintEntity) -> Result<()> {
    let identity = &entity.identity;
    write_path(w, identity.path())?;
    w.write_u64::<LittleEndian>(identity.size)?;
    w.write_u64::<LittleEndian>(identity.modified_time)?;
    w.write_u32::<LittleEndian>(identity.hash())?;

    w.write_i32::<LittleEndian>(entity.format.code())?;
    w.write_u32::<LittleEndian>(entity.width)?;
    w.write_u32::<LittleEndian>(entity.height)?;
    w.write_f64::<LittleEndian>(entity.blockiness)?;
    w.write_f64::<LittleEndian>(entity.blurring)?;
    write_metadata(w, entity.metadata.as_ref())?;

    w.write_i32::<LittleEndian>(entity.defect.code())?;
    w.write_u32::<LittleEndian>(entity.pixel_hash)?;

    let filled: Vec<&PixelFingerprint> = entity
        .fingerprints()
        .iter()
        .filter(|fp| fp.filled())
        .take(u8::MAX as usize)
        .collect();
    w.write_u8(filled.len() as u8)?;
    for fp in filled {
        w.write_u64::<LittleEndian>(fp.side() as u64)?;
        w.write_all(fp.main())?;
        w.write_f32::<LittleEndian>(fp.average())?;
        w.write_f32::<LittleEndian>(fp.variance_square())?;
    }
    Ok(())
}

pub fn read_entity<R: Read>(
    r: &mut R,
    version: u32,
    ignore_frame_width: usize,
) -> Result<FingerprintEntity> {
    let path = read_path(r)?;
    let size = r.read_u64::<LittleEndian>()?;
    let modified_time = r.read_u64::<LittleEndian>()?;
    let hash = r.read_u32::<LittleEndian>()?;
    if hash != hash_path(&path) {
        return Err(Error::Format(format!("path hash mismatch for {}", path)));
    }

    let mut entity = FingerprintEntity::new(FileIdentity::new(path, size, modified_time));
    let format_code = r.read_i32::<LittleEndian>()?;
    entity.format = ImageFormat::from_code(format_code)
        .ok_or_else(|| Error::Format(format!("unknown image format {}", format_code)))?;
    entity.width = r.read_u32::<LittleEndian>()?;
    entity.height = r.read_u32::<LittleEndian>()?;
    entity.blockiness = if version >= 2 {
        r.read_f64::<LittleEndian>()?
    } else {
        UNKNOWN_SCORE
    };
    entity.blurring = if version >= 3 {
        r.read_f64::<LittleEndian>()?
    } else {
        UNKNOWN_SCORE
    };
    if version >= 4 {
        entity.metadata = read_metadata(r)?;
    }

    let defect_code = r.read_i32::<LittleEndian>()?;
    entity.defect = DefectKind::from_code(defect_code)
        .ok_or_else(|| Error::Format(format!("unknown defect kind {}", defect_code)))?;
    entity.pixel_hash = r.read_u32::<LittleEndian>()?;

    let count = r.read_u8()?;
    if version < 4 && count > 1 {
        return Err(Error::Format(format!("invalid filled flag {}", count)));
    }
    for _ in 0..count {
        let side = r.read_u64::<LittleEndian>()?;
        if side < FAST_SIDE as u64 || side > MAX_SIDE {
            return Err(Error::Format(format!("invalid fingerprint side {}", side)));
        }
        let side = side as usize;
        let mut main = vec![0u8; side * side];
        r.read_exact(&mut main)?;
        let statistics = if version >= 4 {
            Some((r.read_f32::<LittleEndian>()?, r.read_f32::<LittleEndian>()?))
        } else {
            None
        };
        entity.set_fingerprint(PixelFingerprint::restore(
            side,
            &main,
            ignore_frame_width,
            statistics,
        ));
    }
    Ok(entity)
}

fn write_metadata<W: Write>(w: &mut W, metadata: Option<&ImageMetadata>) -> Result<()> {
    match metadata {
        None => w.write_u8(0)?,
        Some(metadata) => {
            w.write_u8(1)?;
            w.write_u64::<LittleEndian>(metadata.entries.len() as u64)?;
            for (key, value) in &metadata.entries {
                write_string(w, key)?;
                write_string(w, value)?;
            }
        }
    }
    Ok(())
}

fn read_metadata<R: Read>(r: &mut R) -> Result<Option<ImageMetadata>> {
    match r.read_u8()? {
        0 => Ok(None),
        1 => {
            let pairs = r.read_u64::<LittleEndian>()?;
            if pairs > MAX_METADATA_PAIRS {
                return Err(Error::Format(format!("too many metadata pairs {}", pairs)));
            }
            let mut metadata = ImageMetadata::default();
            for _ in 0..pairs {
                let key = read_string(r)?;
                let value = read_string(r)?;
                metadata.entries.push((key, value));
            }
            Ok(Some(metadata))
        }
        flag => Err(Error::Format(format!("invalid metadata flag {}", flag))),
    }
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    write_bytes(w, s.as_bytes())
}

pub fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let bytes = read_bytes(r)?;
    String::from_utf8(bytes).map_err(|e| Error::Format(format!("invalid UTF-8 string: {}", e)))
}

/// Paths are stored in the platform's native encoding, raw bytes on Unix.
pub fn write_path<W: Write>(w: &mut W, path: &Path) -> Result<()> {
    write_bytes(w, path.as_os_str().as_encoded_bytes())
}

#[cfg(unix)]
pub fn read_path<R: Read>(r: &mut R) -> Result<Path> {
    use std::os::unix::ffi::OsStrExt;
    let bytes = read_bytes(r)?;
    Ok(Path::from_os(std::ffi::OsStr::from_bytes(&bytes)))
}

#[cfg(not(unix))]
pub fn read_path<R: Read>(r: &mut R) -> Result<Path> {
    Ok(Path::new(&read_string(r)?))
}

fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> Result<()> {
    w.write_u64::<LittleEndian>(bytes.len() as u64)?;
    w.write_all(bytes)?;
    Ok(())
}

fn read_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = r.read_u64::<LittleEndian>()?;
    if len > MAX_STRING_LEN {
        return Err(Error::Format(format!("string length {} too large", len)));
    }
    let mut bytes = vec![0u8; len as usize];
    r.read_exact(&mut bytes)?;
    Ok(bytes)
}
