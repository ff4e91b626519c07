//! Archive index and on-demand entry decoding

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::DeflateDecoder;
use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::error::PakError;
use crate::key::DecryptKey;
use crate::read::{read_u16, read_u16_or_eof};
use crate::record::{Compression, DirHeader, EndHeader, FileHeader};
use crate::{PAK_SIGNATURE, RECORD_DIR, RECORD_END, RECORD_FILE, crc32, normalize_name};

/// One file entry of an archive
#[derive(Debug, Clone)]
pub struct PakEntry {
    /// Normalized name, including the archive prefix
    pub name: String,
    pub compression: Compression,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub extra_len: u16,
    /// Offset of the record signature
    pub header_offset: u64,
    /// Offset of the extra field (the body follows it)
    pub body_offset: u64,
}

impl PakEntry {
    fn body_size(&self) -> usize {
        self.extra_len as usize + self.compressed_size as usize
    }
}

/// An opened `.pak` archive
///
/// The index is built once at open time and is immutable afterwards.
/// `unpack` may be called from several threads; reads of the underlying
/// file are serialized, decryption and inflation are not.
pub struct PakArchive {
    path: PathBuf,
    file: Mutex<BufReader<File>>,
    entries: Vec<PakEntry>,
    index: HashMap<String, usize>,
    key: Option<DecryptKey>,
}

impl std::fmt::Debug for PakArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakArchive")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("key", &self.key.as_ref().map(DecryptKey::name))
            .finish()
    }
}

impl PakArchive {
    /// Open an archive; entry names carry no prefix
    pub fn open(path: impl AsRef<Path>, keys: &[DecryptKey]) -> Result<Self, PakError> {
        Self::open_prefixed(path, String::new(), keys)
    }

    /// Open an archive found while scanning `root`
    ///
    /// Entry names are prefixed with the archive's directory relative to
    /// `root`, so names match regardless of which archive holds them.
    pub fn open_with_prefix(
        path: impl AsRef<Path>,
        root: &Path,
        keys: &[DecryptKey],
    ) -> Result<Self, PakError> {
        let prefix = archive_prefix(path.as_ref(), root);
        Self::open_prefixed(path, prefix, keys)
    }

    fn open_prefixed(
        path: impl AsRef<Path>,
        prefix: String,
        keys: &[DecryptKey],
    ) -> Result<Self, PakError> {
        let path = path.as_ref().to_path_buf();
        let mut reader = BufReader::new(File::open(&path)?);
        let entries = read_index(&mut reader, &prefix).map_err(|e| match e {
            PakError::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
                PakError::Format("truncated record".into())
            }
            other => other,
        })?;

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.name.clone(), i))
            .collect();

        let mut archive = Self {
            path,
            file: Mutex::new(reader),
            entries,
            index,
            key: None,
        };
        archive.key = archive.detect_key(keys)?;
        Ok(archive)
    }

    /// Pick the key that decodes the first unpackable entry
    fn detect_key(&self, keys: &[DecryptKey]) -> Result<Option<DecryptKey>, PakError> {
        let Some(probe) = self
            .entries
            .iter()
            .find(|e| !matches!(e.compression, Compression::Unsupported(_)))
        else {
            return Ok(None);
        };

        let body = self.read_body(probe)?;
        for key in keys {
            match decode_body(probe, body.clone(), key) {
                Ok(_) => {
                    tracing::debug!(archive = ?self.path, key = key.name(), "decryption key detected");
                    return Ok(Some(key.clone()));
                }
                Err(e) => tracing::trace!(key = key.name(), "key rejected: {e}"),
            }
        }
        Err(PakError::KeyUnresolved)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the detected key, if the archive has any entries
    pub fn key_name(&self) -> Option<&str> {
        self.key.as_ref().map(DecryptKey::name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in archive order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn entries(&self) -> &[PakEntry] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn entry(&self, name: &str) -> Option<&PakEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Decrypt and decompress one entry
    ///
    /// Returns `Ok(None)` when the archive has no entry of that name.
    pub fn unpack(&self, name: &str) -> Result<Option<Vec<u8>>, PakError> {
        match self.entry(name) {
            Some(entry) => self.unpack_entry(entry).map(Some),
            None => Ok(None),
        }
    }

    pub fn unpack_entry(&self, entry: &PakEntry) -> Result<Vec<u8>, PakError> {
        if let Compression::Unsupported(method) = entry.compression {
            return Err(PakError::UnsupportedMethod {
                name: entry.name.clone(),
                method,
            });
        }
        let key = self.key.as_ref().ok_or(PakError::KeyUnresolved)?;
        let body = self.read_body(entry)?;
        decode_body(entry, body, key)
    }

    fn read_body(&self, entry: &PakEntry) -> Result<Vec<u8>, PakError> {
        let mut body = vec![0u8; entry.body_size()];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(entry.body_offset))?;
        file.read_exact(&mut body)?;
        Ok(body)
    }
}

/// Walk the records sequentially and collect file entries
fn read_index<R: Read + Seek>(reader: &mut R, prefix: &str) -> Result<Vec<PakEntry>, PakError> {
    let mut entries = Vec::new();
    loop {
        let offset = reader.stream_position()?;
        let Some(signature) = read_u16_or_eof(reader)? else {
            return Err(PakError::Format(format!(
                "archive ends at offset {offset} without an end record"
            )));
        };
        if signature != PAK_SIGNATURE {
            return Err(PakError::UnknownSignature { signature, offset });
        }

        match read_u16(reader)? {
            RECORD_FILE => {
                let header = FileHeader::read(reader)?;
                let body_offset = reader.stream_position()?;
                reader.seek(SeekFrom::Current(header.body_size() as i64))?;

                let raw_name = String::from_utf8_lossy(&header.name);
                entries.push(PakEntry {
                    name: format!("{prefix}{}", normalize_name(&raw_name)),
                    compression: header.compression,
                    crc32: header.crc32,
                    compressed_size: header.compressed_size,
                    uncompressed_size: header.uncompressed_size,
                    extra_len: header.extra_len,
                    header_offset: offset,
                    body_offset,
                });
            }
            RECORD_DIR => {
                let header = DirHeader::read(reader)?;
                reader.seek(SeekFrom::Current(header.body_size() as i64))?;
            }
            RECORD_END => {
                let end = EndHeader::read(reader)?;
                let mut probe = [0u8; 1];
                if reader.read(&mut probe)? != 0 {
                    return Err(PakError::Format(format!(
                        "data after end record at offset {offset}"
                    )));
                }
                if end.total_count as usize != entries.len() {
                    tracing::debug!(
                        declared = end.total_count,
                        found = entries.len(),
                        "end record entry count differs"
                    );
                }
                return Ok(entries);
            }
            kind => return Err(PakError::UnknownRecord { kind, offset }),
        }
    }
}

/// Decrypt, inflate and verify one body (extra field followed by data)
fn decode_body(entry: &PakEntry, mut body: Vec<u8>, key: &DecryptKey) -> Result<Vec<u8>, PakError> {
    let mismatch = |reason: String| PakError::IntegrityMismatch {
        name: entry.name.clone(),
        reason,
    };

    let (extra, data) = body.split_at_mut(entry.extra_len as usize);
    key.apply(data, entry.compressed_size);

    let payload = match entry.compression {
        Compression::Store => data.to_vec(),
        Compression::Deflate => {
            // one byte past the declared size is enough to detect overruns
            let limit = entry.uncompressed_size as u64 + 1;
            let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
            DeflateDecoder::new(&data[..])
                .take(limit)
                .read_to_end(&mut out)
                .map_err(|e| mismatch(format!("inflate failed: {e}")))?;
            out
        }
        Compression::Unsupported(method) => {
            return Err(PakError::UnsupportedMethod {
                name: entry.name.clone(),
                method,
            });
        }
    };

    if payload.len() != entry.uncompressed_size as usize {
        return Err(mismatch(format!(
            "decoded {} bytes, expected {}",
            payload.len(),
            entry.uncompressed_size
        )));
    }
    let checksum = crc32(&payload);
    if checksum != entry.crc32 {
        return Err(mismatch(format!(
            "crc32 0x{checksum:08X}, expected 0x{:08X}",
            entry.crc32
        )));
    }

    let mut out = Vec::with_capacity(extra.len() + payload.len());
    out.extend_from_slice(extra);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Name prefix for an archive: its directory relative to `root`
///
/// Lower-case, forward slashes, trailing `/`; empty when the archive sits
/// directly in `root` or outside of it.
pub fn archive_prefix(pak_path: &Path, root: &Path) -> String {
    let Some(parent) = pak_path.parent() else {
        return String::new();
    };
    let relative = match parent.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => match (parent.canonicalize(), root.canonicalize()) {
            (Ok(p), Ok(r)) => match p.strip_prefix(&r) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => return String::new(),
            },
            _ => return String::new(),
        },
    };

    let mut prefix = String::new();
    for component in relative.components() {
        prefix.push_str(&component.as_os_str().to_string_lossy().to_lowercase());
        prefix.push('/');
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PakWriter;

    fn key(seed: u8) -> DecryptKey {
        let table = (0..1056u32)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect();
        DecryptKey::new(format!("key{seed}"), table, 0x3FF).unwrap()
    }

    fn write_pak(dir: &Path, name: &str, key: &DecryptKey, files: &[(&str, &[u8], bool)]) -> PathBuf {
        let mut writer = PakWriter::new(key.clone());
        for (entry, data, deflate) in files {
            if *deflate {
                writer.add_deflated(entry, data).unwrap();
            } else {
                writer.add_stored(entry, data);
            }
        }
        let path = dir.join(name);
        std::fs::write(&path, writer.finish()).unwrap();
        path
    }

    #[test]
    fn test_open_and_unpack() {
        let dir = tempfile::tempdir().unwrap();
        let k = key(1);
        let big = vec![7u8; 4000];
        let path = write_pak(
            dir.path(),
            "a.pak",
            &k,
            &[
                ("Objects\\Rock.CGF", b"rock bytes", false),
                ("objects/big.cgf", &big, true),
            ],
        );

        let pak = PakArchive::open(&path, std::slice::from_ref(&k)).unwrap();
        assert_eq!(pak.len(), 2);
        assert_eq!(
            pak.names().collect::<Vec<_>>(),
            vec!["objects/rock.cgf", "objects/big.cgf"]
        );
        assert_eq!(pak.unpack("objects/rock.cgf").unwrap().unwrap(), b"rock bytes");
        assert_eq!(pak.unpack("objects/big.cgf").unwrap().unwrap(), big);
        assert!(pak.unpack("objects/none.cgf").unwrap().is_none());
    }

    #[test]
    fn test_key_detection_picks_matching_key() {
        let dir = tempfile::tempdir().unwrap();
        let (k1, k2) = (key(1), key(2));
        let data: Vec<u8> = (0..200u32).map(|i| (i * 13) as u8).collect();
        let path = write_pak(dir.path(), "a.pak", &k2, &[("x.bin", &data, true)]);

        let pak = PakArchive::open(&path, &[k1.clone(), k2.clone()]).unwrap();
        assert_eq!(pak.key_name(), Some("key2"));
        assert_eq!(pak.unpack("x.bin").unwrap().unwrap(), data);

        // the wrong key alone must fail the CRC check
        let err = PakArchive::open(&path, &[k1]).unwrap_err();
        assert!(matches!(err, PakError::KeyUnresolved));
    }

    #[test]
    fn test_stored_entry_with_wrong_key_fails_crc() {
        let dir = tempfile::tempdir().unwrap();
        let data = b"stored entries fail on checksum rather than inflate".to_vec();
        let path = write_pak(dir.path(), "a.pak", &key(5), &[("s.txt", &data, false)]);
        assert!(matches!(
            PakArchive::open(&path, &[key(6)]).unwrap_err(),
            PakError::KeyUnresolved
        ));
    }

    #[test]
    fn test_corrupted_entry_is_fatal_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let k = key(3);
        let body = vec![0x5Au8; 96];
        let path = write_pak(
            dir.path(),
            "a.pak",
            &k,
            &[("good.cgf", &body, false), ("bad.cgf", &body, false)],
        );

        let pak = PakArchive::open(&path, std::slice::from_ref(&k)).unwrap();
        let bad = pak.entry("bad.cgf").unwrap();
        let at = (bad.body_offset + 63) as usize;
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[at] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let pak = PakArchive::open(&path, &[k]).unwrap();
        let err = pak.unpack("bad.cgf").unwrap_err();
        assert!(matches!(err, PakError::IntegrityMismatch { .. }), "{err}");
        assert!(err.is_fatal_for_archive());
    }

    #[test]
    fn test_bad_signature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pak");
        std::fs::write(&path, b"PK\x03\x04garbage").unwrap();
        let err = PakArchive::open(&path, &[key(1)]).unwrap_err();
        assert!(matches!(err, PakError::UnknownSignature { signature: 0x4B50, offset: 0 }));
    }

    #[test]
    fn test_trailing_data_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let k = key(1);
        let path = write_pak(dir.path(), "a.pak", &k, &[("a", b"abc", false)]);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.push(0);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            PakArchive::open(&path, &[k]).unwrap_err(),
            PakError::Format(_)
        ));
    }

    #[test]
    fn test_missing_end_record() {
        let dir = tempfile::tempdir().unwrap();
        let k = key(1);
        let path = write_pak(dir.path(), "a.pak", &k, &[("a", b"abc", false)]);
        let bytes = std::fs::read(&path).unwrap();
        // cut right after the first file record
        let cut = 4 + 26 + 1 + 3;
        std::fs::write(&path, &bytes[..cut]).unwrap();
        assert!(matches!(
            PakArchive::open(&path, &[k]).unwrap_err(),
            PakError::Format(_)
        ));
    }

    #[test]
    fn test_archive_prefix() {
        let root = Path::new("/client");
        assert_eq!(
            archive_prefix(Path::new("/client/Levels/Common/Mesh_Meshes_000.pak"), root),
            "levels/common/"
        );
        assert_eq!(archive_prefix(Path::new("/client/a.pak"), root), "");
    }

    #[test]
    fn test_open_with_prefix_prefixes_names() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("Objects").join("NPC");
        std::fs::create_dir_all(&sub).unwrap();
        let k = key(3);
        let path = write_pak(&sub, "Mesh_Meshes_000.pak", &k, &[("door.cga", b"d", false)]);
        let pak = PakArchive::open_with_prefix(&path, dir.path(), &[k]).unwrap();
        assert!(pak.contains("objects/npc/door.cga"));
    }
}
