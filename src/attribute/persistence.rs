//! Binary save/load for boolean attributes
//!
//! Layout, little-endian, no compression:
//!
//! ```text
//! offset 0: u32  doc_count   (committed doc id limit at save time)
//! offset 4: ceil(doc_count / 8) bytes of packed bits, bit i = doc i
//! ```
//!
//! An empty source means "no data" and is not an error. A payload whose
//! length disagrees with the declared doc count is corruption and is
//! reported as FATAL; the attribute is left untouched.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::bitvector::BitVector;
use super::errors::{AttributeError, AttributeResult};
use super::single_bool::SingleBoolAttribute;
use crate::observability::{log_event_with_fields, Event};

/// Fixed per-save overhead reserved for headers
pub const HEADER_RESERVE_BYTES: u64 = 4096;

/// File suffix of the data file
pub const DAT_SUFFIX: &str = ".dat";

const DOC_COUNT_BYTES: usize = 4;

/// Estimated bytes a save of `doc_count` docs needs, for capacity planning.
pub fn estimated_save_byte_size(doc_count: u32) -> u64 {
    HEADER_RESERVE_BYTES + DOC_COUNT_BYTES as u64 + BitVector::packed_len(doc_count) as u64
}

/// Destination for a save.
pub trait SaveTarget {
    /// Whether the target expects dictionary-enumerated data
    fn is_enumerated(&self) -> bool {
        false
    }

    /// Sequential writer for the data file
    fn dat_writer(&mut self) -> AttributeResult<&mut dyn Write>;

    /// Make everything written durable
    fn finish(&mut self) -> AttributeResult<()> {
        Ok(())
    }
}

/// In-memory target, mostly for tests and tooling.
#[derive(Debug, Default, Clone)]
pub struct MemorySaveTarget {
    data: Vec<u8>,
    enumerated: bool,
}

impl MemorySaveTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// A target that asks for enumerated data
    pub fn enumerated() -> Self {
        Self {
            data: Vec::new(),
            enumerated: true,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl SaveTarget for MemorySaveTarget {
    fn is_enumerated(&self) -> bool {
        self.enumerated
    }

    fn dat_writer(&mut self) -> AttributeResult<&mut dyn Write> {
        Ok(&mut self.data)
    }
}

/// Writes `<dir>/<name>.dat`, creating `dir` if missing. `finish` fsyncs.
#[derive(Debug)]
pub struct FileSaveTarget {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSaveTarget {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            path: dat_path(dir, name),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> AttributeResult<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AttributeError::io(
                    format!("Failed to create directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| {
                AttributeError::io(
                    format!("Failed to open data file: {}", self.path.display()),
                    e,
                )
            })
    }
}

impl SaveTarget for FileSaveTarget {
    fn dat_writer(&mut self) -> AttributeResult<&mut dyn Write> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => BufWriter::new(self.open()?),
        };
        Ok(self.writer.insert(writer))
    }

    fn finish(&mut self) -> AttributeResult<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .flush()
            .map_err(|e| AttributeError::io("Failed to flush data file", e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| AttributeError::io("Failed to fsync data file", e))
    }
}

/// Path of the data file for attribute `name` in `dir`
pub fn dat_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}{}", name, DAT_SUFFIX))
}

impl SingleBoolAttribute {
    /// Save the committed docs to `target`. Returns bytes written.
    ///
    /// # Panics
    ///
    /// When `target` expects enumerated data; booleans are never enumerated.
    pub fn save(&self, target: &mut dyn SaveTarget) -> AttributeResult<u64> {
        assert!(
            !target.is_enumerated(),
            "boolean attribute '{}' cannot be saved enumerated",
            self.name()
        );

        let doc_count = self.committed_doc_id_limit();
        let payload = self.bit_vector().to_packed_bytes(doc_count);
        log_event_with_fields(
            Event::SaveBegin,
            &[("attribute", self.name()), ("docs", &doc_count.to_string())],
        );

        let writer = target.dat_writer()?;
        writer
            .write_all(&doc_count.to_le_bytes())
            .map_err(|e| AttributeError::io("Failed to write doc count", e))?;
        writer
            .write_all(&payload)
            .map_err(|e| AttributeError::io("Failed to write packed bits", e))?;
        target.finish()?;

        let bytes = (DOC_COUNT_BYTES + payload.len()) as u64;
        self.metrics().record_save(bytes);
        log_event_with_fields(
            Event::SaveComplete,
            &[
                ("attribute", self.name()),
                ("bytes", &bytes.to_string()),
                ("docs", &doc_count.to_string()),
            ],
        );
        Ok(bytes)
    }

    /// Save to `<dir>/<name>.dat`, returning the file path.
    pub fn save_to_dir(&self, dir: &Path) -> AttributeResult<PathBuf> {
        let mut target = FileSaveTarget::new(dir, self.name());
        self.save(&mut target)?;
        Ok(target.path().to_path_buf())
    }

    /// Replace contents with the data in `reader`.
    ///
    /// Returns `Ok(false)` when the source holds no data; the attribute is
    /// then untouched.
    pub fn load_from_reader<R: Read>(&mut self, mut reader: R) -> AttributeResult<bool> {
        log_event_with_fields(Event::LoadBegin, &[("attribute", self.name())]);

        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| AttributeError::io("Failed to read attribute data", e))?;
        if data.is_empty() {
            log_event_with_fields(Event::LoadNoData, &[("attribute", self.name())]);
            return Ok(false);
        }

        let (doc_count, payload) = self.decode(&data)?;
        let capacity = self.config().grow_strategy.calc_new_capacity(0, doc_count);
        let bits = BitVector::from_packed_bytes(doc_count, payload, capacity);
        self.install_loaded(doc_count, bits);

        self.metrics().increment_loads();
        log_event_with_fields(
            Event::LoadComplete,
            &[
                ("attribute", self.name()),
                ("docs", &doc_count.to_string()),
                ("set_bits", &self.count_set_bits().to_string()),
            ],
        );
        Ok(true)
    }

    /// Load from a data file. A missing file is "no data".
    pub fn load_from_path(&mut self, path: &Path) -> AttributeResult<bool> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log_event_with_fields(
                    Event::LoadNoData,
                    &[
                        ("attribute", self.name()),
                        ("path", &path.display().to_string()),
                    ],
                );
                return Ok(false);
            }
            Err(e) => {
                return Err(AttributeError::io(
                    format!("Failed to open data file: {}", path.display()),
                    e,
                ))
            }
        };
        self.load_from_reader(BufReader::new(file))
    }

    /// Load `<dir>/<name>.dat`
    pub fn load_from_dir(&mut self, dir: &Path) -> AttributeResult<bool> {
        let path = dat_path(dir, self.name());
        self.load_from_path(&path)
    }

    /// Estimated bytes the next save needs
    pub fn estimated_save_byte_size(&self) -> u64 {
        estimated_save_byte_size(self.committed_doc_id_limit())
    }

    fn decode<'a>(&self, data: &'a [u8]) -> AttributeResult<(u32, &'a [u8])> {
        if data.len() < DOC_COUNT_BYTES {
            return Err(self.corruption(
                0,
                format!("header truncated: {} of {} bytes", data.len(), DOC_COUNT_BYTES),
            ));
        }

        let (header, payload) = data.split_at(DOC_COUNT_BYTES);
        let mut raw = [0u8; DOC_COUNT_BYTES];
        raw.copy_from_slice(header);
        let doc_count = u32::from_le_bytes(raw);

        let expected = BitVector::packed_len(doc_count);
        if payload.len() != expected {
            return Err(self.corruption(
                doc_count,
                format!(
                    "payload is {} bytes, {} docs need {}",
                    payload.len(),
                    doc_count,
                    expected
                ),
            ));
        }
        Ok((doc_count, payload))
    }

    fn corruption(&self, doc_count: u32, message: String) -> AttributeError {
        log_event_with_fields(
            Event::DataCorruption,
            &[
                ("attribute", self.name()),
                ("docs", &doc_count.to_string()),
                ("reason", &message),
            ],
        );
        AttributeError::corruption(doc_count, message)
    }
}
