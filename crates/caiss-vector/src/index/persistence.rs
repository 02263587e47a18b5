//! HNSW model file codec.
//!
//! A model is one little-endian file:
//!
//! ```text
//! magic "CAISSHNW" | major u16 | minor u16 | header_len u32
//! header (header_len bytes; unknown trailing fields are skipped)
//! records    x vector_count: flags u8 | id tag u8 | id | dimension x f32
//! adjacency  x vector_count: level u8 | per layer: count u32 | count x u32
//! crc32 u32 over every preceding byte
//! ```
//!
//! The preamble and header are validated (magic, major version, dimension, metric)
//! before any record or graph memory is allocated. Files are written to a sibling
//! temporary file, synced, then renamed over the target.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::distance::DistanceMetric;
use crate::error::{Result, VectorError};
use crate::store::VectorStore;
use crate::types::{Embedding, ExternalId};

use super::config::{HnswConfig, NeighborSelection, MAX_LEVEL_CAP};
use super::graph::{GraphNode, HnswGraph};
use super::hnsw::HnswIndex;

/// Magic number at the start of model files.
pub const MODEL_MAGIC: [u8; 8] = *b"CAISSHNW";

/// Major format version; files with a different major are rejected.
pub const FORMAT_MAJOR: u16 = 1;

/// Minor format version; newer minors only append header fields.
pub const FORMAT_MINOR: u16 = 0;

/// Algorithm code for HNSW models.
pub const ALGORITHM_HNSW: u8 = 0;

const PREAMBLE_LEN: usize = 16;
/// Bytes of header fields understood by this version.
const HEADER_V1_LEN: u32 = 48;
const MAX_HEADER_LEN: u32 = 64 * 1024;
const NO_ENTRY_POINT: u32 = u32::MAX;

const FLAG_NORMALIZE: u8 = 1;
const FLAG_DIVERSE: u8 = 1 << 1;
const FLAG_SEEDED: u8 = 1 << 2;

const RECORD_TOMBSTONE: u8 = 1;

/// Model-level settings stored alongside the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelOptions {
    /// Vectors were L2-normalized before insertion.
    pub normalize: bool,
}

/// Decoded model header.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelHeader {
    /// Major format version.
    pub major: u16,
    /// Minor format version.
    pub minor: u16,
    /// Vector dimensionality.
    pub dimension: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Algorithm code.
    pub algorithm: u8,
    /// Model-level settings.
    pub options: ModelOptions,
    /// Number of records, tombstoned included.
    pub vector_count: u64,
    /// Index configuration.
    pub config: HnswConfig,
    /// Top layer of the graph.
    pub max_layer: usize,
    /// Entry point node, if the graph is non-empty.
    pub entry_point: Option<u32>,
}

/// What a caller requires of a model before it is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelExpectation {
    /// Required dimensionality.
    pub dimension: usize,
    /// Required metric, if any.
    pub metric: Option<DistanceMetric>,
}

/// A loaded model.
#[derive(Debug)]
pub struct LoadedModel {
    /// The decoded header.
    pub header: ModelHeader,
    /// The restored index.
    pub index: HnswIndex,
}

// ============================================================================
// CRC-32 (IEEE)
// ============================================================================

const CRC_POLY: u32 = 0xEDB8_8320;

const CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        #[allow(clippy::cast_possible_truncation)]
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ CRC_POLY } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Incremental CRC-32 using the IEEE polynomial.
#[derive(Debug, Clone, Copy)]
struct Crc32(u32);

impl Crc32 {
    const fn new() -> Self {
        Self(!0)
    }

    fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.0 = CRC_TABLE[((self.0 ^ u32::from(byte)) & 0xFF) as usize] ^ (self.0 >> 8);
        }
    }

    const fn finish(self) -> u32 {
        !self.0
    }
}

/// Calculate a CRC-32 checksum in one shot.
#[must_use]
pub fn crc32_checksum(data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(data);
    crc.finish()
}

/// Writer that checksums everything passing through it.
struct ChecksumWriter<W: Write> {
    inner: W,
    crc: Crc32,
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.crc.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

// ============================================================================
// Encoding
// ============================================================================

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| VectorError::format(format!("{what} does not fit in u32: {value}")))
}

fn encode_header(
    index: &HnswIndex,
    options: ModelOptions,
    entry: Option<(u32, usize)>,
    count: usize,
) -> Result<Vec<u8>> {
    let config = index.config();
    let metric = index.metric().code().ok_or_else(|| {
        VectorError::InvalidConfig("an index with a custom distance cannot be saved".into())
    })?;
    let (entry_point, max_layer) = match entry {
        Some((entry, level)) => (entry, level),
        None => (NO_ENTRY_POINT, 0),
    };

    let mut flags = 0u8;
    if options.normalize {
        flags |= FLAG_NORMALIZE;
    }
    if config.selection == NeighborSelection::Diverse {
        flags |= FLAG_DIVERSE;
    }
    if config.seed.is_some() {
        flags |= FLAG_SEEDED;
    }

    let mut bytes = Vec::with_capacity(PREAMBLE_LEN + HEADER_V1_LEN as usize);
    bytes.extend_from_slice(&MODEL_MAGIC);
    bytes.extend_from_slice(&FORMAT_MAJOR.to_le_bytes());
    bytes.extend_from_slice(&FORMAT_MINOR.to_le_bytes());
    bytes.extend_from_slice(&HEADER_V1_LEN.to_le_bytes());

    bytes.extend_from_slice(&to_u32(index.dimension(), "dimension")?.to_le_bytes());
    bytes.push(metric);
    bytes.push(ALGORITHM_HNSW);
    bytes.push(flags);
    bytes.push(0); // reserved
    bytes.extend_from_slice(&(count as u64).to_le_bytes());
    bytes.extend_from_slice(&to_u32(config.m, "m")?.to_le_bytes());
    bytes.extend_from_slice(&to_u32(config.m_max0, "m_max0")?.to_le_bytes());
    bytes.extend_from_slice(&to_u32(config.ef_construction, "ef_construction")?.to_le_bytes());
    bytes.extend_from_slice(&to_u32(config.ef_search, "ef_search")?.to_le_bytes());
    bytes.extend_from_slice(&to_u32(max_layer, "max_layer")?.to_le_bytes());
    bytes.extend_from_slice(&entry_point.to_le_bytes());
    bytes.extend_from_slice(&config.seed.unwrap_or(0).to_le_bytes());

    debug_assert_eq!(bytes.len(), PREAMBLE_LEN + HEADER_V1_LEN as usize);
    Ok(bytes)
}

fn write_model<W: Write>(out: &mut W, index: &HnswIndex, options: ModelOptions) -> Result<usize> {
    // Entry point first, then records, then nodes: every index the entry point or an
    // adjacency list can name is then covered by `count`.
    // A node still being linked may sit above the entry point's layer; its upper
    // layers are cut at `max_layer` and nothing is written before the first entry.
    let entry = index.graph().entry_point();
    let records = index.store().snapshot();
    let nodes = index.graph().nodes();
    let (count, max_layer) = match entry {
        Some((e, level)) => {
            let count = records.len().min(nodes.len());
            if e as usize >= count {
                return Err(VectorError::format("entry point outside the snapshot"));
            }
            (count, level)
        }
        None => (0, 0),
    };

    out.write_all(&encode_header(index, options, entry, count)?)?;

    for record in &records[..count] {
        let flags = if record.is_tombstoned() { RECORD_TOMBSTONE } else { 0 };
        out.write_all(&[flags, record.external_id().tag()])?;
        match record.external_id() {
            ExternalId::Int(id) => out.write_all(&id.to_le_bytes())?,
            ExternalId::Key(key) => {
                out.write_all(&to_u32(key.len(), "key length")?.to_le_bytes())?;
                out.write_all(key.as_bytes())?;
            }
        }
        out.write_all(&record.embedding().to_bytes())?;
    }

    for node in &nodes[..count] {
        let level = node.level().min(max_layer);
        #[allow(clippy::cast_possible_truncation)] // levels are capped at MAX_LEVEL_CAP
        out.write_all(&[level as u8])?;
        for layer in 0..=level {
            let neighbors: Vec<u32> =
                node.neighbors(layer).into_iter().filter(|&n| (n as usize) < count).collect();
            out.write_all(&to_u32(neighbors.len(), "neighbor count")?.to_le_bytes())?;
            for n in neighbors {
                out.write_all(&n.to_le_bytes())?;
            }
        }
    }

    Ok(count)
}

/// Sibling temporary path used while writing `path`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `index` to `path`, replacing any existing file atomically.
///
/// # Errors
///
/// Returns [`VectorError::Io`] on filesystem failures.
pub fn save(index: &HnswIndex, path: &Path, options: ModelOptions) -> Result<()> {
    let tmp = temp_path(path);
    let result = (|| -> Result<usize> {
        let file = File::create(&tmp)?;
        let mut out = ChecksumWriter { inner: BufWriter::new(file), crc: Crc32::new() };
        let count = write_model(&mut out, index, options)?;
        let crc = out.crc.finish();
        out.inner.write_all(&crc.to_le_bytes())?;
        let file = out.inner.into_inner().map_err(std::io::IntoInnerError::into_error)?;
        file.sync_all()?;
        Ok(count)
    })();

    match result {
        Ok(count) => {
            fs::rename(&tmp, path)?;
            info!(path = %path.display(), records = count, "model saved");
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Bounds-checked little-endian reader over a byte slice.
struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(VectorError::format(format!("truncated model: reading {what}")));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array(what)?))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array(what)?))
    }
}

fn read_exact_or_truncated(reader: &mut impl Read, buf: &mut [u8], what: &str) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(VectorError::format(format!("truncated model: reading {what}")))
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse the preamble and header. Returns the header and the raw bytes consumed.
fn read_header_bytes(reader: &mut impl Read) -> Result<(ModelHeader, Vec<u8>)> {
    let mut preamble = [0u8; PREAMBLE_LEN];
    read_exact_or_truncated(reader, &mut preamble, "preamble")?;

    let mut pre = ByteReader::new(&preamble);
    let magic: [u8; 8] = pre.array("magic")?;
    if magic != MODEL_MAGIC {
        return Err(VectorError::format(format!("invalid magic number: {magic:?}")));
    }
    let major = pre.u16("major version")?;
    let minor = pre.u16("minor version")?;
    if major != FORMAT_MAJOR {
        return Err(VectorError::format(format!(
            "unsupported model version: {major}.{minor}, expected {FORMAT_MAJOR}.x"
        )));
    }
    let header_len = pre.u32("header length")?;
    if !(HEADER_V1_LEN..=MAX_HEADER_LEN).contains(&header_len) {
        return Err(VectorError::format(format!("invalid header length: {header_len}")));
    }

    let mut header_bytes = vec![0u8; header_len as usize];
    read_exact_or_truncated(reader, &mut header_bytes, "header")?;

    let mut r = ByteReader::new(&header_bytes);
    let dimension = r.u32("dimension")? as usize;
    let metric_code = r.u8("metric")?;
    let metric = DistanceMetric::from_code(metric_code)
        .ok_or_else(|| VectorError::format(format!("unknown metric code {metric_code}")))?;
    let algorithm = r.u8("algorithm")?;
    let flags = r.u8("flags")?;
    let _reserved = r.u8("reserved")?;
    let vector_count = r.u64("vector count")?;
    let m = r.u32("m")? as usize;
    let m_max0 = r.u32("m_max0")? as usize;
    let ef_construction = r.u32("ef_construction")? as usize;
    let ef_search = r.u32("ef_search")? as usize;
    let max_layer = r.u32("max layer")? as usize;
    let entry_point = r.u32("entry point")?;
    let seed = r.u64("seed")?;
    // Anything after the known fields belongs to a newer minor version

    if dimension == 0 {
        return Err(VectorError::format("model dimension is zero"));
    }
    if algorithm != ALGORITHM_HNSW {
        return Err(VectorError::format(format!("unsupported algorithm code {algorithm}")));
    }
    if max_layer > MAX_LEVEL_CAP {
        return Err(VectorError::format(format!("max layer {max_layer} exceeds {MAX_LEVEL_CAP}")));
    }

    let mut config = HnswConfig::new(m).with_m_max0(m_max0).with_ef_construction(ef_construction).with_ef_search(ef_search);
    if flags & FLAG_DIVERSE != 0 {
        config = config.with_selection(NeighborSelection::Diverse);
    }
    if flags & FLAG_SEEDED != 0 {
        config = config.with_seed(seed);
    }
    config.validate().map_err(|e| VectorError::format(format!("bad index parameters: {e}")))?;

    let entry_point = (entry_point != NO_ENTRY_POINT).then_some(entry_point);
    if entry_point.is_some_and(|e| u64::from(e) >= vector_count) {
        return Err(VectorError::format("entry point out of range"));
    }
    if entry_point.is_none() && vector_count > 0 {
        return Err(VectorError::format("non-empty model without entry point"));
    }

    let header = ModelHeader {
        major,
        minor,
        dimension,
        metric,
        algorithm,
        options: ModelOptions { normalize: flags & FLAG_NORMALIZE != 0 },
        vector_count,
        config,
        max_layer,
        entry_point,
    };

    let mut raw = preamble.to_vec();
    raw.extend_from_slice(&header_bytes);
    Ok((header, raw))
}

/// Read only the header of a model file.
///
/// # Errors
///
/// Returns [`VectorError::Format`] for a bad magic, version, or header and
/// [`VectorError::Io`] if the file cannot be read.
pub fn read_header(path: &Path) -> Result<ModelHeader> {
    let mut reader = BufReader::new(File::open(path)?);
    read_header_bytes(&mut reader).map(|(header, _)| header)
}

fn check_expectation(header: &ModelHeader, expect: &ModelExpectation) -> Result<()> {
    if header.dimension != expect.dimension {
        return Err(VectorError::ModelMismatch {
            field: "dimension",
            expected: expect.dimension.to_string(),
            found: header.dimension.to_string(),
        });
    }
    if let Some(metric) = expect.metric {
        if header.metric != metric {
            return Err(VectorError::ModelMismatch {
                field: "metric",
                expected: format!("{metric:?}"),
                found: format!("{:?}", header.metric),
            });
        }
    }
    Ok(())
}

fn decode_body(header: &ModelHeader, body: &[u8]) -> Result<HnswIndex> {
    let count = usize::try_from(header.vector_count)
        .map_err(|_| VectorError::format("vector count too large"))?;
    let vector_bytes = header.dimension * 4;
    let mut r = ByteReader::new(body);

    // Every record needs at least its two flag bytes, an id and a vector
    if count.saturating_mul(vector_bytes + 6) > r.remaining() {
        return Err(VectorError::format("truncated model: record section"));
    }

    let store = VectorStore::new(header.dimension);
    let mut records = Vec::with_capacity(count);
    let mut live_ids = HashSet::new();
    for _ in 0..count {
        let flags = r.u8("record flags")?;
        let external_id = match r.u8("id tag")? {
            0 => ExternalId::Int(r.u64("integer id")?),
            1 => {
                let len = r.u32("key length")? as usize;
                let key = std::str::from_utf8(r.take(len, "key")?)
                    .map_err(|_| VectorError::format("key is not valid UTF-8"))?;
                ExternalId::Key(key.to_owned())
            }
            tag => return Err(VectorError::format(format!("unknown id tag {tag}"))),
        };
        let vector = Embedding::from_bytes(r.take(vector_bytes, "vector")?)
            .map_err(|e| VectorError::format(format!("bad vector: {e}")))?;
        let tombstoned = flags & RECORD_TOMBSTONE != 0;
        if !tombstoned && !live_ids.insert(external_id.clone()) {
            return Err(VectorError::format(format!("duplicate live id {external_id}")));
        }
        let (_, record) = store.push_restored(external_id, vector, tombstoned)?;
        records.push(record);
    }

    let graph = HnswGraph::new();
    let mut dangling = 0usize;
    for record in records {
        let level = r.u8("node level")? as usize;
        if level > header.max_layer {
            return Err(VectorError::format(format!(
                "node level {level} exceeds max layer {}",
                header.max_layer
            )));
        }
        let node = GraphNode::new(record, level);
        for layer in 0..=level {
            let len = r.u32("neighbor count")? as usize;
            if len.saturating_mul(4) > r.remaining() {
                return Err(VectorError::format("truncated model: adjacency"));
            }
            let mut neighbors = Vec::with_capacity(len);
            for _ in 0..len {
                let n = r.u32("neighbor")?;
                if (n as usize) < count {
                    neighbors.push(n);
                } else {
                    dangling += 1;
                }
            }
            node.set_neighbors(layer, neighbors);
        }
        graph.push(node);
    }

    if r.remaining() != 0 {
        return Err(VectorError::format(format!("{} unexpected trailing bytes", r.remaining())));
    }
    if dangling > 0 {
        warn!(dangling, "skipped neighbor entries pointing outside the model");
    }

    if let Some(entry) = header.entry_point {
        let level = graph.node(entry).map_or(0, |n| n.level());
        if level != header.max_layer {
            return Err(VectorError::format("entry point is not on the top layer"));
        }
        graph.set_entry_point(Some((entry, level)));
    }

    HnswIndex::from_parts(header.dimension, header.metric, header.config.clone(), store, graph)
}

/// Load a model, checking it against `expect` before decoding any records.
///
/// # Errors
///
/// - [`VectorError::Format`]: bad magic, unsupported major version, corrupt or
///   truncated content, checksum mismatch
/// - [`VectorError::ModelMismatch`]: dimension or metric differs from `expect`
/// - [`VectorError::Io`]: the file cannot be read
pub fn load(path: &Path, expect: &ModelExpectation) -> Result<LoadedModel> {
    let mut reader = BufReader::new(File::open(path)?);
    let (header, raw_header) = read_header_bytes(&mut reader)?;
    check_expectation(&header, expect)?;

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    if rest.len() < 4 {
        return Err(VectorError::format("truncated model: checksum"));
    }
    let (body, trailer) = rest.split_at(rest.len() - 4);

    let mut crc = Crc32::new();
    crc.update(&raw_header);
    crc.update(body);
    let mut stored = [0u8; 4];
    stored.copy_from_slice(trailer);
    let stored = u32::from_le_bytes(stored);
    let computed = crc.finish();
    if stored != computed {
        return Err(VectorError::format(format!(
            "checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
        )));
    }

    let index = decode_body(&header, body)?;
    info!(
        path = %path.display(),
        records = header.vector_count,
        live = index.len(),
        version = %format!("{}.{}", header.major, header.minor),
        "model loaded"
    );
    Ok(LoadedModel { header, index })
}
