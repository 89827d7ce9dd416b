//! Writer-side configuration: module toggles and the pluggable compressor.

use super::palmdoc;

/// Abstraction over the text-record compression scheme. The default is
/// PalmDOC LZ77; callers may substitute their own by implementing this
/// trait (e.g. to produce uncompressed output for debugging).
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Vec<u8>;

    /// PalmDOC header compression code (§6.5): `1` (uncompressed) or `2`
    /// (PalmDOC). Record 0 needs this to describe which scheme was used.
    fn code(&self) -> u16;
}

/// PalmDOC LZ77 compression (the classic-MOBI default).
#[derive(Debug, Default, Clone, Copy)]
pub struct PalmDocCompressor;

impl Compressor for PalmDocCompressor {
    fn compress(&self, data: &[u8]) -> Vec<u8> {
        palmdoc::compress(data)
    }

    fn code(&self) -> u16 {
        super::writer_record0::PALMDOC
    }
}

/// Passthrough compressor: emits text records uncompressed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn compress(&self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn code(&self) -> u16 {
        super::writer_record0::UNCOMPRESSED
    }
}

/// Configuration toggles for the writer, following the original source's
/// module-level `INDEXING` / `FCIS_FLIS` / `WRITE_PBREAKS` flags -- kept as
/// fields on an explicit config struct rather than globals.
pub struct WriterConfig {
    /// Build and emit the TOC index (CNCX/CTOC + INDX0/INDX1 records).
    pub indexing: bool,
    /// Emit the trailing FLIS/FCIS records before the EOF marker.
    pub fcis_flis: bool,
    /// Emit the page-break side channel in each text record's trailer.
    pub write_pbreaks: bool,
    /// Prefer `file_as` sort-names when joining multiple creators.
    pub prefer_author_sort: bool,
    pub compressor: Box<dyn Compressor>,
}

impl std::fmt::Debug for WriterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterConfig")
            .field("indexing", &self.indexing)
            .field("fcis_flis", &self.fcis_flis)
            .field("write_pbreaks", &self.write_pbreaks)
            .field("prefer_author_sort", &self.prefer_author_sort)
            .finish()
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            indexing: true,
            fcis_flis: true,
            write_pbreaks: true,
            prefer_author_sort: false,
            compressor: Box::new(PalmDocCompressor),
        }
    }
}

impl WriterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indexing(mut self, indexing: bool) -> Self {
        self.indexing = indexing;
        self
    }

    pub fn with_fcis_flis(mut self, fcis_flis: bool) -> Self {
        self.fcis_flis = fcis_flis;
        self
    }

    pub fn with_write_pbreaks(mut self, write_pbreaks: bool) -> Self {
        self.write_pbreaks = write_pbreaks;
        self
    }

    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }
}
