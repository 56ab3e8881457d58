/// A chunk of image data for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based chunk index.
    pub index: u64,
    /// Byte offset within the image.
    pub offset: u64,
    /// Raw chunk data (at most one chunk size, shorter only for the last chunk).
    pub data: Vec<u8>,
}
