#![no_main]

use apns_feedback_protocol::{ExpiredToken, RecordDecoder};
use arbitrary::Arbitrary;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;

/// A byte stream plus the sizes of the reads that deliver it.
#[derive(Debug, Arbitrary)]
struct FuzzStreamInput {
    data: Vec<u8>,
    /// Chunk sizes, cycled; zero entries are treated as one byte
    chunk_sizes: Vec<u8>,
}

fn decode_all(data: &[u8]) -> Vec<ExpiredToken> {
    let mut decoder = RecordDecoder::new();
    let mut buf = BytesMut::from(data);
    let mut out = Vec::new();
    while let Some(record) = decoder.decode(&mut buf) {
        out.push(record);
    }
    out
}

fn decode_chunked(data: &[u8], sizes: &[u8]) -> Vec<ExpiredToken> {
    let mut decoder = RecordDecoder::new();
    let mut buf = BytesMut::new();
    let mut out = Vec::new();
    let mut offset = 0;
    let mut i = 0;

    while offset < data.len() {
        let size = sizes.get(i % sizes.len().max(1)).copied().unwrap_or(1).max(1) as usize;
        let end = (offset + size).min(data.len());
        buf.extend_from_slice(&data[offset..end]);
        offset = end;
        i += 1;

        while let Some(record) = decoder.decode(&mut buf) {
            out.push(record);
        }
    }
    out
}

fuzz_target!(|input: FuzzStreamInput| {
    let whole = decode_all(&input.data);
    let chunked = decode_chunked(&input.data, &input.chunk_sizes);

    // Chunking must never change what is decoded
    assert_eq!(whole, chunked);

    // Every emitted record accounts for exactly its bytes on the wire
    let consumed: usize = whole.iter().map(ExpiredToken::encoded_len).sum();
    assert!(consumed <= input.data.len());
});
