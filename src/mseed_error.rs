use chrono::ParseError;
use std::string::FromUtf8Error;
use thiserror::Error;

/// All errors produced by this crate, from fixed header parsing up through
/// Steim codec internals, FDSN identifier parsing, miniSEED-2 conversion and
/// record merging.
#[derive(Error, Debug)]
pub enum MSeedError {
    #[error("IO Error")]
    IOError(#[from] std::io::Error),
    #[error("Insufficient bytes, {0} < fixed header size {1}")]
    InsufficientBytes(usize, usize),
    #[error("CRC invalid for record: calc:{0:#010X} header:{1:#010X}")]
    CrcInvalid(u32, u32),
    #[error("Text not UTF8")]
    FromUtf8Error(#[from] FromUtf8Error),
    #[error("cannot parse extra headers")]
    JsonError(#[from] serde_json::Error),
    #[error("MSeed3 header must start with MS, (77, 83)  but was `{0}{1}`")]
    BadRecordIndicator(u8, u8),
    #[error("MSeed3 header format_version must be 3 but was `{0}`")]
    UnknownFormatVersion(u8),
    #[error("cannot parse {1} in FDSN source identifier `{0}`")]
    IdentifierParse(String, String),
    #[error("extra headers value for key `FDSN` is not a json object: `{0}`")]
    ExtraHeaderNotObject(serde_json::Value),
    #[error("MSeed3 extra header parse: `{0}`")]
    ExtraHeaderParse(String),
    #[error("Unknown data encoding: `{0}`")]
    UnknownEncoding(u8),
    #[error("Expected {0} bytes for {1} samples as encoding type {2} but header has data_length={3} bytes.",)]
    DataLength(u32, u32, u8, u32),
    #[error("Date parsing error: `{0}`")]
    ParseError(#[from] ParseError),
    #[error("MSeed3 compression/decompression error: `{0}`")]
    Compression(String),

    // --- Steim codec errors ---
    #[error("Steim input samples array is empty")]
    SteimEmptyInput,
    #[error("Steim encoded data length {0} is not a multiple of 64 bytes")]
    SteimBadLength(usize),
    #[error("Steim decode expected {0} samples but decompressed {1}")]
    SteimCountMismatch(u32, usize),
    #[error("Steim nibble value {0} impossible, can only be 0..4")]
    SteimBadNibble(u32),
    #[error("Steim2 dnib value {0} impossible, can only be 0..4")]
    SteimBadDnib(u32),
    #[error("Steim frame offset {0} out of range for {1} byte buffer")]
    SteimShortPayload(usize, usize),
    #[error("Steim value {0} too wide to encode in a difference word")]
    SteimValueTooWide(i64),
    #[error("Steim frame cap must be a positive number of frames, got 0")]
    SteimZeroFrameCap,

    // --- miniSEED2 errors ---
    #[error("unable to determine byte order of miniSEED2 record")]
    UnknownByteOrder,
    #[error("miniSEED2 record has no Blockette 1000, cannot determine encoding or record length")]
    MissingBlockette1000,
    #[error("miniSEED2 blockette chain offset {0} did not strictly increase past {1}, possible cycle")]
    BlocketteChainCycle(u16, u16),
    #[error("miniSEED2 record length exponent {0} out of allowed range 8..12")]
    BadRecordLengthExponent(u8),
    #[error("miniSEED2 header declares {0} blockettes but parsing found {1}")]
    BlocketteCountMismatch(u8, u8),

    // --- merge errors ---
    #[error("records are not compatible for merging: {0}")]
    IncompatibleMerge(String),

    // --- validation ---
    #[error("record failed validation: {0}")]
    ValidationError(String),

    #[error("MSeed3 error: `{0}`")]
    Unknown(String),
}
