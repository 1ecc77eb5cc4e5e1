//! SEED 2.x data record codec.
//!
//! Decoding understands INT16, INT32, Steim-1 and Steim-2 payloads in either
//! byte order. Encoding always writes 4096-byte big-endian INT32 records with
//! a single blockette 1000, which every SEED reader accepts.

use crate::error::{DecodeError, EncodeError};
use crate::types::{SampleStream, StreamId, Trace};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};

pub const FIXED_HEADER_LEN: usize = 48;
pub const ARCHIVE_RECORD_LEN: usize = 1 << ARCHIVE_RECORD_EXPONENT;

/// Highest sample rate, in Hz, accepted from a record header.
pub const MAX_SAMPLE_RATE: f64 = 10_000.0;

const ARCHIVE_RECORD_EXPONENT: u8 = 12;
const ARCHIVE_DATA_OFFSET: usize = 64;
const STEIM_FRAME_LEN: usize = 64;
const RESYNC_STEP: usize = 64;

const ENCODING_INT16: u8 = 1;
const ENCODING_INT32: u8 = 3;
const ENCODING_STEIM1: u8 = 10;
const ENCODING_STEIM2: u8 = 11;

/// How to react to a record that cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Fail the whole decode on the first malformed record.
    Strict,
    /// Skip malformed records and keep the rest.
    Lenient,
}

// ---------------------------------------------------------------------------
// Byte order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Big,
    Little,
}

impl Endian {
    fn u16(self, b: &[u8]) -> u16 {
        match self {
            Endian::Big => BigEndian::read_u16(b),
            Endian::Little => LittleEndian::read_u16(b),
        }
    }

    fn i16(self, b: &[u8]) -> i16 {
        match self {
            Endian::Big => BigEndian::read_i16(b),
            Endian::Little => LittleEndian::read_i16(b),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        match self {
            Endian::Big => BigEndian::read_u32(b),
            Endian::Little => LittleEndian::read_u32(b),
        }
    }

    fn i32(self, b: &[u8]) -> i32 {
        match self {
            Endian::Big => BigEndian::read_i32(b),
            Endian::Little => LittleEndian::read_i32(b),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Record {
    id: StreamId,
    start: DateTime<Utc>,
    sample_rate: f64,
    samples: Vec<i32>,
    length: usize,
}

/// Decode a buffer of concatenated data records into a stream.
///
/// Consecutive records of one stream are joined into a single trace when the
/// second starts where the first ends (within half a sample).
pub fn decode(bytes: &[u8], mode: DecodeMode) -> Result<SampleStream, DecodeError> {
    let mut traces: Vec<Trace> = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        if bytes[offset..].iter().all(|b| *b == 0) {
            break;
        }
        match parse_record(bytes, offset, mode) {
            Ok(record) => {
                offset += record.length;
                append_record(&mut traces, record);
            }
            Err(err) => match mode {
                DecodeMode::Strict => return Err(err),
                DecodeMode::Lenient => {
                    tracing::warn!(offset, error = %err, "skipping malformed miniSEED record");
                    offset = resync(bytes, offset);
                }
            },
        }
    }

    Ok(SampleStream::new(traces))
}

/// Offset of the next record after a malformed one.
///
/// Uses the record's own blockette 1000 length when it is readable, otherwise
/// scans forward for something that looks like a fixed header.
fn resync(bytes: &[u8], offset: usize) -> usize {
    if let Some(length) = record_length_hint(bytes, offset) {
        return offset + length;
    }
    let mut next = offset + RESYNC_STEP;
    while next < bytes.len() {
        if looks_like_header(&bytes[next..]) {
            return next;
        }
        next += RESYNC_STEP;
    }
    bytes.len()
}

fn record_length_hint(bytes: &[u8], offset: usize) -> Option<usize> {
    let h = bytes.get(offset..)?;
    if h.len() < FIXED_HEADER_LEN || !looks_like_header(h) {
        return None;
    }
    let endian = detect_endian(h)?;
    let blockettes = walk_blockettes(h, endian);
    let exponent = blockettes.b1000?.record_exponent;
    valid_exponent(exponent).then(|| 1usize << exponent)
}

fn looks_like_header(h: &[u8]) -> bool {
    if h.len() < FIXED_HEADER_LEN {
        return false;
    }
    let seq_ok = h[..6].iter().all(|b| b.is_ascii_digit() || *b == b' ' || *b == 0);
    seq_ok && matches!(h[6], b'D' | b'R' | b'Q' | b'M')
}

fn plausible_btime(year: u16, doy: u16) -> bool {
    (1900..=2100).contains(&year) && (1..=366).contains(&doy)
}

fn detect_endian(h: &[u8]) -> Option<Endian> {
    [Endian::Big, Endian::Little]
        .into_iter()
        .find(|e| plausible_btime(e.u16(&h[20..22]), e.u16(&h[22..24])))
}

fn valid_exponent(exponent: u8) -> bool {
    (7..=16).contains(&exponent)
}

#[derive(Debug, Clone, Copy)]
struct Blockette1000 {
    encoding: u8,
    word_order: u8,
    record_exponent: u8,
}

#[derive(Debug, Default)]
struct Blockettes {
    b1000: Option<Blockette1000>,
    microseconds: i8,
}

fn walk_blockettes(h: &[u8], endian: Endian) -> Blockettes {
    let mut found = Blockettes::default();
    let count = h[39];
    let mut pos = endian.u16(&h[46..48]) as usize;

    for _ in 0..count {
        if pos < FIXED_HEADER_LEN || pos + 8 > h.len() {
            break;
        }
        let kind = endian.u16(&h[pos..pos + 2]);
        let next = endian.u16(&h[pos + 2..pos + 4]) as usize;
        match kind {
            1000 => {
                found.b1000 = Some(Blockette1000 {
                    encoding: h[pos + 4],
                    word_order: h[pos + 5],
                    record_exponent: h[pos + 6],
                });
            }
            1001 => found.microseconds = h[pos + 5] as i8,
            _ => {}
        }
        if next <= pos {
            break;
        }
        pos = next;
    }
    found
}

fn code(field: &[u8]) -> String {
    String::from_utf8_lossy(field).trim().to_string()
}

fn btime(h: &[u8], endian: Endian, offset: usize) -> Result<DateTime<Utc>, DecodeError> {
    let year = endian.u16(&h[20..22]) as i32;
    let doy = endian.u16(&h[22..24]) as u32;
    let (hour, minute, second) = (h[24] as i64, h[25] as i64, h[26] as i64);
    let ten_thousandths = endian.u16(&h[28..30]) as i64;

    if hour > 23 || minute > 59 || second > 60 || ten_thousandths > 9999 {
        return Err(DecodeError::InvalidHeader {
            offset,
            reason: format!("start time {hour:02}:{minute:02}:{second:02}.{ten_thousandths:04}"),
        });
    }
    let date = NaiveDate::from_yo_opt(year, doy).ok_or_else(|| DecodeError::InvalidHeader {
        offset,
        reason: format!("start date {year}-{doy:03}"),
    })?;
    let midnight = date.and_hms_opt(0, 0, 0).map(|t| t.and_utc()).ok_or_else(|| {
        DecodeError::InvalidHeader {
            offset,
            reason: format!("start date {year}-{doy:03}"),
        }
    })?;
    Ok(midnight
        + Duration::seconds(hour * 3600 + minute * 60 + second)
        + Duration::microseconds(ten_thousandths * 100))
}

fn sample_rate(factor: i16, multiplier: i16) -> f64 {
    let (f, m) = (factor as f64, multiplier as f64);
    match (factor.signum(), multiplier.signum()) {
        (0, _) | (_, 0) => 0.0,
        (1, 1) => f * m,
        (1, -1) => -f / m,
        (-1, 1) => -m / f,
        _ => 1.0 / (f * m),
    }
}

fn parse_record(bytes: &[u8], offset: usize, mode: DecodeMode) -> Result<Record, DecodeError> {
    let h = &bytes[offset..];
    if h.len() < FIXED_HEADER_LEN {
        return Err(DecodeError::Truncated {
            offset,
            needed: FIXED_HEADER_LEN,
            available: h.len(),
        });
    }
    if !looks_like_header(h) {
        return Err(DecodeError::InvalidHeader {
            offset,
            reason: "bad sequence number or quality indicator".to_string(),
        });
    }
    let endian = detect_endian(h).ok_or_else(|| DecodeError::InvalidHeader {
        offset,
        reason: "implausible start year/day".to_string(),
    })?;

    let id = StreamId::new(code(&h[18..20]), code(&h[8..13]), code(&h[13..15]), code(&h[15..18]));
    let mut start = btime(h, endian, offset)?;
    let nsamples = endian.u16(&h[30..32]) as usize;
    let rate = sample_rate(endian.i16(&h[32..34]), endian.i16(&h[34..36]));
    let activity = h[36];
    let correction = endian.i32(&h[40..44]) as i64;
    let data_offset = endian.u16(&h[44..46]) as usize;

    let blockettes = walk_blockettes(h, endian);
    let b1000 = blockettes
        .b1000
        .ok_or(DecodeError::MissingBlockette1000 { offset })?;
    if !valid_exponent(b1000.record_exponent) {
        return Err(DecodeError::InvalidHeader {
            offset,
            reason: format!("record length exponent {}", b1000.record_exponent),
        });
    }
    let length = 1usize << b1000.record_exponent;
    if h.len() < length {
        return Err(DecodeError::Truncated {
            offset,
            needed: length,
            available: h.len(),
        });
    }

    // Bit 1 of the activity flags marks the time correction as already applied.
    if activity & 0x02 == 0 && correction != 0 {
        start += Duration::microseconds(correction * 100);
    }
    start += Duration::microseconds(blockettes.microseconds as i64);

    let samples = if nsamples == 0 {
        Vec::new()
    } else {
        if data_offset < FIXED_HEADER_LEN || data_offset >= length {
            return Err(DecodeError::InvalidHeader {
                offset,
                reason: format!("data offset {data_offset} outside record of {length} bytes"),
            });
        }
        if rate <= 0.0 {
            return Err(DecodeError::InvalidHeader {
                offset,
                reason: "non-positive sample rate".to_string(),
            });
        }
        if rate > MAX_SAMPLE_RATE {
            return Err(DecodeError::InvalidHeader {
                offset,
                reason: format!("sample rate {rate} Hz above {MAX_SAMPLE_RATE} Hz"),
            });
        }
        let word_order = if b1000.word_order == 0 {
            Endian::Little
        } else {
            Endian::Big
        };
        let data = &h[data_offset..length];
        decode_payload(data, b1000.encoding, word_order, nsamples, offset, mode)?
    };

    Ok(Record {
        id,
        start,
        sample_rate: rate,
        samples,
        length,
    })
}

fn decode_payload(
    data: &[u8],
    encoding: u8,
    endian: Endian,
    nsamples: usize,
    offset: usize,
    mode: DecodeMode,
) -> Result<Vec<i32>, DecodeError> {
    match encoding {
        ENCODING_INT16 => fixed_width(data, 2, nsamples, offset, |b| endian.i16(b) as i32),
        ENCODING_INT32 => fixed_width(data, 4, nsamples, offset, |b| endian.i32(b)),
        ENCODING_STEIM1 => decode_steim(data, endian, nsamples, Steim::One, offset, mode),
        ENCODING_STEIM2 => decode_steim(data, endian, nsamples, Steim::Two, offset, mode),
        other => Err(DecodeError::UnsupportedEncoding {
            offset,
            encoding: other,
        }),
    }
}

fn fixed_width(
    data: &[u8],
    width: usize,
    nsamples: usize,
    offset: usize,
    read: impl Fn(&[u8]) -> i32,
) -> Result<Vec<i32>, DecodeError> {
    let available = data.len() / width;
    if available < nsamples {
        return Err(DecodeError::SampleCount {
            offset,
            expected: nsamples,
            decoded: available,
        });
    }
    Ok(data
        .chunks_exact(width)
        .take(nsamples)
        .map(read)
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Steim {
    One,
    Two,
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn unpack(word: u32, bits: u32, count: u32, diffs: &mut Vec<i32>) {
    let mask = (1u32 << bits) - 1;
    for k in 0..count {
        let shift = bits * (count - 1 - k);
        diffs.push(sign_extend((word >> shift) & mask, bits));
    }
}

fn decode_steim(
    data: &[u8],
    endian: Endian,
    nsamples: usize,
    version: Steim,
    offset: usize,
    mode: DecodeMode,
) -> Result<Vec<i32>, DecodeError> {
    let steim_err = |reason: String| DecodeError::Steim { offset, reason };
    let mut diffs: Vec<i32> = Vec::with_capacity(nsamples);
    let mut forward = 0i32;
    let mut reverse = 0i32;

    for (f, frame) in data.chunks_exact(STEIM_FRAME_LEN).enumerate() {
        let nibbles = endian.u32(&frame[0..4]);
        for w in 1..16usize {
            let word = endian.u32(&frame[w * 4..w * 4 + 4]);
            if f == 0 && w == 1 {
                forward = word as i32;
                continue;
            }
            if f == 0 && w == 2 {
                reverse = word as i32;
                continue;
            }
            let nibble = (nibbles >> (30 - 2 * w as u32)) & 0x3;
            match (version, nibble) {
                (_, 0) => {}
                (_, 1) => unpack(word, 8, 4, &mut diffs),
                (Steim::One, 2) => unpack(word, 16, 2, &mut diffs),
                (Steim::One, _) => diffs.push(word as i32),
                (Steim::Two, 2) => match word >> 30 {
                    1 => unpack(word, 30, 1, &mut diffs),
                    2 => unpack(word, 15, 2, &mut diffs),
                    3 => unpack(word, 10, 3, &mut diffs),
                    _ => return Err(steim_err(format!("frame {f} word {w}: dnib 00 with nibble 10"))),
                },
                (Steim::Two, _) => match word >> 30 {
                    0 => unpack(word, 6, 5, &mut diffs),
                    1 => unpack(word, 5, 6, &mut diffs),
                    2 => unpack(word, 4, 7, &mut diffs),
                    _ => return Err(steim_err(format!("frame {f} word {w}: dnib 11 with nibble 11"))),
                },
            }
        }
        if diffs.len() >= nsamples {
            break;
        }
    }

    if diffs.len() < nsamples {
        return Err(DecodeError::SampleCount {
            offset,
            expected: nsamples,
            decoded: diffs.len(),
        });
    }

    let mut samples = Vec::with_capacity(nsamples);
    samples.push(forward);
    for diff in &diffs[1..nsamples] {
        let prev = samples[samples.len() - 1];
        samples.push(prev.wrapping_add(*diff));
    }

    let last = samples[nsamples - 1];
    if last != reverse {
        let err = DecodeError::Integration {
            offset,
            expected: reverse,
            actual: last,
        };
        match mode {
            DecodeMode::Strict => return Err(err),
            DecodeMode::Lenient => tracing::warn!(error = %err, "keeping samples despite integration mismatch"),
        }
    }
    Ok(samples)
}

fn append_record(traces: &mut Vec<Trace>, record: Record) {
    if record.samples.is_empty() {
        return;
    }
    let continues = traces.iter_mut().rev().find(|t| t.id == record.id);
    if let Some(trace) = continues {
        let same_rate = (trace.sample_rate - record.sample_rate).abs() <= 1e-9 * trace.sample_rate;
        let gap_nanos = (record.start - trace.end()).num_nanoseconds().unwrap_or(i64::MAX);
        if same_rate && (gap_nanos.abs() as f64) <= trace.period_nanos() / 2.0 {
            trace.samples.extend(record.samples);
            return;
        }
    }
    traces.push(Trace {
        id: record.id,
        start: record.start,
        sample_rate: record.sample_rate,
        samples: record.samples,
    });
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn rate_factors(rate: f64) -> Result<(i16, i16), EncodeError> {
    let max = i16::MAX as f64;
    let integral = |v: f64| (v - v.round()).abs() < 1e-9 && v.round() >= 1.0 && v.round() <= max;

    if !rate.is_finite() || rate <= 0.0 {
        return Err(EncodeError::SampleRate(rate));
    }
    if rate >= 1.0 {
        if integral(rate) {
            return Ok((rate.round() as i16, 1));
        }
        for divisor in [10i16, 100, 1000, 10000] {
            let scaled = rate * divisor as f64;
            if integral(scaled) {
                return Ok((scaled.round() as i16, -divisor));
            }
        }
    } else {
        let period = 1.0 / rate;
        if integral(period) {
            return Ok((-(period.round() as i16), 1));
        }
    }
    Err(EncodeError::SampleRate(rate))
}

fn put_code(field: &mut [u8], value: &str) -> Result<(), EncodeError> {
    if value.len() > field.len() || !value.is_ascii() {
        return Err(EncodeError::CodeTooLong(value.to_string(), field.len()));
    }
    field.fill(b' ');
    field[..value.len()].copy_from_slice(value.as_bytes());
    Ok(())
}

struct HeaderFields<'a> {
    id: &'a StreamId,
    sequence: usize,
    start: DateTime<Utc>,
    nsamples: u16,
    factors: (i16, i16),
    encoding: u8,
    record_exponent: u8,
    data_offset: u16,
}

fn write_header(record: &mut [u8], fields: &HeaderFields<'_>) -> Result<(), EncodeError> {
    let seq = format!("{:06}", fields.sequence % 999_999 + 1);
    record[0..6].copy_from_slice(seq.as_bytes());
    record[6] = b'D';
    record[7] = b' ';
    put_code(&mut record[8..13], &fields.id.station)?;
    put_code(&mut record[13..15], &fields.id.location)?;
    put_code(&mut record[15..18], &fields.id.channel)?;
    put_code(&mut record[18..20], &fields.id.network)?;

    let start = fields.start;
    let year = u16::try_from(start.year())
        .ok()
        .filter(|y| (1900..=2100).contains(y))
        .ok_or_else(|| EncodeError::StartTime(start.to_rfc3339()))?;
    BigEndian::write_u16(&mut record[20..22], year);
    BigEndian::write_u16(&mut record[22..24], start.ordinal() as u16);
    record[24] = start.hour() as u8;
    record[25] = start.minute() as u8;
    record[26] = start.second() as u8;
    record[27] = 0;
    BigEndian::write_u16(
        &mut record[28..30],
        ((start.nanosecond() % 1_000_000_000) / 100_000) as u16,
    );
    BigEndian::write_u16(&mut record[30..32], fields.nsamples);
    BigEndian::write_i16(&mut record[32..34], fields.factors.0);
    BigEndian::write_i16(&mut record[34..36], fields.factors.1);
    record[36] = 0;
    record[37] = 0;
    record[38] = 0;
    record[39] = 1;
    BigEndian::write_i32(&mut record[40..44], 0);
    BigEndian::write_u16(&mut record[44..46], fields.data_offset);
    BigEndian::write_u16(&mut record[46..48], FIXED_HEADER_LEN as u16);

    BigEndian::write_u16(&mut record[48..50], 1000);
    BigEndian::write_u16(&mut record[50..52], 0);
    record[52] = fields.encoding;
    record[53] = 1;
    record[54] = fields.record_exponent;
    record[55] = 0;
    Ok(())
}

/// Encode a trace as big-endian INT32 data records of [`ARCHIVE_RECORD_LEN`] bytes.
pub fn encode(trace: &Trace) -> Result<Vec<u8>, EncodeError> {
    encode_all(std::slice::from_ref(trace))
}

/// Encode several traces back to back, with one running sequence number.
pub fn encode_all(traces: &[Trace]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    let mut sequence = 0;
    for trace in traces {
        sequence = encode_into(&mut out, trace, sequence)?;
    }
    Ok(out)
}

fn encode_into(out: &mut Vec<u8>, trace: &Trace, mut sequence: usize) -> Result<usize, EncodeError> {
    let factors = rate_factors(trace.sample_rate)?;
    let per_record = (ARCHIVE_RECORD_LEN - ARCHIVE_DATA_OFFSET) / 4;
    out.reserve(trace.samples.len().div_ceil(per_record) * ARCHIVE_RECORD_LEN);

    for (k, chunk) in trace.samples.chunks(per_record).enumerate() {
        let first = k * per_record;
        let start = trace.start
            + Duration::nanoseconds((first as f64 * trace.period_nanos()).round() as i64);
        let mut record = vec![0u8; ARCHIVE_RECORD_LEN];
        write_header(
            &mut record,
            &HeaderFields {
                id: &trace.id,
                sequence,
                start,
                nsamples: chunk.len() as u16,
                factors,
                encoding: ENCODING_INT32,
                record_exponent: ARCHIVE_RECORD_EXPONENT,
                data_offset: ARCHIVE_DATA_OFFSET as u16,
            },
        )?;
        for (i, sample) in chunk.iter().enumerate() {
            let at = ARCHIVE_DATA_OFFSET + i * 4;
            BigEndian::write_i32(&mut record[at..at + 4], *sample);
        }
        out.extend_from_slice(&record);
        sequence += 1;
    }
    Ok(sequence)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
