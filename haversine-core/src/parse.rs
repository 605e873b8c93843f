//! Single-pass parser for the `{"pairs":[...]}` dataset format.
//!
//! The reader never holds more than one pair and one byte of lookahead; each
//! object is checked flat (four keys, any order, each exactly once) and
//! handed to the caller as soon as its closing brace is read.

use std::io::{self, BufRead};

use tracing::debug;

use crate::constants::EARTH_RADIUS_KM;
use crate::error::{describe, FormatError, HaversineError, Result};
use crate::geo::{reference_haversine, GeoPair, GeoPoint};

const KEYS: [&str; 4] = ["x0", "y0", "x1", "y1"];
const NUMBER_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregation {
    pub sum: f64,
    pub average: f64,
    pub pair_count: u64,
    pub bytes_read: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    FirstPair,
    NextPair,
    Done,
}

pub struct PairReader<R> {
    reader: R,
    offset: u64,
    state: State,
    number: String,
}

impl<R: BufRead> PairReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            state: State::Header,
            number: String::with_capacity(NUMBER_CAPACITY),
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.offset
    }

    /// Returns the next pair, `None` once the closing `]}` has been consumed.
    /// After an error the reader yields `None` forever.
    pub fn next_pair(&mut self) -> Result<Option<GeoPair>> {
        let res = self.advance();
        if res.is_err() {
            self.state = State::Done;
        }
        res
    }

    fn advance(&mut self) -> Result<Option<GeoPair>> {
        if self.state == State::Header {
            for lit in ["{", "\"pairs\"", ":", "["] {
                self.skip_whitespace()?;
                self.expect_literal(lit)?;
            }
            self.state = State::FirstPair;
        }

        match self.state {
            State::Done | State::Header => Ok(None),
            State::FirstPair => {
                self.skip_whitespace()?;
                if self.peek()? == Some(b']') {
                    self.bump();
                    self.finish()?;
                    return Ok(None);
                }
                let pair = self.read_object()?;
                self.state = State::NextPair;
                Ok(Some(pair))
            }
            State::NextPair => {
                self.skip_whitespace()?;
                match self.peek()? {
                    Some(b',') => {
                        self.bump();
                        self.read_object().map(Some)
                    }
                    Some(b']') => {
                        self.bump();
                        self.finish()?;
                        Ok(None)
                    }
                    other => Err(self.fail(FormatError::UnexpectedTerminator {
                        found: describe(other),
                        closer: ']',
                    })),
                }
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.skip_whitespace()?;
        self.expect_literal("}")?;
        self.skip_whitespace()?;
        if let Some(b) = self.peek()? {
            return Err(self.fail(FormatError::TrailingData {
                found: describe(Some(b)),
            }));
        }
        self.state = State::Done;
        Ok(())
    }

    fn read_object(&mut self) -> Result<GeoPair> {
        let mut values = [0.0f64; 4];
        let mut seen = [false; 4];

        self.skip_whitespace()?;
        self.expect_literal("{")?;
        loop {
            self.skip_whitespace()?;
            self.expect_literal("\"")?;
            let slot = self.read_key()?;
            self.expect_literal("\"")?;
            self.skip_whitespace()?;
            self.expect_literal(":")?;
            self.skip_whitespace()?;
            let value = self.read_number()?;

            if seen[slot] {
                return Err(self.fail(FormatError::DuplicateKey(KEYS[slot])));
            }
            seen[slot] = true;
            values[slot] = value;

            self.skip_whitespace()?;
            match self.peek()? {
                Some(b',') => self.bump(),
                Some(b'}') => {
                    self.bump();
                    break;
                }
                other => {
                    return Err(self.fail(FormatError::UnexpectedTerminator {
                        found: describe(other),
                        closer: '}',
                    }))
                }
            }
        }

        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(self.fail(FormatError::MissingKey(KEYS[missing])));
        }
        Ok(GeoPair::new(
            GeoPoint::new(values[0], values[1]),
            GeoPoint::new(values[2], values[3]),
        ))
    }

    /// Keys are a fixed two-byte span.
    fn read_key(&mut self) -> Result<usize> {
        let start = self.offset;
        let mut key = [0u8; 2];
        for b in key.iter_mut() {
            *b = match self.peek()? {
                Some(byte) => byte,
                None => return Err(self.fail(FormatError::UnexpectedEof)),
            };
            self.bump();
        }
        KEYS.iter()
            .position(|k| k.as_bytes() == &key[..])
            .ok_or_else(|| HaversineError::Format {
                offset: start,
                kind: FormatError::UnknownKey(String::from_utf8_lossy(&key).into_owned()),
            })
    }

    fn read_number(&mut self) -> Result<f64> {
        let start = self.offset;
        self.number.clear();
        while let Some(b) = self.peek()? {
            if b.is_ascii_whitespace() || matches!(b, b',' | b'}' | b']') {
                break;
            }
            self.number.push(b as char);
            self.bump();
        }
        if self.number.is_empty() && self.peek()?.is_none() {
            return Err(self.fail(FormatError::UnexpectedEof));
        }
        match self.number.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(HaversineError::Format {
                offset: start,
                kind: FormatError::InvalidNumber(self.number.clone()),
            }),
        }
    }

    fn expect_literal(&mut self, lit: &'static str) -> Result<()> {
        for &want in lit.as_bytes() {
            let got = self.peek()?;
            if got != Some(want) {
                return Err(self.fail(FormatError::UnexpectedToken {
                    expected: lit,
                    found: describe(got),
                }));
            }
            self.bump();
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(b) = self.peek()? {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.bump();
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(HaversineError::Io {
                        context: "reading dataset",
                        source,
                    })
                }
            }
        }
    }

    /// Only called after `peek` returned a byte.
    fn bump(&mut self) {
        self.reader.consume(1);
        self.offset += 1;
    }

    fn fail(&self, kind: FormatError) -> HaversineError {
        HaversineError::Format {
            offset: self.offset,
            kind,
        }
    }
}

impl<R: BufRead> Iterator for PairReader<R> {
    type Item = Result<GeoPair>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_pair().transpose()
    }
}

/// Parses the whole stream and averages the reference distance of its pairs.
pub fn aggregate<R: BufRead>(reader: R) -> Result<Aggregation> {
    aggregate_with_radius(reader, EARTH_RADIUS_KM)
}

pub fn aggregate_with_radius<R: BufRead>(reader: R, earth_radius: f64) -> Result<Aggregation> {
    let mut pairs = PairReader::new(reader);
    let mut sum = 0.0;
    let mut pair_count = 0u64;
    while let Some(pair) = pairs.next_pair()? {
        sum += reference_haversine(pair.p0, pair.p1, earth_radius);
        pair_count += 1;
    }
    if pair_count == 0 {
        return Err(HaversineError::DegenerateInput {
            what: "dataset contains no pairs",
        });
    }

    let average = sum / pair_count as f64;
    debug!(pair_count, average, bytes = pairs.bytes_read(), "aggregation complete");
    Ok(Aggregation {
        sum,
        average,
        pair_count,
        bytes_read: pairs.bytes_read(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    const TEST_EPSILON: f64 = 1e-12;

    fn parse(text: &str) -> Result<Aggregation> {
        aggregate(Cursor::new(text.as_bytes()))
    }

    fn format_kind(text: &str) -> FormatError {
        match parse(text) {
            Err(HaversineError::Format { kind, .. }) => kind,
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn canonical_single_pair() {
        let agg = parse(r#"{"pairs":[{"x0":2.0,"y0":3.0,"x1":4.0,"y1":1.0}]}"#).unwrap();
        let expected = reference_haversine(
            GeoPoint::new(2.0, 3.0),
            GeoPoint::new(4.0, 1.0),
            EARTH_RADIUS_KM,
        );
        assert_eq!(agg.pair_count, 1);
        assert!((agg.average - expected).abs() < TEST_EPSILON);
    }

    #[test]
    fn key_order_does_not_matter() {
        let canonical = parse(r#"{"pairs":[{"x0":2.0,"y0":3.0,"x1":4.0,"y1":1.0}]}"#).unwrap();
        let shuffled = parse(r#"{"pairs":[{"y1":1.0,"x0":2.0,"y0":3.0,"x1":4.0}]}"#).unwrap();
        assert_eq!(canonical.average.to_bits(), shuffled.average.to_bits());
    }

    #[test]
    fn whitespace_between_tokens() {
        let text = " {\n \"pairs\" :\t[\n { \"x0\" : 1.5 , \"y0\":-2 ,\"x1\":3e1,\"y1\" :+4.25 }\n ,\n{\"x0\":0,\"y0\":0,\"x1\":0,\"y1\":0}\n]\n}\n\n";
        let agg = parse(text).unwrap();
        assert_eq!(agg.pair_count, 2);
        assert_eq!(agg.bytes_read, text.len() as u64);
    }

    #[test]
    fn accepts_any_float_spelling() {
        let mut reader = PairReader::new(Cursor::new(
            r#"{"pairs":[{"x0":1e2,"y0":-.5,"x1":7.,"y1":-0.125E-1}]}"#.as_bytes(),
        ));
        let pair = reader.next_pair().unwrap().unwrap();
        assert_eq!(pair.p0, GeoPoint::new(100.0, -0.5));
        assert_eq!(pair.p1, GeoPoint::new(7.0, -0.0125));
        assert!(reader.next_pair().unwrap().is_none());
    }

    #[test]
    fn empty_array_is_degenerate() {
        let err = parse(r#"{"pairs":[]}"#).unwrap_err();
        assert!(matches!(err, HaversineError::DegenerateInput { .. }));
        let err = parse("{ \"pairs\" : [ ] }\n").unwrap_err();
        assert!(matches!(err, HaversineError::DegenerateInput { .. }));
    }

    #[test]
    fn truncated_mid_object() {
        let kind = format_kind(r#"{"pairs":[{"x0":1.0,"y0":2.0,"x1":3.0,"y1":4.0"#);
        assert_eq!(
            kind,
            FormatError::UnexpectedTerminator {
                found: "end of input".to_string(),
                closer: '}',
            }
        );
        assert_eq!(format_kind(r#"{"pairs":[{"x0":1.0,"y0":"#), FormatError::UnexpectedEof);
        assert_eq!(format_kind(r#"{"pairs":[{"x"#), FormatError::UnexpectedEof);
    }

    #[test]
    fn truncated_after_array() {
        let kind = format_kind(r#"{"pairs":[{"x0":1,"y0":2,"x1":3,"y1":4}]"#);
        assert!(matches!(kind, FormatError::UnexpectedToken { expected: "}", .. }));
        let kind = format_kind(r#"{"pairs":[{"x0":1,"y0":2,"x1":3,"y1":4}"#);
        assert!(matches!(kind, FormatError::UnexpectedTerminator { closer: ']', .. }));
    }

    #[test]
    fn unknown_key_is_reported_with_offset() {
        let err = parse(r#"{"pairs":[{"x0":1,"z0":2,"x1":3,"y1":4}]}"#).unwrap_err();
        match err {
            HaversineError::Format { offset, kind } => {
                assert_eq!(kind, FormatError::UnknownKey("z0".to_string()));
                assert_eq!(offset, 19);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn keys_are_case_sensitive() {
        let kind = format_kind(r#"{"pairs":[{"X0":1,"y0":2,"x1":3,"y1":4}]}"#);
        assert_eq!(kind, FormatError::UnknownKey("X0".to_string()));
        let kind = format_kind(r#"{"Pairs":[]}"#);
        assert!(matches!(kind, FormatError::UnexpectedToken { expected: "\"pairs\"", .. }));
    }

    #[test]
    fn duplicate_and_missing_keys() {
        let kind = format_kind(r#"{"pairs":[{"x0":1,"x0":2,"x1":3,"y1":4}]}"#);
        assert_eq!(kind, FormatError::DuplicateKey("x0"));
        let kind = format_kind(r#"{"pairs":[{"x0":1,"y0":2,"x1":3}]}"#);
        assert_eq!(kind, FormatError::MissingKey("y1"));
    }

    #[test]
    fn bad_terminators() {
        let kind = format_kind(r#"{"pairs":[{"x0":1;"y0":2,"x1":3,"y1":4}]}"#);
        assert_eq!(kind, FormatError::InvalidNumber("1;\"y0\":2".to_string()));
        let kind = format_kind(r#"{"pairs":[{"x0":1 "y0":2,"x1":3,"y1":4}]}"#);
        assert!(matches!(kind, FormatError::UnexpectedTerminator { closer: '}', .. }));
        let kind = format_kind(r#"{"pairs":[{"x0":1,"y0":2,"x1":3,"y1":4} {"x0":1}]}"#);
        assert!(matches!(kind, FormatError::UnexpectedTerminator { closer: ']', .. }));
    }

    #[test]
    fn trailing_comma_and_trailing_data() {
        let kind = format_kind(r#"{"pairs":[{"x0":1,"y0":2,"x1":3,"y1":4},]}"#);
        assert!(matches!(kind, FormatError::UnexpectedToken { expected: "{", .. }));
        let kind = format_kind("{\"pairs\":[{\"x0\":1,\"y0\":2,\"x1\":3,\"y1\":4}]}\n]");
        assert_eq!(kind, FormatError::TrailingData { found: "']'".to_string() });
    }

    #[test]
    fn invalid_numbers() {
        let kind = format_kind(r#"{"pairs":[{"x0":abc,"y0":2,"x1":3,"y1":4}]}"#);
        assert_eq!(kind, FormatError::InvalidNumber("abc".to_string()));
        let kind = format_kind(r#"{"pairs":[{"x0":,"y0":2,"x1":3,"y1":4}]}"#);
        assert_eq!(kind, FormatError::InvalidNumber(String::new()));
    }

    #[test]
    fn long_numbers_are_read_whole() {
        let long = format!("1.{}", "0".repeat(70));
        let text = format!(r#"{{"pairs":[{{"x0":{long},"y0":2,"x1":3,"y1":4}}]}}"#);
        let mut reader = PairReader::new(Cursor::new(text.as_bytes()));
        let pair = reader.next_pair().unwrap().unwrap();
        assert_eq!(pair.p0, GeoPoint::new(1.0, 2.0));

        let digits = format!("{}.5", "1".repeat(80));
        let text = format!(r#"{{"pairs":[{{"x0":0,"y0":0,"x1":0,"y1":{digits}}}]}}"#);
        let mut reader = PairReader::new(Cursor::new(text.as_bytes()));
        let pair = reader.next_pair().unwrap().unwrap();
        assert!(pair.p1.y > 1e79);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for bad in ["nan", "inf", "-infinity", "NaN", "1e999"] {
            let text = format!(r#"{{"pairs":[{{"x0":{bad},"y0":2,"x1":3,"y1":4}}]}}"#);
            assert_eq!(format_kind(&text), FormatError::InvalidNumber(bad.to_string()));
        }
    }

    #[test]
    fn reader_fuses_after_error() {
        let mut reader = PairReader::new(Cursor::new(r#"{"pairs":[{"q"#.as_bytes()));
        assert!(reader.next_pair().is_err());
        assert!(reader.next_pair().unwrap().is_none());
    }

    #[test]
    fn iterator_yields_pairs_in_order() {
        let text = r#"{"pairs":[{"x0":1,"y0":2,"x1":3,"y1":4},{"x1":7,"y1":8,"x0":5,"y0":6}]}"#;
        let pairs: Vec<GeoPair> = PairReader::new(Cursor::new(text.as_bytes()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].p0, GeoPoint::new(5.0, 6.0));
        assert_eq!(pairs[1].p1, GeoPoint::new(7.0, 8.0));
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn read_failures_surface_as_io() {
        let err = aggregate(BufReader::new(Broken)).unwrap_err();
        assert!(matches!(err, HaversineError::Io { .. }));
    }

    #[test]
    fn tiny_buffer_still_streams() {
        let text = r#"{"pairs":[{"x0":10.5,"y0":-20.25,"x1":30,"y1":40},{"x0":1,"y0":2,"x1":3,"y1":4}]}"#;
        let small = aggregate(BufReader::with_capacity(3, text.as_bytes())).unwrap();
        let big = parse(text).unwrap();
        assert_eq!(small, big);
    }
}
