//! Ingestion of advanced ("mode 7") danmaku comments.
//!
//! A comment document is an XML file holding one `<d p="...">` element per
//! comment. The `p` attribute is a comma separated list of metadata fields and
//! the element body is a JSON array describing the motion of the comment.
//! Ingestion is deliberately forgiving: a record that cannot be decoded is
//! logged and dropped so that a partially corrupt stream still plays.

use std::{fmt, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scene::{Rotation, Vec2};

/// Marker separating the lines of a comment after normalisation.
pub const LINE_BREAK: char = '\n';

/// Only comments in this mode carry positional animation data.
pub const ADVANCED_MODE: i64 = 7;

/// A 24-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rgb(u32);

impl Rgb {
    pub const BLACK: Self = Self(0x000000);
    pub const GREY: Self = Self(0x686868);
    pub const WHITE: Self = Self(0xffffff);

    /// Keeps the low 24 bits of a packed colour value.
    pub const fn from_packed(value: u32) -> Self {
        Self(value & 0x00ff_ffff)
    }

    pub const fn from_channels(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub const fn packed(self) -> u32 {
        self.0
    }

    pub fn to_hex(self) -> String {
        format!("#{:06x}", self.0)
    }

    /// Colour of the outline drawn around text of this colour; black text
    /// would vanish against a black outline.
    pub fn outline(self) -> Self {
        if self == Self::BLACK {
            Self::GREY
        } else {
            Self::BLACK
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let digits = value.strip_prefix('#').unwrap_or(&value);
        u32::from_str_radix(digits, 16)
            .map(Rgb::from_packed)
            .map_err(|_| format!("`{value}` is not a #rrggbb colour"))
    }
}

/// Undecoded comment as found in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComment {
    /// The packed attribute string (`p` attribute).
    pub attributes: String,
    /// Element body, expected to hold a bracketed JSON array.
    pub content: String,
}

impl RawComment {
    pub fn new(attributes: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            attributes: attributes.into(),
            content: content.into(),
        }
    }
}

/// A decoded advanced comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Seconds from media start at which the comment appears.
    pub play_time: f64,
    pub mode: i64,
    pub font_size: u32,
    pub color: Rgb,
    pub comment_id: Option<u64>,
    pub motion: MotionSpec,
}

/// Positional payload of an advanced comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSpec {
    pub start: Vec2,
    pub end: Vec2,
    pub start_opacity: f32,
    pub end_opacity: f32,
    /// Lifetime in seconds.
    pub duration: f64,
    /// Text with every newline flavour collapsed into [`LINE_BREAK`].
    pub text: String,
    /// Degrees.
    pub rotation: Rotation,
    pub move_duration_ms: f64,
    pub delay_ms: f64,
    pub family: Option<String>,
}

/// Why a record was left out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordIssue {
    #[error("mode {0} does not carry positional data")]
    NotAdvanced(i64),
    #[error("attribute `{0}` is missing or not numeric")]
    Attribute(&'static str),
    #[error("content is not a bracketed array")]
    NotBracketed,
    #[error("content is not valid JSON: {0}")]
    Json(String),
    #[error("field `{0}` is missing or malformed")]
    Field(&'static str),
}

/// Decodes a single record, logging and discarding anything malformed.
pub fn parse_record(raw: &RawComment) -> Option<Comment> {
    match decode_record(raw) {
        Ok(comment) => Some(comment),
        Err(RecordIssue::NotAdvanced(mode)) => {
            tracing::trace!(mode, "ignoring non-advanced comment");
            None
        }
        Err(issue) => {
            tracing::debug!(%issue, attributes = %raw.attributes, "skipping malformed comment");
            None
        }
    }
}

/// Decodes every usable record and orders them by play time. Records sharing
/// a play time keep their document order.
pub fn parse_records<'a, I>(raws: I) -> Vec<Comment>
where
    I: IntoIterator<Item = &'a RawComment>,
{
    let mut comments: Vec<Comment> = raws.into_iter().filter_map(parse_record).collect();
    comments.sort_by(|a, b| a.play_time.total_cmp(&b.play_time));
    comments
}

/// Extracts the raw comment elements from an XML comment document.
pub fn parse_document(xml: &str) -> Vec<RawComment> {
    let cleaned: String = xml.chars().filter(|c| !is_stripped_control(*c)).collect();

    element_pattern()
        .captures_iter(&cleaned)
        .filter_map(|captures| {
            let attributes = captures.get(1).or_else(|| captures.get(2))?;
            let body = captures.get(3)?;
            Some(RawComment::new(
                attributes.as_str(),
                unescape_entities(body.as_str()),
            ))
        })
        .collect()
}

/// Full ingestion pipeline: document to sorted advanced comments.
pub fn load_comments(xml: &str) -> Vec<Comment> {
    let raws = parse_document(xml);
    let comments = parse_records(&raws);
    tracing::info!(
        elements = raws.len(),
        advanced = comments.len(),
        "decoded comment document"
    );
    comments
}

fn decode_record(raw: &RawComment) -> Result<Comment, RecordIssue> {
    let attributes: Vec<&str> = raw.attributes.split(',').collect();
    let attribute = |index: usize| attributes.get(index).copied().unwrap_or_default();

    let mode = parse_int_prefix(attribute(1)).ok_or(RecordIssue::Attribute("mode"))?;
    if mode != ADVANCED_MODE {
        return Err(RecordIssue::NotAdvanced(mode));
    }

    let play_time = parse_float_prefix(attribute(0))
        .filter(|time| time.is_finite())
        .ok_or(RecordIssue::Attribute("play time"))?;
    let font_size = parse_int_prefix(attribute(2))
        .and_then(|size| u32::try_from(size).ok())
        .ok_or(RecordIssue::Attribute("font size"))?;
    let color = parse_int_prefix(attribute(3))
        .filter(|packed| *packed >= 0)
        .map(|packed| Rgb::from_packed((packed & 0x00ff_ffff) as u32))
        .ok_or(RecordIssue::Attribute("color"))?;
    let comment_id = parse_int_prefix(attribute(7)).and_then(|id| u64::try_from(id).ok());

    let content = raw.content.trim();
    if !bracket_pattern().is_match(content) {
        return Err(RecordIssue::NotBracketed);
    }
    let fields: Vec<Value> =
        serde_json::from_str(content).map_err(|err| RecordIssue::Json(err.to_string()))?;

    Ok(Comment {
        play_time,
        mode,
        font_size,
        color,
        comment_id,
        motion: decode_motion(&fields)?,
    })
}

fn decode_motion(fields: &[Value]) -> Result<MotionSpec, RecordIssue> {
    let float = |index: usize, name: &'static str| {
        fields
            .get(index)
            .and_then(value_as_float)
            .ok_or(RecordIssue::Field(name))
    };
    // Trailing fields may be left out entirely; when present they must parse.
    let optional_float = |index: usize, name: &'static str, fallback: f64| match fields.get(index) {
        None => Ok(fallback),
        Some(value) => value_as_float(value).ok_or(RecordIssue::Field(name)),
    };
    let optional_int = |index: usize, name: &'static str| match fields.get(index) {
        None => Ok(0.0),
        Some(value) => value_as_int(value)
            .map(|value| value as f64)
            .ok_or(RecordIssue::Field(name)),
    };

    let start = Vec2::new(float(0, "startX")? as f32, float(1, "startY")? as f32);

    let (start_opacity, end_opacity) = fields
        .get(2)
        .and_then(Value::as_str)
        .and_then(|pair| {
            let mut parts = pair.split('-');
            let start = parse_float_prefix(parts.next()?)?;
            let end = parse_float_prefix(parts.next()?)?;
            Some((start as f32, end as f32))
        })
        .ok_or(RecordIssue::Field("opacity"))?;

    let duration = float(3, "duration")?;
    let text = fields
        .get(4)
        .and_then(Value::as_str)
        .map(normalize_line_breaks)
        .ok_or(RecordIssue::Field("text"))?;

    let rotation = Rotation::new(
        optional_int(6, "rotateY")? as f32,
        optional_int(5, "rotateZ")? as f32,
    );
    let end = Vec2::new(
        optional_float(7, "endX", start.x as f64)? as f32,
        optional_float(8, "endY", start.y as f64)? as f32,
    );
    let move_duration_ms = optional_int(9, "moveDuration")?;
    let delay_ms = optional_int(10, "delay")?;
    let family = fields
        .get(12)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|family| !family.is_empty())
        .map(str::to_string);

    Ok(MotionSpec {
        start,
        end,
        start_opacity,
        end_opacity,
        duration,
        text,
        rotation,
        move_duration_ms,
        delay_ms,
        family,
    })
}

/// Collapses `/n`, a literal backslash-n, CRLF, LF and CR into [`LINE_BREAK`].
pub fn normalize_line_breaks(text: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"/n|\\n|\r\n|\n|\r").expect("line break pattern is valid")
    });
    pattern
        .replace_all(text, LINE_BREAK.to_string().as_str())
        .into_owned()
}

fn value_as_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_float_prefix(text),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

fn value_as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64)),
        Value::String(text) => parse_int_prefix(text),
        _ => None,
    }
}

/// Parses the longest decimal number at the start of `text`, ignoring leading
/// whitespace and any trailing garbage (`"12.5px"` yields `12.5`).
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let integer_digits = count_digits(&bytes[end..]);
    end += integer_digits;

    let mut fraction_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction_digits = count_digits(&bytes[end + 1..]);
        if integer_digits > 0 || fraction_digits > 0 {
            end += 1 + fraction_digits;
        }
    }
    if integer_digits == 0 && fraction_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_digits = count_digits(&bytes[exponent.min(bytes.len())..]);
        if exponent_digits > 0 {
            end = exponent + exponent_digits;
        }
    }

    text[..end].parse().ok()
}

/// Parses the leading base-10 integer of `text` (`"45.9"` yields `45`).
pub fn parse_int_prefix(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = count_digits(&bytes[sign..]);
    if digits == 0 {
        return None;
    }
    text[..sign + digits].parse().ok()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0b}' | '\u{0c}' | '\u{0e}'..='\u{1f}' | '\u{7f}')
}

fn unescape_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn element_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)<d\s[^>]*?\bp\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>(.*?)</d\s*>"#)
            .expect("element pattern is valid")
    })
}

fn bracket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[[^\r\n\u{2028}\u{2029}]*\]$").expect("bracket pattern is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: f64, body: &str) -> RawComment {
        RawComment::new(
            format!("{time},7,25,16777215,1500000000,0,abcdef,42"),
            body,
        )
    }

    const BODY: &str = r#"["10","20","1-0.2","4.5","hello/nworld","30","45","110","220",1000,500,0,"SimHei"]"#;

    #[test]
    fn decodes_every_positional_field() {
        let comment = parse_record(&record(3.25, BODY)).expect("record should decode");

        assert_eq!(comment.play_time, 3.25);
        assert_eq!(comment.font_size, 25);
        assert_eq!(comment.color.to_hex(), "#ffffff");
        assert_eq!(comment.comment_id, Some(42));

        let motion = comment.motion;
        assert_eq!(motion.start, Vec2::new(10.0, 20.0));
        assert_eq!(motion.end, Vec2::new(110.0, 220.0));
        assert_eq!((motion.start_opacity, motion.end_opacity), (1.0, 0.2));
        assert_eq!(motion.duration, 4.5);
        assert_eq!(motion.text, "hello\nworld");
        assert_eq!(motion.rotation, Rotation::new(45.0, 30.0));
        assert_eq!(motion.move_duration_ms, 1000.0);
        assert_eq!(motion.delay_ms, 500.0);
        assert_eq!(motion.family.as_deref(), Some("SimHei"));
    }

    #[test]
    fn malformed_record_is_dropped_and_rest_sorted() {
        let raws = vec![
            record(9.0, BODY),
            record(1.0, BODY),
            record(4.0, "not an array"),
            record(7.5, BODY),
            record(0.5, BODY),
        ];

        let comments = parse_records(&raws);
        let times: Vec<f64> = comments.iter().map(|c| c.play_time).collect();
        assert_eq!(times, vec![0.5, 1.0, 7.5, 9.0]);
    }

    #[test]
    fn other_modes_are_ignored() {
        let raw = RawComment::new("1.0,1,25,16777215", "plain scrolling text");
        assert!(parse_record(&raw).is_none());
    }

    #[test]
    fn non_numeric_fields_reject_the_record() {
        let body = r#"["left","20","1-0","4.5","text"]"#;
        assert!(parse_record(&record(1.0, body)).is_none());

        let body = r#"["10","20","1-0","4.5","text","spin"]"#;
        assert!(parse_record(&record(1.0, body)).is_none());

        let body = r#"["10","20","opaque","4.5","text"]"#;
        assert!(parse_record(&record(1.0, body)).is_none());
    }

    #[test]
    fn missing_trailing_fields_fall_back_to_static_item() {
        let comment = parse_record(&record(1.0, r#"[5, 6, "0.5-0.5", 3, "still"]"#)).unwrap();
        assert_eq!(comment.motion.end, comment.motion.start);
        assert_eq!(comment.motion.move_duration_ms, 0.0);
        assert_eq!(comment.motion.rotation, Rotation::default());
        assert!(comment.motion.family.is_none());
    }

    #[test]
    fn multi_line_brackets_are_rejected() {
        assert!(parse_record(&record(1.0, "[\"1\",\n\"2\"]")).is_none());
    }

    #[test]
    fn colour_is_masked_and_padded() {
        let raw = RawComment::new("1,7,25,255", BODY);
        assert_eq!(parse_record(&raw).unwrap().color.to_hex(), "#0000ff");

        let raw = RawComment::new("1,7,25,16777471", BODY);
        assert_eq!(parse_record(&raw).unwrap().color.to_hex(), "#0000ff");
    }

    #[test]
    fn outline_contrasts_with_fill() {
        assert_eq!(Rgb::BLACK.outline(), Rgb::GREY);
        assert_eq!(Rgb::WHITE.outline(), Rgb::BLACK);
    }

    #[test]
    fn normalizes_every_newline_flavour() {
        assert_eq!(normalize_line_breaks("a/nb\\nc\r\nd\ne\rf"), "a\nb\nc\nd\ne\nf");
    }

    #[test]
    fn lenient_number_prefixes() {
        assert_eq!(parse_float_prefix(" 12.5px"), Some(12.5));
        assert_eq!(parse_float_prefix("-.5"), Some(-0.5));
        assert_eq!(parse_float_prefix("1e3x"), Some(1000.0));
        assert_eq!(parse_float_prefix("1e"), Some(1.0));
        assert_eq!(parse_float_prefix("abc"), None);
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_int_prefix("45.9"), Some(45));
        assert_eq!(parse_int_prefix("-3deg"), Some(-3));
        assert_eq!(parse_int_prefix("deg"), None);
    }

    #[test]
    fn extracts_elements_from_document() {
        let xml = "<?xml version=\"1.0\"?>\u{1}<i><chatid>1</chatid>\
            <d p=\"2.0,7,25,16777215,0,0,x,1\">[&quot;1&quot;,&quot;2&quot;,&quot;1-0&quot;,&quot;3&quot;,&quot;hi&quot;]</d>\
            <d p=\"1.0,1,25,16777215,0,0,x,2\">plain</d>\
            <d p=\"0.5,7,25,0,0,0,x,3\">[\"0\",\"0\",\"1-1\",\"2\",\"a &amp; b\"]</d></i>";

        let raws = parse_document(xml);
        assert_eq!(raws.len(), 3);
        assert_eq!(raws[0].attributes, "2.0,7,25,16777215,0,0,x,1");
        assert!(raws[0].content.starts_with("[\"1\""));

        let comments = load_comments(xml);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].motion.text, "a & b");
        assert_eq!(comments[0].color, Rgb::BLACK);
        assert_eq!(comments[1].play_time, 2.0);
    }

    #[test]
    fn colour_round_trips_through_hex_string() {
        let json = serde_json::to_string(&Rgb::from_channels(0x12, 0x34, 0x56)).unwrap();
        assert_eq!(json, "\"#123456\"");
        let back: Rgb = serde_json::from_str(&json).unwrap();
        assert_eq!(back.packed(), 0x123456);
    }
}
