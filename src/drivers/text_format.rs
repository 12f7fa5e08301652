//! Text-format bridging between `SqlValue` and the tokio-postgres binary
//! protocol.
//!
//! The ORM hands over loosely typed values and expects text back, the way the
//! simple-query path returns it. Parameters are therefore sent in text format
//! and let the server coerce them to the inferred type, and result cells are
//! decoded from their binary encoding into PostgreSQL's text rendering.

use std::error::Error;
use std::fmt::Write;

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::types::{Format, FromSql, IsNull, Kind, ToSql, Type};

use crate::types::SqlValue;

type BoxError = Box<dyn Error + Sync + Send>;

/// A bind parameter sent as text, whatever type the server inferred.
///
/// Booleans go out as `1`/`0`, which both boolean and integer columns accept.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextParam(Option<String>);

impl From<&SqlValue> for TextParam {
    fn from(value: &SqlValue) -> Self {
        let text = match value {
            SqlValue::Null => None,
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Int32(i) => Some(i.to_string()),
            SqlValue::Int64(i) => Some(i.to_string()),
            SqlValue::Float64(f) => Some(float_text(*f)),
            SqlValue::Bool(b) => Some((if *b { "1" } else { "0" }).to_string()),
        };
        Self(text)
    }
}

impl ToSql for TextParam {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match &self.0 {
            Some(text) => {
                out.put_slice(text.as_bytes());
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn to_sql_checked(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        self.to_sql(ty, out)
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }
}

/// A result cell rendered as text. SQL NULL is `None`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CellText(pub(crate) Option<String>);

impl<'a> FromSql<'a> for CellText {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        decode_text(ty, raw).map(|text| CellText(Some(text)))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(CellText(None))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn decode_text(ty: &Type, raw: &[u8]) -> Result<String, BoxError> {
    let text = match *ty {
        Type::BOOL => (if bool::from_sql(ty, raw)? { "t" } else { "f" }).to_string(),
        Type::CHAR => char::from(i8::from_sql(ty, raw)? as u8).to_string(),
        Type::INT2 => i16::from_sql(ty, raw)?.to_string(),
        Type::INT4 => i32::from_sql(ty, raw)?.to_string(),
        Type::INT8 => i64::from_sql(ty, raw)?.to_string(),
        Type::OID => u32::from_sql(ty, raw)?.to_string(),
        Type::FLOAT4 => float_text(f64::from(f32::from_sql(ty, raw)?)),
        Type::FLOAT8 => float_text(f64::from_sql(ty, raw)?),
        Type::NUMERIC => numeric_text(raw)?,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN | Type::JSON => {
            utf8(raw)?
        }
        Type::JSONB => match raw.split_first() {
            Some((1, body)) => utf8(body)?,
            _ => return Err("unsupported jsonb encoding version".into()),
        },
        Type::UUID => uuid_text(raw)?,
        Type::BYTEA => {
            let mut out = String::with_capacity(2 + raw.len() * 2);
            out.push_str("\\x");
            for byte in raw {
                write!(out, "{:02x}", byte)?;
            }
            out
        }
        Type::DATE => NaiveDate::from_sql(ty, raw)?.to_string(),
        Type::TIME => NaiveTime::from_sql(ty, raw)?.format("%H:%M:%S%.f").to_string(),
        Type::TIMESTAMP => NaiveDateTime::from_sql(ty, raw)?
            .format("%Y-%m-%d %H:%M:%S%.f")
            .to_string(),
        Type::TIMESTAMPTZ => DateTime::<Utc>::from_sql(ty, raw)?
            .format("%Y-%m-%d %H:%M:%S%.f+00")
            .to_string(),
        _ if ty.name() == "citext" || matches!(ty.kind(), Kind::Enum(_)) => utf8(raw)?,
        _ => return Err(format!("unsupported column type {}", ty.name()).into()),
    };
    Ok(text)
}

fn utf8(raw: &[u8]) -> Result<String, BoxError> {
    Ok(std::str::from_utf8(raw)?.to_string())
}

/// PostgreSQL spells the special float values out.
fn float_text(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else {
        value.to_string()
    }
}

fn read_u16(raw: &[u8], at: usize) -> Result<u16, BoxError> {
    raw.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "truncated numeric value".into())
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render a binary `numeric` (base-10000 digit groups) at its display scale.
fn numeric_text(raw: &[u8]) -> Result<String, BoxError> {
    let ndigits = read_u16(raw, 0)? as i16;
    let weight = read_u16(raw, 2)? as i16 as i32;
    let sign = read_u16(raw, 4)?;
    let dscale = read_u16(raw, 6)? as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let digits = (0..ndigits.max(0) as usize)
        .map(|i| read_u16(raw, 8 + i * 2))
        .collect::<Result<Vec<u16>, BoxError>>()?;
    // Group `k` carries weight `weight - k`; groups outside the array are zero.
    let group = |k: i32| -> u16 {
        usize::try_from(k)
            .ok()
            .and_then(|k| digits.get(k).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for k in 0..=weight {
            if k == 0 {
                write!(out, "{}", group(k))?;
            } else {
                write!(out, "{:04}", group(k))?;
            }
        }
    }
    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut k = weight + 1;
        while fraction.len() < dscale {
            write!(fraction, "{:04}", group(k))?;
            k += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

fn uuid_text(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() != 16 {
        return Err("invalid uuid length".into());
    }
    let mut out = String::with_capacity(36);
    for (i, byte) in raw.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        write!(out, "{:02x}", byte)?;
    }
    Ok(out)
}
