use std::str::Utf8Error;
use thiserror::Error;

/// Nesting bound for draining unconsumed arrays.
const MAX_NESTING: usize = 16;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not enough data for encoded value")]
    NotEnoughData,

    #[error("More items to be read")]
    MoreItems,

    #[error("Invalid minor-type value {0}")]
    InvalidMinorValue(u8),

    #[error("Incorrect type, expecting {0}, found {1}")]
    IncorrectType(String, String),

    #[error("Indefinite-length strings are not supported")]
    InvalidChunk,

    #[error("Unsupported CBOR item: {0}")]
    Unsupported(&'static str),

    #[error("Maximum nesting depth reached")]
    MaxNesting,

    #[error(transparent)]
    InvalidUtf8(#[from] Utf8Error),

    #[error(transparent)]
    TryFromIntError(#[from] std::num::TryFromIntError),
}

/// A type that can be parsed from the front of a CBOR buffer.
///
/// Returns the value and the number of bytes consumed.
pub trait FromCbor: Sized {
    type Error: From<Error>;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error>;
}

pub enum Value<'a, 'b: 'a> {
    UnsignedInteger(u64),
    NegativeInteger(u64),
    Bytes(&'b [u8]),
    Text(&'b str),
    Array(&'a mut Array<'b>),
    False,
    True,
    Null,
    Undefined,
}

impl<'a, 'b: 'a> Value<'a, 'b> {
    pub fn type_name(&self) -> String {
        match self {
            Value::UnsignedInteger(_) => "Unsigned Integer",
            Value::NegativeInteger(_) => "Negative Integer",
            Value::Bytes(_) => "Byte String",
            Value::Text(_) => "Text String",
            Value::Array(_) => "Array",
            Value::False => "False",
            Value::True => "True",
            Value::Null => "Null",
            Value::Undefined => "Undefined",
        }
        .to_string()
    }
}

fn parse_uint_minor(data: &[u8], offset: &mut usize, minor: u8) -> Result<u64, Error> {
    let take = |offset: &mut usize, n: usize| -> Result<&[u8], Error> {
        let end = offset.checked_add(n).ok_or(Error::NotEnoughData)?;
        let bytes = data.get(*offset..end).ok_or(Error::NotEnoughData)?;
        *offset = end;
        Ok(bytes)
    };

    match minor {
        0..=23 => Ok(minor as u64),
        24 => Ok(take(offset, 1)?[0] as u64),
        25 => Ok(u16::from_be_bytes(take(offset, 2)?.try_into().unwrap()) as u64),
        26 => Ok(u32::from_be_bytes(take(offset, 4)?.try_into().unwrap()) as u64),
        27 => Ok(u64::from_be_bytes(take(offset, 8)?.try_into().unwrap())),
        minor => Err(Error::InvalidMinorValue(minor)),
    }
}

fn parse_value_at<'b, T, E, F>(data: &'b [u8], depth: usize, f: F) -> Result<(T, usize), E>
where
    F: FnOnce(Value<'_, 'b>) -> Result<T, E>,
    E: From<Error>,
{
    let mut offset = 0;
    let ib = *data.get(offset).ok_or(Error::NotEnoughData)?;
    offset += 1;

    let (major, minor) = (ib >> 5, ib & 0x1F);
    let t = match (major, minor) {
        (0, minor) => f(Value::UnsignedInteger(parse_uint_minor(
            data,
            &mut offset,
            minor,
        )?))?,
        (1, minor) => f(Value::NegativeInteger(parse_uint_minor(
            data,
            &mut offset,
            minor,
        )?))?,
        (2, 31) | (3, 31) => return Err(Error::InvalidChunk.into()),
        (2, minor) | (3, minor) => {
            let len = parse_uint_minor(data, &mut offset, minor)? as usize;
            let end = offset.checked_add(len).ok_or(Error::NotEnoughData)?;
            let content = data.get(offset..end).ok_or(Error::NotEnoughData)?;
            offset = end;
            if major == 2 {
                f(Value::Bytes(content))?
            } else {
                f(Value::Text(std::str::from_utf8(content).map_err(Error::from)?))?
            }
        }
        (4, minor) => {
            if depth >= MAX_NESTING {
                return Err(Error::MaxNesting.into());
            }
            let count = if minor == 31 {
                None
            } else {
                Some(parse_uint_minor(data, &mut offset, minor)? as usize)
            };
            let mut a = Array {
                data,
                count,
                offset,
                idx: 0,
                depth: depth + 1,
            };
            let t = f(Value::Array(&mut a))?;
            a.drain()?;
            offset = a.offset;
            t
        }
        (5, _) => return Err(Error::Unsupported("map").into()),
        (6, _) => return Err(Error::Unsupported("tag").into()),
        (7, 20) => f(Value::False)?,
        (7, 21) => f(Value::True)?,
        (7, 22) => f(Value::Null)?,
        (7, 23) => f(Value::Undefined)?,
        (7, 25..=27) => return Err(Error::Unsupported("floating-point value").into()),
        (7, minor) => return Err(Error::InvalidMinorValue(minor).into()),
        _ => unreachable!(),
    };
    Ok((t, offset))
}

/// Parser over the items of a single (definite or indefinite) array.
///
/// Offsets reported by [`Array::offset`] and passed to item closures are
/// relative to the buffer the array was parsed from, which lets callers
/// compute the byte extents of items for CRC calculations.
pub struct Array<'b> {
    data: &'b [u8],
    count: Option<usize>,
    offset: usize,
    idx: usize,
    depth: usize,
}

impl<'b> Array<'b> {
    pub fn count(&self) -> Option<usize> {
        self.count
    }

    pub fn is_definite(&self) -> bool {
        self.count.is_some()
    }

    /// Current parse position, relative to the enclosing buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn check_for_end(&mut self) -> Result<bool, Error> {
        if let Some(count) = self.count {
            match self.idx.cmp(&count) {
                std::cmp::Ordering::Greater => Ok(true),
                std::cmp::Ordering::Equal => {
                    self.idx += 1;
                    Ok(true)
                }
                std::cmp::Ordering::Less => Ok(false),
            }
        } else if self.offset >= self.data.len() {
            Err(Error::NotEnoughData)
        } else if self.data[self.offset] == 0xFF {
            self.count = Some(self.idx);
            self.idx += 1;
            self.offset += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// If the array has ended, the offset just past it (including any
    /// break code); `None` when items remain.
    pub fn end(&mut self) -> Result<Option<usize>, Error> {
        if self.check_for_end()? {
            Ok(Some(self.offset))
        } else {
            Ok(None)
        }
    }

    fn drain(&mut self) -> Result<(), Error> {
        while self.try_parse_value(|_| Ok::<_, Error>(()))?.is_some() {}
        Ok(())
    }

    /// Parse the next item, or `None` at the end of the array.
    pub fn try_parse_value<T, E, F>(&mut self, f: F) -> Result<Option<T>, E>
    where
        F: FnOnce(Value<'_, 'b>) -> Result<T, E>,
        E: From<Error>,
    {
        if self.check_for_end()? {
            return Ok(None);
        }
        let (t, len) = parse_value_at(&self.data[self.offset..], self.depth, f)?;
        self.idx += 1;
        self.offset += len;
        Ok(Some(t))
    }

    pub fn parse_value<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(Value<'_, 'b>) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(f)?.ok_or(Error::NotEnoughData.into())
    }

    pub fn try_parse<T>(&mut self) -> Result<Option<T>, T::Error>
    where
        T: FromCbor,
    {
        if self.check_for_end()? {
            return Ok(None);
        }
        let (value, len) = T::from_cbor(&self.data[self.offset..])?;
        self.idx += 1;
        self.offset += len;
        Ok(Some(value))
    }

    pub fn parse<T>(&mut self) -> Result<T, T::Error>
    where
        T: FromCbor,
    {
        self.try_parse::<T>()?
            .ok_or(Error::NotEnoughData.into())
    }

    pub fn parse_array<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Array<'b>) -> Result<T, E>,
        E: From<Error>,
    {
        self.parse_value(|value| match value {
            Value::Array(a) => f(a),
            value => {
                Err(Error::IncorrectType("Array".to_string(), value.type_name()).into())
            }
        })
    }
}

/// Parse a single value from the front of `data`, returning the closure
/// result and the number of bytes consumed.
pub fn parse_value<'b, T, E, F>(data: &'b [u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(Value<'_, 'b>) -> Result<T, E>,
    E: From<Error>,
{
    parse_value_at(data, 0, f)
}

/// Parse a single array from the front of `data`.
pub fn parse_array<'b, T, E, F>(data: &'b [u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Array<'b>) -> Result<T, E>,
    E: From<Error>,
{
    parse_value(data, |value| match value {
        Value::Array(a) => f(a),
        value => Err(Error::IncorrectType("Array".to_string(), value.type_name()).into()),
    })
}

/// Parse a complete value of type `T`, ignoring any trailing bytes.
pub fn parse<T>(data: &[u8]) -> Result<T, T::Error>
where
    T: FromCbor,
{
    T::from_cbor(data).map(|(v, _)| v)
}

/// Parse a value of type `T` and report the bytes consumed.
pub fn try_parse<T>(data: &[u8]) -> Result<(T, usize), T::Error>
where
    T: FromCbor,
{
    T::from_cbor(data)
}

impl FromCbor for u64 {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        parse_value(data, |value| match value {
            Value::UnsignedInteger(n) => Ok(n),
            value => Err(Error::IncorrectType(
                "Unsigned Integer".to_string(),
                value.type_name(),
            )),
        })
    }
}

impl FromCbor for u32 {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (v, len) = u64::from_cbor(data)?;
        Ok((v.try_into()?, len))
    }
}

impl FromCbor for u16 {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (v, len) = u64::from_cbor(data)?;
        Ok((v.try_into()?, len))
    }
}

impl FromCbor for u8 {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (v, len) = u64::from_cbor(data)?;
        Ok((v.try_into()?, len))
    }
}

impl FromCbor for usize {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (v, len) = u64::from_cbor(data)?;
        Ok((v.try_into()?, len))
    }
}

impl FromCbor for bool {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        parse_value(data, |value| match value {
            Value::False => Ok(false),
            Value::True => Ok(true),
            value => Err(Error::IncorrectType(
                "Boolean".to_string(),
                value.type_name(),
            )),
        })
    }
}

impl FromCbor for String {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        parse_value(data, |value| match value {
            Value::Text(s) => Ok(s.to_string()),
            value => Err(Error::IncorrectType(
                "Text String".to_string(),
                value.type_name(),
            )),
        })
    }
}

impl FromCbor for Vec<u8> {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        parse_value(data, |value| match value {
            Value::Bytes(b) => Ok(b.to_vec()),
            value => Err(Error::IncorrectType(
                "Byte String".to_string(),
                value.type_name(),
            )),
        })
    }
}
