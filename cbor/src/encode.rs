/// A type that can be written to a CBOR [`Encoder`].
pub trait ToCbor {
    fn to_cbor(&self, encoder: &mut Encoder);
}

#[derive(Default)]
pub struct Encoder {
    data: Vec<u8>,
}

impl Encoder {
    fn emit_uint_minor(&mut self, major: u8, val: u64) {
        if val < 24 {
            self.data.push((major << 5) | (val as u8));
        } else if val <= u8::MAX as u64 {
            self.data.push((major << 5) | 24u8);
            self.data.push(val as u8);
        } else if val <= u16::MAX as u64 {
            self.data.push((major << 5) | 25u8);
            self.data.extend(&(val as u16).to_be_bytes());
        } else if val <= u32::MAX as u64 {
            self.data.push((major << 5) | 26u8);
            self.data.extend(&(val as u32).to_be_bytes());
        } else {
            self.data.push((major << 5) | 27u8);
            self.data.extend(&val.to_be_bytes());
        }
    }

    /// Number of bytes emitted so far.
    pub fn offset(&self) -> usize {
        self.data.len()
    }

    /// Splice pre-encoded CBOR into the output unchanged.
    pub fn emit_raw(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    pub fn emit<T>(&mut self, value: &T)
    where
        T: ToCbor + ?Sized,
    {
        value.to_cbor(self)
    }

    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        let mut a = Array::new(self, count);
        f(&mut a);
        a.end()
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// Encoder for the items of a single (definite or indefinite) array.
///
/// Definite-length arrays panic if the number of items emitted does not
/// match the declared count; the mismatch is a programming error that
/// would produce undecodable output.
pub struct Array<'a> {
    encoder: &'a mut Encoder,
    count: Option<usize>,
    idx: usize,
}

impl<'a> Array<'a> {
    fn new(encoder: &'a mut Encoder, count: Option<usize>) -> Self {
        match count {
            Some(count) => encoder.emit_uint_minor(4, count as u64),
            None => encoder.data.push((4 << 5) | 31),
        }
        Self {
            encoder,
            count,
            idx: 0,
        }
    }

    fn check_bounds(&mut self) {
        self.idx += 1;
        if let Some(count) = self.count {
            if self.idx > count {
                panic!("Too many items added to definite length array");
            }
        }
    }

    fn end(self) {
        match self.count {
            Some(count) => {
                if self.idx != count {
                    panic!(
                        "Definite length array is short of items: {}, expected {count}",
                        self.idx
                    );
                }
            }
            None => self.encoder.data.push(0xFF),
        }
    }

    /// Byte offset into the overall encoder output.
    pub fn offset(&self) -> usize {
        self.encoder.offset()
    }

    pub fn emit<T>(&mut self, value: &T)
    where
        T: ToCbor + ?Sized,
    {
        self.check_bounds();
        self.encoder.emit(value)
    }

    pub fn emit_raw(&mut self, data: &[u8]) {
        self.check_bounds();
        self.encoder.emit_raw(data)
    }

    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        self.check_bounds();
        self.encoder.emit_array(count, f)
    }

    /// Account for an item that will be spliced in later, e.g. a CRC value.
    pub fn skip_value(&mut self) {
        self.check_bounds()
    }
}

impl ToCbor for u64 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(0, *self)
    }
}

impl ToCbor for u32 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(0, *self as u64)
    }
}

impl ToCbor for u16 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(0, *self as u64)
    }
}

impl ToCbor for u8 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(0, *self as u64)
    }
}

impl ToCbor for usize {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(0, *self as u64)
    }
}

impl ToCbor for i64 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        if *self >= 0 {
            encoder.emit_uint_minor(0, *self as u64)
        } else {
            encoder.emit_uint_minor(1, i64::unsigned_abs(*self) - 1)
        }
    }
}

impl ToCbor for bool {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.data.push((7 << 5) | if *self { 21 } else { 20 });
    }
}

impl ToCbor for str {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(3, self.len() as u64);
        encoder.data.extend(self.as_bytes());
    }
}

impl ToCbor for String {
    fn to_cbor(&self, encoder: &mut Encoder) {
        self.as_str().to_cbor(encoder)
    }
}

impl ToCbor for [u8] {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(2, self.len() as u64);
        encoder.data.extend(self);
    }
}

impl ToCbor for Vec<u8> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        self.as_slice().to_cbor(encoder)
    }
}

impl<T> ToCbor for Option<T>
where
    T: ToCbor,
{
    fn to_cbor(&self, encoder: &mut Encoder) {
        match self {
            Some(value) => encoder.emit(value),
            None => encoder.data.push((7 << 5) | 22),
        }
    }
}

impl<T> ToCbor for &T
where
    T: ToCbor + ?Sized,
{
    fn to_cbor(&self, encoder: &mut Encoder) {
        (*self).to_cbor(encoder)
    }
}

pub fn emit<T>(value: &T) -> Vec<u8>
where
    T: ToCbor + ?Sized,
{
    let mut e = Encoder::default();
    e.emit(value);
    e.build()
}

pub fn emit_array<F>(count: Option<usize>, f: F) -> Vec<u8>
where
    F: FnOnce(&mut Array),
{
    let mut e = Encoder::default();
    e.emit_array(count, f);
    e.build()
}

/// The header of a definite-length byte string, without its content.
///
/// Wire transports frame bundles as byte strings without copying the
/// bundle into an intermediate buffer; this gives them the prefix alone.
pub fn byte_string_header(len: u64) -> Vec<u8> {
    let mut e = Encoder::default();
    e.emit_uint_minor(2, len);
    e.build()
}
