#![forbid(unsafe_code)]

/// Fixed-width key dtypes supported by FrankenKeys kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

pub const ALL_KEY_DTYPES: [KeyDType; 10] = [
    KeyDType::I8,
    KeyDType::I16,
    KeyDType::I32,
    KeyDType::I64,
    KeyDType::U8,
    KeyDType::U16,
    KeyDType::U32,
    KeyDType::U64,
    KeyDType::F32,
    KeyDType::F64,
];

impl KeyDType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    #[must_use]
    pub const fn item_size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    #[must_use]
    pub const fn bit_width(self) -> u32 {
        (self.item_size() * 8) as u32
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "i8" | "int8" | "char" => Some(Self::I8),
            "i16" | "int16" | "short" => Some(Self::I16),
            "i32" | "int32" | "int" => Some(Self::I32),
            "i64" | "int64" | "long" | "longlong" => Some(Self::I64),
            "u8" | "uint8" | "uchar" => Some(Self::U8),
            "u16" | "uint16" | "ushort" => Some(Self::U16),
            "u32" | "uint32" | "uint" => Some(Self::U32),
            "u64" | "uint64" | "ulong" | "ulonglong" => Some(Self::U64),
            "f32" | "float32" | "float" => Some(Self::F32),
            "f64" | "float64" | "double" => Some(Self::F64),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_signed_integer(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    #[must_use]
    pub const fn is_unsigned_integer(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }

    /// Returns `true` if this is a signed or unsigned integer type.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    /// Returns `true` if this is a floating-point type.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// Renders a key value as human-readable text.
///
/// Integers render in plain decimal. Floats render in fixed notation with six
/// fractional digits, so `2.5` becomes `2.500000`.
pub trait FormatValue {
    fn format_value(&self) -> String;
}

/// A fixed-width scalar whose identity is its bit pattern.
///
/// Bit patterns travel through `u64`: `to_bits` zero-extends, `from_bits`
/// keeps only the low [`KeyScalar::BITS`] bits.
pub trait KeyScalar: Copy + PartialEq + PartialOrd + std::fmt::Debug + FormatValue {
    const DTYPE: KeyDType;
    const BITS: u32 = Self::DTYPE.bit_width();

    fn from_bits(bits: u64) -> Self;

    fn to_bits(self) -> u64;

    /// Saturating numeric conversion, used to load keys from JSON fixtures.
    fn from_f64(value: f64) -> Self;

    /// Mask covering every bit of the type.
    #[must_use]
    fn width_mask() -> u64 {
        if Self::BITS >= 64 {
            u64::MAX
        } else {
            (1_u64 << Self::BITS) - 1
        }
    }

    #[must_use]
    fn zero() -> Self {
        Self::from_bits(0)
    }

    #[must_use]
    fn is_nan(self) -> bool {
        false
    }

    /// Exact key equality. Integers compare by value; floats compare by value
    /// and additionally treat identical bit patterns as equal so that a NaN
    /// matches itself.
    #[must_use]
    fn key_eq(self, other: Self) -> bool {
        self == other
    }

    /// Maps the key onto an unsigned integer whose natural order matches the
    /// key's numeric order. Used by radix-style kernels.
    fn ordered_bits(self) -> u64;
}

macro_rules! impl_unsigned_key {
    ($ty:ty, $dtype:expr) => {
        impl FormatValue for $ty {
            fn format_value(&self) -> String {
                self.to_string()
            }
        }

        impl KeyScalar for $ty {
            const DTYPE: KeyDType = $dtype;

            fn from_bits(bits: u64) -> Self {
                bits as $ty
            }

            fn to_bits(self) -> u64 {
                u64::from(self)
            }

            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            fn ordered_bits(self) -> u64 {
                u64::from(self)
            }
        }
    };
}

macro_rules! impl_signed_key {
    ($ty:ty, $unsigned:ty, $dtype:expr) => {
        impl FormatValue for $ty {
            fn format_value(&self) -> String {
                self.to_string()
            }
        }

        impl KeyScalar for $ty {
            const DTYPE: KeyDType = $dtype;

            fn from_bits(bits: u64) -> Self {
                bits as $unsigned as $ty
            }

            fn to_bits(self) -> u64 {
                u64::from(self as $unsigned)
            }

            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            fn ordered_bits(self) -> u64 {
                // Flipping the sign bit moves negatives below positives.
                u64::from((self as $unsigned) ^ (1 << (<$unsigned>::BITS - 1)))
            }
        }
    };
}

impl_unsigned_key!(u8, KeyDType::U8);
impl_unsigned_key!(u16, KeyDType::U16);
impl_unsigned_key!(u32, KeyDType::U32);
impl_unsigned_key!(u64, KeyDType::U64);
impl_signed_key!(i8, u8, KeyDType::I8);
impl_signed_key!(i16, u16, KeyDType::I16);
impl_signed_key!(i32, u32, KeyDType::I32);
impl_signed_key!(i64, u64, KeyDType::I64);

macro_rules! impl_float_key {
    ($ty:ty, $bits:ty, $dtype:expr) => {
        impl FormatValue for $ty {
            fn format_value(&self) -> String {
                format!("{self:.6}")
            }
        }

        impl KeyScalar for $ty {
            const DTYPE: KeyDType = $dtype;

            fn from_bits(bits: u64) -> Self {
                <$ty>::from_bits(bits as $bits)
            }

            fn to_bits(self) -> u64 {
                u64::from(<$ty>::to_bits(self))
            }

            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            fn is_nan(self) -> bool {
                <$ty>::is_nan(self)
            }

            fn key_eq(self, other: Self) -> bool {
                self == other || <$ty>::to_bits(self) == <$ty>::to_bits(other)
            }

            fn ordered_bits(self) -> u64 {
                let bits = <$ty>::to_bits(self);
                let sign = 1 << (<$bits>::BITS - 1);
                if bits & sign == 0 {
                    u64::from(bits | sign)
                } else {
                    u64::from(!bits)
                }
            }
        }
    };
}

impl_float_key!(f32, u32, KeyDType::F32);
impl_float_key!(f64, u64, KeyDType::F64);

#[cfg(test)]
mod tests {
    use super::{ALL_KEY_DTYPES, FormatValue, KeyDType, KeyScalar};

    #[test]
    fn parse_roundtrip_for_known_dtypes() {
        for dtype in ALL_KEY_DTYPES {
            assert_eq!(KeyDType::parse(dtype.name()), Some(dtype));
        }
        assert_eq!(KeyDType::parse("double"), Some(KeyDType::F64));
        assert_eq!(KeyDType::parse("uint"), Some(KeyDType::U32));
        assert_eq!(KeyDType::parse("complex64"), None);
    }

    #[test]
    fn bit_widths_follow_item_size() {
        assert_eq!(KeyDType::U8.bit_width(), 8);
        assert_eq!(KeyDType::I16.bit_width(), 16);
        assert_eq!(KeyDType::F32.bit_width(), 32);
        assert_eq!(KeyDType::U64.bit_width(), 64);
        assert_eq!(<i64 as KeyScalar>::BITS, 64);
        assert_eq!(<u8 as KeyScalar>::width_mask(), 0xFF);
        assert_eq!(<u64 as KeyScalar>::width_mask(), u64::MAX);
    }

    #[test]
    fn dtype_kind_predicates_partition() {
        for dtype in ALL_KEY_DTYPES {
            let kinds = [
                dtype.is_signed_integer(),
                dtype.is_unsigned_integer(),
                dtype.is_float(),
            ];
            assert_eq!(kinds.iter().filter(|k| **k).count(), 1, "{dtype:?}");
            assert_eq!(dtype.is_integer(), !dtype.is_float());
        }
    }

    #[test]
    fn bits_truncate_to_type_width() {
        assert_eq!(<u8 as KeyScalar>::from_bits(0x1234), 0x34);
        assert_eq!(<i8 as KeyScalar>::from_bits(0xFF), -1);
        assert_eq!(<i16 as KeyScalar>::to_bits(-1), 0xFFFF);
        assert_eq!(<i32 as KeyScalar>::to_bits(-2), 0xFFFF_FFFE);
        assert_eq!(<f32 as KeyScalar>::from_bits(0x3F80_0000), 1.0);
        assert_eq!(<f64 as KeyScalar>::to_bits(1.0), 0x3FF0_0000_0000_0000);
        assert_eq!(<u32 as KeyScalar>::zero(), 0);
        assert_eq!(<f64 as KeyScalar>::zero().to_bits(), 0);
    }

    #[test]
    fn float_nan_detection_and_key_equality() {
        let nan = <f32 as KeyScalar>::from_bits(0x7FC0_0001);
        assert!(KeyScalar::is_nan(nan));
        assert!(nan.key_eq(nan));
        assert!(!nan.key_eq(f32::NAN.copysign(-1.0)));
        assert!(0.0_f64.key_eq(-0.0));
        assert!(!1.0_f64.key_eq(1.000_000_1));
        assert!(!KeyScalar::is_nan(7_u32));
    }

    #[test]
    fn ordered_bits_preserve_numeric_order() {
        let ints = [i32::MIN, -7, -1, 0, 1, 9, i32::MAX];
        for pair in ints.windows(2) {
            assert!(pair[0].ordered_bits() < pair[1].ordered_bits(), "{pair:?}");
        }
        let floats = [f64::NEG_INFINITY, -3.5, -0.0, 0.0, 1e-300, 2.0, f64::INFINITY];
        for pair in floats.windows(2) {
            assert!(pair[0].ordered_bits() < pair[1].ordered_bits(), "{pair:?}");
        }
        assert!(200_u8.ordered_bits() > 100_u8.ordered_bits());
    }

    #[test]
    fn format_value_specializations() {
        assert_eq!(42_u8.format_value(), "42");
        assert_eq!((-5_i16).format_value(), "-5");
        assert_eq!(u64::MAX.format_value(), "18446744073709551615");
        assert_eq!(2.5_f32.format_value(), "2.500000");
        assert_eq!((-0.125_f64).format_value(), "-0.125000");
    }

    #[test]
    fn from_f64_saturates_into_range() {
        assert_eq!(<u8 as KeyScalar>::from_f64(300.0), 255);
        assert_eq!(<i16 as KeyScalar>::from_f64(-7.9), -7);
        assert_eq!(<u32 as KeyScalar>::from_f64(-1.0), 0);
        assert_eq!(<f32 as KeyScalar>::from_f64(0.5), 0.5);
    }
}
