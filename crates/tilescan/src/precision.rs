use core::fmt::Debug;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Element types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElemType {
    F16,
    BF16,
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl ElemType {
    /// Size of one element in bytes.
    pub const fn size(&self) -> usize {
        match self {
            ElemType::I8 | ElemType::U8 => 1,
            ElemType::F16 | ElemType::BF16 | ElemType::I16 | ElemType::U16 => 2,
            ElemType::F32 | ElemType::I32 | ElemType::U32 => 4,
            ElemType::F64 | ElemType::I64 | ElemType::U64 => 8,
        }
    }

    /// Whether the type is a floating point type.
    pub const fn is_float(&self) -> bool {
        matches!(
            self,
            ElemType::F16 | ElemType::BF16 | ElemType::F32 | ElemType::F64
        )
    }
}

/// A value that can be scanned.
///
/// `combine` is the addition used by every network. Integers wrap on overflow so that an integer
/// scan is exact modulo `2^bits` whatever the order of the additions.
pub trait ScanNumeric:
    Zero + Copy + Default + PartialEq + Debug + Send + Sync + bytemuck::Pod + 'static
{
    const ELEM: ElemType;

    fn combine(self, rhs: Self) -> Self;
}

macro_rules! impl_scan_numeric {
    (float: $($ty:ty => $elem:ident),*) => {
        $(impl ScanNumeric for $ty {
            const ELEM: ElemType = ElemType::$elem;

            #[inline(always)]
            fn combine(self, rhs: Self) -> Self {
                self + rhs
            }
        })*
    };
    (int: $($ty:ty => $elem:ident),*) => {
        $(impl ScanNumeric for $ty {
            const ELEM: ElemType = ElemType::$elem;

            #[inline(always)]
            fn combine(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
        })*
    };
}

impl_scan_numeric!(float: half::f16 => F16, half::bf16 => BF16, f32 => F32, f64 => F64);
impl_scan_numeric!(int: i8 => I8, i16 => I16, i32 => I32, i64 => I64, u8 => U8, u16 => U16, u32 => U32, u64 => U64);

/// Precision used for the scan.
///
/// Values are promoted to the accumulator type when loaded in a local buffer and demoted when
/// written back, so every addition happens in `EA`.
pub trait ScanPrecision: Send + Sync + 'static {
    /// Precision used for the input and output tensors.
    type EI: ScanNumeric;
    /// Precision used for the accumulation.
    type EA: ScanNumeric;

    fn promote(value: Self::EI) -> Self::EA;
    fn demote(value: Self::EA) -> Self::EI;
}

macro_rules! impl_scan_precision_identity {
    ($($ty:ty),*) => {
        $(impl ScanPrecision for $ty {
            type EI = $ty;
            type EA = $ty;

            #[inline(always)]
            fn promote(value: Self::EI) -> Self::EA {
                value
            }

            #[inline(always)]
            fn demote(value: Self::EA) -> Self::EI {
                value
            }
        })*
    };
}

impl_scan_precision_identity!(f32, f64, i8, i16, i32, i64, u8, u16, u32, u64);

impl ScanPrecision for half::f16 {
    type EI = half::f16;
    type EA = f32;

    #[inline(always)]
    fn promote(value: Self::EI) -> Self::EA {
        value.to_f32()
    }

    #[inline(always)]
    fn demote(value: Self::EA) -> Self::EI {
        half::f16::from_f32(value)
    }
}

impl ScanPrecision for half::bf16 {
    type EI = half::bf16;
    type EA = f32;

    #[inline(always)]
    fn promote(value: Self::EI) -> Self::EA {
        value.to_f32()
    }

    #[inline(always)]
    fn demote(value: Self::EA) -> Self::EI {
        half::bf16::from_f32(value)
    }
}

impl ScanPrecision for (f32, f64) {
    type EI = f32;
    type EA = f64;

    #[inline(always)]
    fn promote(value: Self::EI) -> Self::EA {
        value as f64
    }

    #[inline(always)]
    fn demote(value: Self::EA) -> Self::EI {
        value as f32
    }
}

impl ScanPrecision for (half::f16, f64) {
    type EI = half::f16;
    type EA = f64;

    #[inline(always)]
    fn promote(value: Self::EI) -> Self::EA {
        value.to_f64()
    }

    #[inline(always)]
    fn demote(value: Self::EA) -> Self::EI {
        half::f16::from_f64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_wrap_instead_of_overflowing() {
        assert_eq!(250u8.combine(10), 4);
        assert_eq!(i32::MAX.combine(1), i32::MIN);
    }

    #[test]
    fn half_precision_accumulates_in_f32() {
        let big = half::f16::from_f32(2048.0);
        let one = half::f16::from_f32(1.0);

        // 2048 + 1 is not representable in f16 and rounds back to 2048.
        assert_eq!(big.combine(one), big);

        let acc = <half::f16 as ScanPrecision>::promote(big) + 4.0;
        assert_eq!(<half::f16 as ScanPrecision>::demote(acc).to_f32(), 2052.0);
    }

    #[test]
    fn elem_sizes() {
        assert_eq!(<half::bf16 as ScanNumeric>::ELEM.size(), 2);
        assert_eq!(
            <<(f32, f64) as ScanPrecision>::EA as ScanNumeric>::ELEM,
            ElemType::F64
        );
        assert!(!ElemType::U64.is_float());
    }
}
