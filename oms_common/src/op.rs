//! Boilerplate generators for arithmetic on single-field newtypes.

/// Implements a `std::ops` trait for a newtype wrapping a single numeric field.
///
/// * `op!(binary Money, Add, add)` implements `Add<Money> for Money`
/// * `op!(inplace Money, AddAssign, add_assign)` implements `AddAssign<Money> for Money`
/// * `op!(unary Money, Neg, neg)` implements `Neg for Money`
#[macro_export]
macro_rules! op {
    (binary $type:ty, $trt:ident, $method:ident) => {
        impl $trt for $type {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self(self.0.$method(rhs.0))
            }
        }
    };
    (inplace $type:ty, $trt:ident, $method:ident) => {
        impl $trt for $type {
            fn $method(&mut self, rhs: Self) {
                self.0.$method(rhs.0)
            }
        }
    };
    (unary $type:ty, $trt:ident, $method:ident) => {
        impl $trt for $type {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self(self.0.$method())
            }
        }
    };
}
