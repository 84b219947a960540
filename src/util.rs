/// Checks that a numerical value is in the provided interval `[a,b]` and returns early
/// with [`MemoryError::OutOfInterval`](crate::MemoryError::OutOfInterval) if not
///
/// ### Example
/// ```ignore
/// let alpha = 2.0;
/// ensure_interval!(alpha, 0.0, 1.0);
/// ```
/// This will return an error displayed as "invalid value for \`alpha\`: 2, must be in the interval \[0, 1\]"
macro_rules! ensure_interval {
    ($var:expr, $a:expr, $b:expr) => {
        if !($var >= $a && $var <= $b) {
            return Err($crate::MemoryError::OutOfInterval {
                name: stringify!($var),
                value: $var,
                min: $a,
                max: $b,
            });
        }
    };
}

pub(crate) use ensure_interval;

#[cfg(test)]
mod tests {
    use crate::MemoryError;

    fn check(alpha: f32) -> Result<(), MemoryError> {
        ensure_interval!(alpha, 0.0, 1.0);
        Ok(())
    }

    #[test]
    fn ensure_interval_functional() {
        assert!(check(0.0).is_ok());
        assert!(check(1.0).is_ok());
        assert_eq!(
            check(1.5),
            Err(MemoryError::OutOfInterval {
                name: "alpha",
                value: 1.5,
                min: 0.0,
                max: 1.0,
            })
        );
        assert!(check(f32::NAN).is_err(), "NaN is rejected");
    }
}
