//! Point-at-a-time stages
//!
//! Constant arithmetic and the per-second derivative. Both consume one
//! point and yield at most one, so they run in either pipeline.

use crate::query::{QueryError, QueryResult};
use crate::stage::StageArg;
use crate::storage::DataPoint;
use serde::Serialize;

/// Arithmetic applied by a constant transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Applies `value (op) constant` to every point
///
/// Integer points use the constant truncated to an integer and wrap on
/// overflow; floating points use the constant as-is. An integer point
/// divided by a fractional constant that truncates to zero is divided in
/// floating point instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantTransform {
    op: ArithmeticOp,
    constant: f64,
}

impl ConstantTransform {
    /// Build from the stage's first argument
    pub fn new(stage: &str, op: ArithmeticOp, arg: &StageArg) -> QueryResult<Self> {
        let constant = arg.as_f64().ok_or_else(|| QueryError::InvalidStageArgument {
            stage: stage.to_string(),
            reason: format!("constant '{}' is not a number", arg),
        })?;

        if op == ArithmeticOp::Divide && constant == 0.0 {
            return Err(QueryError::InvalidStageArgument {
                stage: stage.to_string(),
                reason: format!("divisor '{}' is zero", arg),
            });
        }

        Ok(Self { op, constant })
    }

    /// Transform one point, preserving its timestamp and representation
    pub fn apply(&self, point: DataPoint) -> DataPoint {
        if point.is_fp() {
            let value = point.double_value();
            let result = match self.op {
                ArithmeticOp::Add => value + self.constant,
                ArithmeticOp::Subtract => value - self.constant,
                ArithmeticOp::Multiply => value * self.constant,
                ArithmeticOp::Divide => value / self.constant,
            };
            point.with_double(result)
        } else {
            let value = point.long_value();
            let constant = self.constant as i64;
            if self.op == ArithmeticOp::Divide && constant == 0 {
                return point.with_double(value as f64 / self.constant);
            }
            let result = match self.op {
                ArithmeticOp::Add => value.wrapping_add(constant),
                ArithmeticOp::Subtract => value.wrapping_sub(constant),
                ArithmeticOp::Multiply => value.wrapping_mul(constant),
                ArithmeticOp::Divide => value.wrapping_div(constant),
            };
            point.with_long(result)
        }
    }
}

/// Per-second rate of change between consecutive points
///
/// The first point only primes the state. A point whose timestamp does not
/// advance past its predecessor yields nothing. Output is always floating.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derivative {
    previous: Option<DataPoint>,
}

impl Derivative {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one point; returns the rate once two points have been seen
    pub fn apply(&mut self, point: DataPoint) -> Option<DataPoint> {
        let previous = self.previous.replace(point)?;

        let elapsed_ms = point.timestamp - previous.timestamp;
        if elapsed_ms <= 0 {
            return None;
        }

        let rate = (point.as_f64() - previous.as_f64()) / (elapsed_ms as f64 / 1000.0);
        Some(DataPoint::from_double(point.timestamp, rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(op: ArithmeticOp, arg: StageArg) -> ConstantTransform {
        ConstantTransform::new("test", op, &arg).unwrap()
    }

    #[test]
    fn test_integer_add_uses_truncated_constant() {
        let add = constant(ArithmeticOp::Add, StageArg::Float(2.9));
        let out = add.apply(DataPoint::from_long(10, 5));
        assert!(!out.is_fp());
        assert_eq!(out.long_value(), 7);
        assert_eq!(out.timestamp, 10);
    }

    #[test]
    fn test_float_add_uses_full_constant() {
        let add = constant(ArithmeticOp::Add, StageArg::Float(2.5));
        let out = add.apply(DataPoint::from_double(10, 1.0));
        assert!(out.is_fp());
        assert_eq!(out.double_value(), 3.5);
    }

    #[test]
    fn test_all_ops() {
        let point = DataPoint::from_long(1, 20);
        assert_eq!(constant(ArithmeticOp::Subtract, StageArg::Int(5)).apply(point).long_value(), 15);
        assert_eq!(constant(ArithmeticOp::Multiply, StageArg::Int(3)).apply(point).long_value(), 60);
        assert_eq!(constant(ArithmeticOp::Divide, StageArg::Int(6)).apply(point).long_value(), 3);

        let point = DataPoint::from_double(1, 3.0);
        assert_eq!(constant(ArithmeticOp::Divide, StageArg::Int(2)).apply(point).double_value(), 1.5);
    }

    #[test]
    fn test_integer_overflow_wraps() {
        let add = constant(ArithmeticOp::Add, StageArg::Int(1));
        assert_eq!(add.apply(DataPoint::from_long(0, i64::MAX)).long_value(), i64::MIN);
    }

    #[test]
    fn test_rejects_text_constant() {
        let err = ConstantTransform::new("add", ArithmeticOp::Add, &StageArg::Str("x".into()))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidStageArgument { .. }));
    }

    #[test]
    fn test_rejects_zero_divisor() {
        for arg in [StageArg::Int(0), StageArg::Float(0.0)] {
            assert!(ConstantTransform::new("div", ArithmeticOp::Divide, &arg).is_err());
        }
        assert!(ConstantTransform::new("mult", ArithmeticOp::Multiply, &StageArg::Int(0)).is_ok());
    }

    #[test]
    fn test_fractional_divisor() {
        let div = constant(ArithmeticOp::Divide, StageArg::Float(0.5));
        assert_eq!(div.apply(DataPoint::from_double(1, 3.0)).double_value(), 6.0);

        // Truncated divisor would be zero; integer points divide as doubles
        let out = div.apply(DataPoint::from_long(1, 3));
        assert!(out.is_fp());
        assert_eq!(out.double_value(), 6.0);

        let div = constant(ArithmeticOp::Divide, StageArg::Float(2.5));
        assert_eq!(div.apply(DataPoint::from_long(1, 7)).long_value(), 3);
    }

    #[test]
    fn test_derivative() {
        let mut derivative = Derivative::new();
        assert!(derivative.apply(DataPoint::from_long(1000, 10)).is_none());

        let out = derivative.apply(DataPoint::from_long(3000, 30)).unwrap();
        assert!(out.is_fp());
        assert_eq!(out.timestamp, 3000);
        assert_eq!(out.double_value(), 10.0);

        let out = derivative.apply(DataPoint::from_double(3500, 25.0)).unwrap();
        assert_eq!(out.double_value(), -10.0);
    }

    #[test]
    fn test_derivative_skips_non_advancing_timestamps() {
        let mut derivative = Derivative::new();
        derivative.apply(DataPoint::from_long(1000, 10));
        assert!(derivative.apply(DataPoint::from_long(1000, 20)).is_none());
        let out = derivative.apply(DataPoint::from_long(2000, 40)).unwrap();
        assert_eq!(out.double_value(), 20.0);
    }
}
