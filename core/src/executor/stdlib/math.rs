//! Math stdlib functions

use super::arg;
use crate::executor::values::{to_number, EvalResult, Val};

fn unary(args: &[Val], f: impl Fn(f64) -> f64) -> EvalResult {
    Ok(Val::Num(f(to_number(&arg(args, 0)))))
}

/// Math.floor(x)
pub fn floor(args: &[Val]) -> EvalResult {
    unary(args, f64::floor)
}

/// Math.ceil(x)
pub fn ceil(args: &[Val]) -> EvalResult {
    unary(args, f64::ceil)
}

/// Math.abs(x)
pub fn abs(args: &[Val]) -> EvalResult {
    unary(args, f64::abs)
}

/// Math.round(x) - halves round towards +Infinity
pub fn round(args: &[Val]) -> EvalResult {
    unary(args, |n| (n + 0.5).floor())
}

pub fn trunc(args: &[Val]) -> EvalResult {
    unary(args, f64::trunc)
}

pub fn sign(args: &[Val]) -> EvalResult {
    unary(args, |n| if n == 0.0 || n.is_nan() { n } else { n.signum() })
}

pub fn sqrt(args: &[Val]) -> EvalResult {
    unary(args, f64::sqrt)
}

pub fn pow(args: &[Val]) -> EvalResult {
    Ok(Val::Num(
        to_number(&arg(args, 0)).powf(to_number(&arg(args, 1))),
    ))
}

/// Math.min(...values); `Infinity` with no arguments
pub fn min(args: &[Val]) -> EvalResult {
    Ok(Val::Num(args.iter().map(to_number).fold(f64::INFINITY, |acc, n| {
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            acc.min(n)
        }
    })))
}

/// Math.max(...values); `-Infinity` with no arguments
pub fn max(args: &[Val]) -> EvalResult {
    Ok(Val::Num(args.iter().map(to_number).fold(f64::NEG_INFINITY, |acc, n| {
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            acc.max(n)
        }
    })))
}

/// Math.random() in [0, 1), drawn from a v4 UUID's random bits
pub fn random(_args: &[Val]) -> EvalResult {
    let bits = uuid::Uuid::new_v4().as_u128() & ((1u128 << 53) - 1);
    Ok(Val::Num(bits as f64 / (1u64 << 53) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: EvalResult) -> f64 {
        match v {
            Ok(Val::Num(n)) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(num(round(&[Val::Num(2.5)])), 3.0);
        assert_eq!(num(round(&[Val::Num(-2.5)])), -2.0);
    }

    #[test]
    fn test_min_max_empty_and_nan() {
        assert_eq!(num(min(&[])), f64::INFINITY);
        assert_eq!(num(max(&[Val::Num(1.0), Val::Num(7.0)])), 7.0);
        assert!(num(max(&[Val::Num(1.0), Val::str("x")])).is_nan());
    }

    #[test]
    fn test_random_in_unit_interval() {
        for _ in 0..100 {
            let n = num(random(&[]));
            assert!((0.0..1.0).contains(&n));
        }
    }
}
