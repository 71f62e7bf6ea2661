//! Number stdlib functions

use super::arg;
use crate::executor::errors::ErrorInfo;
use crate::executor::values::{number_to_string, to_js_string, to_number, EvalResult, Val};

pub const METHODS: &[&str] = &["toFixed", "toString", "toPrecision"];

/// Number(value)
pub fn construct(args: &[Val]) -> EvalResult {
    if args.is_empty() {
        return Ok(Val::Num(0.0));
    }
    Ok(Val::Num(to_number(&args[0])))
}

pub fn is_integer(args: &[Val]) -> EvalResult {
    Ok(Val::Bool(
        matches!(arg(args, 0), Val::Num(n) if n.is_finite() && n.fract() == 0.0),
    ))
}

/// Number.isFinite - no coercion
pub fn is_finite_strict(args: &[Val]) -> EvalResult {
    Ok(Val::Bool(matches!(arg(args, 0), Val::Num(n) if n.is_finite())))
}

/// Number.isNaN - no coercion
pub fn is_nan_strict(args: &[Val]) -> EvalResult {
    Ok(Val::Bool(matches!(arg(args, 0), Val::Num(n) if n.is_nan())))
}

/// Global isFinite - coerces its argument
pub fn is_finite(args: &[Val]) -> EvalResult {
    Ok(Val::Bool(to_number(&arg(args, 0)).is_finite()))
}

/// Global isNaN - coerces its argument
pub fn is_nan(args: &[Val]) -> EvalResult {
    Ok(Val::Bool(to_number(&arg(args, 0)).is_nan()))
}

/// parseInt(text, radix?)
pub fn parse_int(args: &[Val]) -> EvalResult {
    let text = to_js_string(&arg(args, 0));
    let mut rest = text.trim_start();
    let negative = rest.starts_with('-');
    if negative || rest.starts_with('+') {
        rest = &rest[1..];
    }

    let mut radix = match arg(args, 1) {
        Val::Undefined => 10,
        other => to_number(&other) as u32,
    };
    if (radix == 16 || matches!(arg(args, 1), Val::Undefined))
        && (rest.starts_with("0x") || rest.starts_with("0X"))
    {
        rest = &rest[2..];
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Val::Num(f64::NAN));
    }

    let digits: String = rest.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Val::Num(f64::NAN));
    }
    let value = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * radix as f64 + d as f64);
    Ok(Val::Num(if negative { -value } else { value }))
}

/// parseFloat(text): longest numeric prefix
pub fn parse_float(args: &[Val]) -> EvalResult {
    let text = to_js_string(&arg(args, 0));
    let trimmed = text.trim_start();
    for prefix in ["Infinity", "+Infinity"] {
        if trimmed.starts_with(prefix) {
            return Ok(Val::Num(f64::INFINITY));
        }
    }
    if trimmed.starts_with("-Infinity") {
        return Ok(Val::Num(f64::NEG_INFINITY));
    }

    let len = numeric_prefix_len(trimmed);
    Ok(Val::Num(
        trimmed[..len].parse::<f64>().unwrap_or(f64::NAN),
    ))
}

/// Byte length of the `[+-]digits[.digits][e[+-]digits]` prefix
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_end = digits_from(i);
    let mut end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || int_end > i {
            end = frac_end;
        }
    }
    if end == i || (end == i + 1 && bytes.get(i) == Some(&b'.')) {
        return 0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut j = end + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            end = exp_end;
        }
    }
    end
}

/// Invoke a `Number.prototype` method
pub fn call(n: f64, name: &str, args: &[Val]) -> EvalResult {
    match name {
        "toFixed" => {
            let digits = to_number(&arg(args, 0));
            let digits = if digits.is_nan() { 0.0 } else { digits };
            if !(0.0..=100.0).contains(&digits) {
                return Err(ErrorInfo::range_error("toFixed() digits argument must be between 0 and 100").into());
            }
            if !n.is_finite() {
                return Ok(Val::Str(number_to_string(n)));
            }
            Ok(Val::Str(format!("{:.*}", digits as usize, n)))
        }
        "toPrecision" => match arg(args, 0) {
            Val::Undefined => Ok(Val::Str(number_to_string(n))),
            p => {
                let p = to_number(&p);
                if !(1.0..=100.0).contains(&p) {
                    return Err(ErrorInfo::range_error("toPrecision() argument must be between 1 and 100").into());
                }
                if n == 0.0 || !n.is_finite() {
                    return Ok(Val::Str(format!("{:.*}", (p as usize).saturating_sub(1), n)));
                }
                let magnitude = n.abs().log10().floor() as i32;
                let decimals = (p as i32 - 1 - magnitude).max(0) as usize;
                Ok(Val::Str(format!("{:.*}", decimals, n)))
            }
        },
        _ => {
            let radix = match arg(args, 0) {
                Val::Undefined => 10,
                other => to_number(&other) as u32,
            };
            if !(2..=36).contains(&radix) {
                return Err(ErrorInfo::range_error("toString() radix must be between 2 and 36").into());
            }
            if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
                return Ok(Val::Str(number_to_string(n)));
            }
            Ok(Val::Str(integer_in_radix(n, radix)))
        }
    }
}

fn integer_in_radix(n: f64, radix: u32) -> String {
    let mut value = n.abs() as u64;
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let d = (value % radix as u64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('?'));
        value /= radix as u64;
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
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
    fn test_parse_int_prefixes() {
        assert_eq!(num(parse_int(&[Val::str("42px")])), 42.0);
        assert_eq!(num(parse_int(&[Val::str("-0x1f")])), -31.0);
        assert_eq!(num(parse_int(&[Val::str("101"), Val::Num(2.0)])), 5.0);
        assert!(num(parse_int(&[Val::str("abc")])).is_nan());
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(num(parse_float(&[Val::str("3.14abc")])), 3.14);
        assert_eq!(num(parse_float(&[Val::str("1e3")])), 1000.0);
        assert!(num(parse_float(&[Val::str("x1")])).is_nan());
    }

    #[test]
    fn test_to_fixed_and_radix() {
        let fixed = call(3.14159, "toFixed", &[Val::Num(2.0)]).unwrap();
        assert_eq!(fixed.as_str(), Some("3.14"));
        let hex = call(255.0, "toString", &[Val::Num(16.0)]).unwrap();
        assert_eq!(hex.as_str(), Some("ff"));
    }
}
