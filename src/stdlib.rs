use std::{
    f64::consts,
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use indexmap::IndexMap;

use crate::{
    diagnostics::{Diagnostic, ManifastError, Result},
    environment::EnvironmentRef,
    runtime::ExecutionContext,
    value::{VARIADIC, Value, ValueKind},
};

/// Names accepted by `impor`.
pub const MODULE_NAMES: [&str; 3] = ["math", "string", "os"];

/// Defines the global natives every script can call without importing.
pub fn install(env: &EnvironmentRef) {
    let mut scope = env.borrow_mut();
    scope.define("print", native("print", VARIADIC, io_print));
    scope.define("println", native("println", VARIADIC, io_println));
    scope.define("assert", native("assert", VARIADIC, core_assert));
    scope.define("tipe", native("tipe", 1, core_tipe));
    scope.define("len", native("len", 1, core_len));
    scope.define("teks", native("teks", 1, core_teks));
    scope.define("angka", native("angka", 1, core_angka));
    scope.define("tunggu", native("tunggu", 1, core_tunggu));
}

/// Builds a fresh module value for `name`, or `None` when no such module exists.
pub fn resolve_module(name: &str) -> Option<Value> {
    let exports = match name {
        "math" => math_module(),
        "string" => string_module(),
        "os" => os_module(),
        _ => return None,
    };
    Some(Value::module(name, exports))
}

fn math_module() -> IndexMap<String, Value> {
    let mut math = IndexMap::new();
    math.insert("pi".into(), Value::number(consts::PI));
    math.insert("e".into(), Value::number(consts::E));
    math.insert("huge".into(), Value::number(f64::INFINITY));
    math.insert("sin".into(), native("sin", 1, math_sin));
    math.insert("cos".into(), native("cos", 1, math_cos));
    math.insert("tan".into(), native("tan", 1, math_tan));
    math.insert("sqrt".into(), native("sqrt", 1, math_sqrt));
    math.insert("pow".into(), native("pow", 2, math_pow));
    math.insert("abs".into(), native("abs", 1, math_abs));
    math.insert("floor".into(), native("floor", 1, math_floor));
    math.insert("ceil".into(), native("ceil", 1, math_ceil));
    math.insert("round".into(), native("round", 1, math_round));
    math.insert("log".into(), native("log", VARIADIC, math_log));
    math.insert("min".into(), native("min", VARIADIC, math_min));
    math.insert("max".into(), native("max", VARIADIC, math_max));
    math
}

fn string_module() -> IndexMap<String, Value> {
    let mut string = IndexMap::new();
    string.insert("substring".into(), native("substring", 3, string_substring));
    string.insert("split".into(), native("split", 2, string_split));
    string.insert("upper".into(), native("upper", 1, string_upper));
    string.insert("lower".into(), native("lower", 1, string_lower));
    string.insert("trim".into(), native("trim", 1, string_trim));
    string.insert("contains".into(), native("contains", 2, string_contains));
    string.insert("length".into(), native("length", 1, string_length));
    string
}

fn os_module() -> IndexMap<String, Value> {
    let mut os = IndexMap::new();
    os.insert("waktuNano".into(), native("waktuNano", 0, os_waktu_nano));
    os.insert("waktu".into(), native("waktu", 0, os_waktu));
    os
}

fn native(
    name: &'static str,
    arity: usize,
    callback: fn(&mut ExecutionContext, &[Value]) -> Result<Value>,
) -> Value {
    Value::native(name, arity, callback)
}

fn ensure_range(args: &[Value], min: usize, max: usize, name: &str) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == VARIADIC {
            format!("at least {min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(ManifastError::runtime(format!(
            "`{name}` expected {expected} arguments but received {}",
            args.len()
        )));
    }
    Ok(())
}

fn expect_string<'a>(value: &'a Value, name: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        ManifastError::runtime(format!(
            "`{name}` expected string argument, found {}",
            value.type_name()
        ))
    })
}

fn expect_number(value: &Value, name: &str) -> Result<f64> {
    value.as_number().ok_or_else(|| {
        ManifastError::runtime(format!(
            "`{name}` expected numeric argument, found {}",
            value.type_name()
        ))
    })
}

fn expect_integer(value: &Value, name: &str) -> Result<i64> {
    let number = expect_number(value, name)?;
    if !number.is_finite() || number.fract() != 0.0 {
        return Err(ManifastError::runtime(format!(
            "`{name}` expected an integer, found {value}"
        )));
    }
    Ok(number as i64)
}

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join("\t")
}

fn io_print(context: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    context.write(&joined(args));
    Ok(Value::nil())
}

fn io_println(context: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    let mut line = joined(args);
    line.push('\n');
    context.write(&line);
    Ok(Value::nil())
}

fn core_assert(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    ensure_range(args, 1, 2, "assert")?;
    if args[0].is_truthy() {
        return Ok(Value::nil());
    }
    let message = match args.get(1) {
        Some(message) => message.to_string(),
        None => "assertion failed".to_string(),
    };
    Err(ManifastError::Assertion {
        message,
        span: None,
    })
}

fn core_tipe(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::string(args[0].type_name()))
}

fn core_len(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    match args[0].kind() {
        ValueKind::Array(values) => Ok(Value::number(values.borrow().len() as f64)),
        ValueKind::String(text) => Ok(Value::number(text.chars().count() as f64)),
        _ => Err(ManifastError::runtime(format!(
            "`len` expects an array or string, found {}",
            args[0].type_name()
        ))),
    }
}

fn core_teks(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::string(args[0].to_string()))
}

fn core_angka(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    match args[0].kind() {
        ValueKind::Number(_) => Ok(args[0].clone()),
        ValueKind::String(text) => Ok(parse_decimal(text.trim())
            .map(Value::number)
            .unwrap_or_else(Value::nil)),
        _ => Ok(Value::nil()),
    }
}

/// Decimal notation only; `inf`, `nan` and friends are not numbers here.
fn parse_decimal(text: &str) -> Option<f64> {
    let decimal = text.chars().any(|ch| ch.is_ascii_digit())
        && text
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '+' | '-' | '.' | 'e' | 'E'));
    if decimal { text.parse().ok() } else { None }
}

fn core_tunggu(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    let seconds = expect_number(&args[0], "tunggu")?;
    let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
        ManifastError::runtime(format!(
            "`tunggu` expects a non-negative duration in seconds, found {}",
            args[0]
        ))
    })?;
    thread::sleep(duration);
    Ok(Value::nil())
}

fn math_sin(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::number(expect_number(&args[0], "math.sin")?.sin()))
}

fn math_cos(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::number(expect_number(&args[0], "math.cos")?.cos()))
}

fn math_tan(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::number(expect_number(&args[0], "math.tan")?.tan()))
}

fn math_sqrt(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::number(expect_number(&args[0], "math.sqrt")?.sqrt()))
}

fn math_pow(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    let base = expect_number(&args[0], "math.pow")?;
    let exponent = expect_number(&args[1], "math.pow")?;
    Ok(Value::number(base.powf(exponent)))
}

fn math_abs(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::number(expect_number(&args[0], "math.abs")?.abs()))
}

fn math_floor(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::number(expect_number(&args[0], "math.floor")?.floor()))
}

fn math_ceil(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::number(expect_number(&args[0], "math.ceil")?.ceil()))
}

fn math_round(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::number(expect_number(&args[0], "math.round")?.round()))
}

/// Natural logarithm, or logarithm in the given base.
fn math_log(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    ensure_range(args, 1, 2, "math.log")?;
    let number = expect_number(&args[0], "math.log")?;
    match args.get(1) {
        Some(base) => Ok(Value::number(number.log(expect_number(base, "math.log")?))),
        None => Ok(Value::number(number.ln())),
    }
}

fn math_min(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    fold_numbers(args, "math.min", f64::min)
}

fn math_max(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    fold_numbers(args, "math.max", f64::max)
}

fn fold_numbers(args: &[Value], name: &str, pick: fn(f64, f64) -> f64) -> Result<Value> {
    ensure_range(args, 1, VARIADIC, name)?;
    let mut result = expect_number(&args[0], name)?;
    for value in &args[1..] {
        result = pick(result, expect_number(value, name)?);
    }
    Ok(Value::number(result))
}

/// `substring(s, start, end)`: 1-based, both ends inclusive.
fn string_substring(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.substring")?;
    let start = expect_integer(&args[1], "string.substring")?;
    let end = expect_integer(&args[2], "string.substring")?;
    let len = text.chars().count() as i64;
    if start < 1 || end > len || start > end {
        return Err(ManifastError::from(
            Diagnostic::runtime(format!(
                "substring range {start}..{end} is outside string of length {len}"
            ))
            .with_note("positions start at 1 and both ends are inclusive"),
        ));
    }
    let from = (start - 1) as usize;
    let count = (end - start + 1) as usize;
    Ok(Value::string(
        text.chars().skip(from).take(count).collect::<String>(),
    ))
}

fn string_split(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.split")?;
    let separator = expect_string(&args[1], "string.split")?;
    if separator.is_empty() {
        return Ok(Value::array(vec![Value::string(text)]));
    }
    let parts = text.split(separator).map(Value::string).collect();
    Ok(Value::array(parts))
}

fn string_upper(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::string(
        expect_string(&args[0], "string.upper")?.to_uppercase(),
    ))
}

fn string_lower(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::string(
        expect_string(&args[0], "string.lower")?.to_lowercase(),
    ))
}

fn string_trim(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    Ok(Value::string(expect_string(&args[0], "string.trim")?.trim()))
}

fn string_contains(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.contains")?;
    let needle = expect_string(&args[1], "string.contains")?;
    Ok(Value::bool(text.contains(needle)))
}

fn string_length(_: &mut ExecutionContext, args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "string.length")?;
    Ok(Value::number(text.chars().count() as f64))
}

fn os_waktu_nano(context: &mut ExecutionContext, _: &[Value]) -> Result<Value> {
    Ok(Value::number(context.monotonic_nanos() as f64))
}

fn os_waktu(_: &mut ExecutionContext, _: &[Value]) -> Result<Value> {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => Ok(Value::number(duration.as_secs_f64())),
        Err(_) => Err(ManifastError::runtime("system clock is before the Unix epoch")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(module: &str, member: &str, args: &[Value]) -> Result<Value> {
        let module = resolve_module(module).expect("module exists");
        let function = match module.kind() {
            ValueKind::Module(module) => module.exports.get(member).cloned().expect("member"),
            _ => unreachable!(),
        };
        let mut context = ExecutionContext::default();
        match function.kind() {
            ValueKind::NativeFunction(native) => native.call(&mut context, args),
            _ => panic!("{member} is not a native"),
        }
    }

    fn text(value: Value) -> String {
        value.as_str().map(str::to_string).expect("string value")
    }

    #[test]
    fn unknown_module_is_not_resolved() {
        assert!(resolve_module("fs").is_none());
        for name in MODULE_NAMES {
            assert!(resolve_module(name).is_some(), "{name}");
        }
    }

    #[test]
    fn substring_is_one_based_and_inclusive() {
        let result = call(
            "string",
            "substring",
            &[
                Value::string("ManifastLuarBiasa"),
                Value::number(1.0),
                Value::number(8.0),
            ],
        )
        .unwrap();
        assert_eq!(text(result), "Manifast");
    }

    #[test]
    fn substring_rejects_out_of_range_positions() {
        for (start, end) in [(0.0, 3.0), (2.0, 9.0), (4.0, 2.0)] {
            let err = call(
                "string",
                "substring",
                &[Value::string("abcde"), Value::number(start), Value::number(end)],
            );
            assert!(err.is_err(), "{start}..{end}");
        }
    }

    #[test]
    fn split_preserves_empty_segments() {
        let result = call(
            "string",
            "split",
            &[Value::string("a,,b,"), Value::string(",")],
        )
        .unwrap();
        assert_eq!(result.to_string(), "[a, , b, ]");
    }

    #[test]
    fn math_functions_follow_float_semantics() {
        let sqrt = call("math", "sqrt", &[Value::number(16.0)]).unwrap();
        assert_eq!(sqrt.as_number(), Some(4.0));
        let pow = call("math", "pow", &[Value::number(2.0), Value::number(3.0)]).unwrap();
        assert_eq!(pow.as_number(), Some(8.0));
        let max = call(
            "math",
            "max",
            &[Value::number(3.0), Value::number(9.0), Value::number(-1.0)],
        )
        .unwrap();
        assert_eq!(max.as_number(), Some(9.0));
        assert!(call("math", "min", &[]).is_err());
        let negative = call("math", "sqrt", &[Value::number(-1.0)]).unwrap();
        assert!(negative.as_number().is_some_and(f64::is_nan));
    }

    #[test]
    fn arity_is_checked_for_fixed_natives() {
        let err = call("math", "pow", &[Value::number(2.0)]).unwrap_err();
        assert!(err.to_string().contains("expected 2 arguments"), "{err}");
    }

    #[test]
    fn waktu_nano_is_monotonic() {
        let mut context = ExecutionContext::default();
        let first = os_waktu_nano(&mut context, &[]).unwrap().as_number().unwrap();
        let second = os_waktu_nano(&mut context, &[]).unwrap().as_number().unwrap();
        assert!(second >= first);
    }

    #[test]
    fn print_joins_arguments_with_tabs() {
        let mut context = ExecutionContext::default();
        io_print(&mut context, &[Value::number(1.0), Value::bool(true)]).unwrap();
        io_println(&mut context, &[Value::string("x")]).unwrap();
        assert_eq!(context.output(), "1\tbenarx\n");
    }

    #[test]
    fn assert_reports_message() {
        let mut context = ExecutionContext::default();
        let err = core_assert(&mut context, &[Value::bool(false), Value::string("boom")]);
        match err {
            Err(ManifastError::Assertion { message, .. }) => assert_eq!(message, "boom"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(core_assert(&mut context, &[Value::number(0.0)]).is_ok());
    }

    #[test]
    fn angka_parses_or_returns_nil() {
        let mut context = ExecutionContext::default();
        let parsed = core_angka(&mut context, &[Value::string(" 42.5 ")]).unwrap();
        assert_eq!(parsed.as_number(), Some(42.5));
        let failed = core_angka(&mut context, &[Value::string("abc")]).unwrap();
        assert!(failed.is_nil());
        let exponent = core_angka(&mut context, &[Value::string("-1.5e2")]).unwrap();
        assert_eq!(exponent.as_number(), Some(-150.0));
        for spelling in ["nan", "inf", "-infinity", "NaN", "e", ""] {
            let value = core_angka(&mut context, &[Value::string(spelling)]).unwrap();
            assert!(value.is_nil(), "{spelling:?} parsed as {value}");
        }
    }

    #[test]
    fn negative_sleep_is_rejected() {
        let mut context = ExecutionContext::default();
        assert!(core_tunggu(&mut context, &[Value::number(-1.0)]).is_err());
        assert!(core_tunggu(&mut context, &[Value::number(0.0)]).is_ok());
    }
}
