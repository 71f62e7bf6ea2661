//! Promise support
//!
//! Host calls complete synchronously, so a promise is represented by its
//! settled value: `new Promise(fn)` runs the executor immediately and yields
//! what it resolved with, or throws what it rejected with.

use std::sync::Arc;

use parking_lot::Mutex;

use super::arg;
use crate::executor::errors::ErrorInfo;
use crate::executor::values::{iterate, EvalResult, HostObject, Thrown, Val};
use crate::executor::Interpreter;

type Settlement = Arc<Mutex<Option<Result<Val, Val>>>>;

/// The `resolve`/`reject` callbacks handed to an executor
#[derive(Debug)]
struct Settler {
    slot: Settlement,
    reject: bool,
}

impl HostObject for Settler {
    fn name(&self) -> &str {
        if self.reject {
            "reject"
        } else {
            "resolve"
        }
    }

    fn call(&self, _interp: &mut Interpreter, _this: &Val, args: Vec<Val>) -> EvalResult {
        let mut slot = self.slot.lock();
        // First settlement wins
        if slot.is_none() {
            let value = arg(&args, 0);
            *slot = Some(if self.reject { Err(value) } else { Ok(value) });
        }
        Ok(Val::Undefined)
    }
}

/// new Promise((resolve, reject) => ...)
pub fn construct(interp: &mut Interpreter, args: &[Val]) -> EvalResult {
    let executor = arg(args, 0);
    if !executor.is_callable() {
        return Err(ErrorInfo::type_error("Promise resolver is not a function").into());
    }

    let slot: Settlement = Arc::new(Mutex::new(None));
    let resolve = Val::Host(Arc::new(Settler {
        slot: slot.clone(),
        reject: false,
    }));
    let reject = Val::Host(Arc::new(Settler {
        slot: slot.clone(),
        reject: true,
    }));

    if let Err(thrown) = interp.call_value(&executor, Val::Undefined, vec![resolve, reject]) {
        let mut settled = slot.lock();
        if settled.is_none() {
            *settled = Some(Err(thrown.0));
        }
    }

    let settled = slot.lock().take();
    match settled {
        Some(Ok(value)) => Ok(value),
        Some(Err(reason)) => Err(Thrown(reason)),
        None => Ok(Val::Undefined),
    }
}

/// Promise.all(values): every value is already settled
pub fn all(args: &[Val]) -> EvalResult {
    Ok(Val::list(iterate(&arg(args, 0))?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_copies_values() {
        let input = Val::list(vec![Val::Num(1.0), Val::Num(2.0)]);
        let out = all(&[input]).unwrap();
        let Val::List(items) = out else { panic!("expected list") };
        assert_eq!(items.lock().len(), 2);
    }
}
