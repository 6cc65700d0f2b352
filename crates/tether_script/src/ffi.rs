//! FFI layer between the script context and the interop runtime
//!
//! Installs the `__invoke` family of globals and converts values in both
//! directions. Up to eight call arguments are converted into a stack buffer.
//!
//! `__zaInvoke0` .. `__zaInvoke8` call bindings by the id `__resolveBinding`
//! returned, with positional arguments and no name strings.

use crate::callbacks::CallbackTable;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, Object, Persistent, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tether_interop::glam::{Vec3, Vec4};
use tether_interop::{CallKind, Handle, InteropRuntime, InteropValue};
use tracing::{debug, error, info, warn};

pub(crate) type Callbacks = Rc<RefCell<CallbackTable<Persistent<Function<'static>>>>>;

const STACK_ARGS: usize = 8;

fn number(value: &Value<'_>) -> Option<f64> {
    value.as_int().map(f64::from).or_else(|| value.as_float())
}

fn json_function<'js>(ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Function<'js>> {
    ctx.globals().get::<_, Object>("JSON")?.get(name)
}

fn stringify<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> rquickjs::Result<String> {
    let out: Value = json_function(ctx, "stringify")?.call((value.clone(),))?;
    match out.as_string() {
        Some(text) => text.to_string(),
        None => Ok("null".to_string()),
    }
}

/// Human-readable form of any value, for logs and eval results.
pub fn describe<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> rquickjs::Result<String> {
    if let Some(text) = value.as_string() {
        return text.to_string();
    }
    if value.is_object() && !value.is_function() {
        let text = stringify(ctx, value)?;
        // errors have no enumerable fields
        if text != "{}" {
            return Ok(text);
        }
    }
    let to_string: Function = ctx.globals().get("String")?;
    to_string.call((value.clone(),))
}

fn handle_of(value: &Value<'_>) -> Option<Handle> {
    if let Some(raw) = number(value) {
        return Handle::new(raw as i32);
    }
    let marker: Value = value.as_object()?.get("__handle").ok()?;
    Handle::new(number(&marker)? as i32)
}

fn read_lanes<const N: usize>(object: &Object<'_>, keys: [&str; N]) -> Option<[f32; N]> {
    let mut lanes = [0.0f32; N];
    for (lane, key) in lanes.iter_mut().zip(keys) {
        let value: Value = object.get(key).ok()?;
        *lane = number(&value)? as f32;
    }
    Some(lanes)
}

/// Script value to an owned slot.
pub fn to_interop<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> rquickjs::Result<InteropValue<'static>> {
    if value.is_null() || value.is_undefined() || value.is_function() {
        return Ok(InteropValue::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(InteropValue::Bool(b));
    }
    if let Some(i) = value.as_int() {
        return Ok(InteropValue::Int32(i));
    }
    if let Some(f) = value.as_float() {
        let integral = f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64;
        return Ok(if integral {
            InteropValue::Int32(f as i32)
        } else {
            InteropValue::Double(f)
        });
    }
    if let Some(text) = value.as_string() {
        return Ok(InteropValue::owned_str(text.to_string()?));
    }
    if value.is_array() {
        return Ok(InteropValue::JsonObject(stringify(ctx, value)?.into()));
    }

    let Some(object) = value.as_object() else {
        return Ok(InteropValue::Null);
    };

    if object.contains_key("__handle")? {
        return Ok(match handle_of(value) {
            Some(handle) => InteropValue::handle(handle),
            None => InteropValue::Null,
        });
    }
    if let Some([x, y, z]) = read_lanes(object, ["x", "y", "z"]) {
        return Ok(match read_lanes(object, ["w"]) {
            Some([w]) => InteropValue::Vector4(Vec4::new(x, y, z, w)),
            None => InteropValue::Vector3(Vec3::new(x, y, z)),
        });
    }
    if let Some([r, g, b]) = read_lanes(object, ["r", "g", "b"]) {
        let a = read_lanes(object, ["a"]).map_or(1.0, |[a]| a);
        return Ok(InteropValue::Vector4(Vec4::new(r, g, b, a)));
    }
    Ok(InteropValue::JsonObject(stringify(ctx, value)?.into()))
}

fn vector_object<'js>(ctx: &Ctx<'js>, lanes: &[(&str, f32)]) -> rquickjs::Result<Value<'js>> {
    let object = Object::new(ctx.clone())?;
    for (key, lane) in lanes {
        object.set(*key, *lane as f64)?;
    }
    Ok(object.into_value())
}

/// Slot to a script value.
pub fn from_interop<'js>(ctx: &Ctx<'js>, value: &InteropValue<'_>) -> rquickjs::Result<Value<'js>> {
    Ok(match value {
        InteropValue::Null => Value::new_null(ctx.clone()),
        InteropValue::Bool(b) => Value::new_bool(ctx.clone(), *b),
        InteropValue::Int32(i) => Value::new_int(ctx.clone(), *i),
        InteropValue::Int64(i) => match i32::try_from(*i) {
            Ok(small) => Value::new_int(ctx.clone(), small),
            Err(_) => Value::new_float(ctx.clone(), *i as f64),
        },
        InteropValue::Float32(f) => Value::new_float(ctx.clone(), *f as f64),
        InteropValue::Double(f) => Value::new_float(ctx.clone(), *f),
        InteropValue::String(text) => rquickjs::String::from_str(ctx.clone(), text)?.into_value(),
        InteropValue::Vector3(v) => vector_object(ctx, &[("x", v.x), ("y", v.y), ("z", v.z)])?,
        InteropValue::Vector4(v) => {
            vector_object(ctx, &[("x", v.x), ("y", v.y), ("z", v.z), ("w", v.w)])?
        }
        InteropValue::ObjectHandle { handle, type_hint } => {
            let object = Object::new(ctx.clone())?;
            object.set("__handle", handle.get())?;
            if let Some(hint) = type_hint {
                object.set("__type", *hint)?;
            }
            object.into_value()
        }
        InteropValue::JsonObject(text) => {
            let text_value = rquickjs::String::from_str(ctx.clone(), text)?.into_value();
            match json_function(ctx, "parse")?.call::<_, Value>((text_value.clone(),)) {
                Ok(parsed) => parsed,
                Err(rquickjs::Error::Exception) => {
                    // malformed text stays a string
                    let _ = ctx.catch();
                    text_value
                }
                Err(err) => return Err(err),
            }
        }
    })
}

fn string_arg(args: &[Value<'_>], index: usize) -> rquickjs::Result<Option<String>> {
    match args.get(index).and_then(Value::as_string) {
        Some(text) => text.to_string().map(Some),
        None => Ok(None),
    }
}

/// Convert `len` script values into the stack buffer, or onto the heap when
/// there are more than fit.
fn convert_args<'b, 'js>(
    ctx: &Ctx<'js>,
    len: usize,
    values: impl Iterator<Item = rquickjs::Result<Value<'js>>>,
    stack: &'b mut [InteropValue<'static>; STACK_ARGS],
    heap: &'b mut Vec<InteropValue<'static>>,
) -> rquickjs::Result<&'b [InteropValue<'static>]> {
    if len <= STACK_ARGS {
        for (slot, item) in stack.iter_mut().zip(values) {
            *slot = to_interop(ctx, &item?)?;
        }
        return Ok(&stack[..len]);
    }
    heap.reserve(len);
    for item in values {
        heap.push(to_interop(ctx, &item?)?);
    }
    Ok(heap.as_slice())
}

fn invoke<'js>(
    ctx: &Ctx<'js>,
    interop: &RefCell<InteropRuntime>,
    args: &[Value<'js>],
) -> rquickjs::Result<Value<'js>> {
    let type_name = string_arg(args, 0)?.unwrap_or_default();
    let Some(member) = string_arg(args, 1)? else {
        return Err(Exception::throw_type(ctx, "__invoke: member name must be a string"));
    };
    let raw_kind = args.get(2).and_then(number).map_or(0, |k| k as i32);
    let kind = CallKind::try_from(raw_kind)
        .map_err(|err| Exception::throw_type(ctx, &format!("__invoke: {err}")))?;
    let is_static = args.get(3).and_then(Value::as_bool).unwrap_or(false);
    let target = if is_static {
        None
    } else {
        args.get(4).and_then(handle_of)
    };

    let mut stack: [InteropValue<'static>; STACK_ARGS] = Default::default();
    let mut heap = Vec::new();
    let slots: &[InteropValue<'static>] = match args.get(5).and_then(Value::as_array) {
        Some(array) => convert_args(ctx, array.len(), array.iter::<Value>(), &mut stack, &mut heap)?,
        None => &[],
    };

    let mut result = InteropValue::Null;
    let handled = {
        let mut rt = interop
            .try_borrow_mut()
            .map_err(|_| Exception::throw_internal(ctx, "re-entrant host dispatch"))?;
        rt.dispatch_call(&type_name, &member, kind, is_static, target, slots, &mut result)
    };

    if !handled {
        return Err(Exception::throw_type(
            ctx,
            &format!("No host binding for {type_name}.{member} ({kind})"),
        ));
    }
    from_interop(ctx, &result)
}

fn resolve_binding<'js>(
    ctx: &Ctx<'js>,
    interop: &RefCell<InteropRuntime>,
    args: &[Value<'js>],
) -> rquickjs::Result<i32> {
    let type_name = string_arg(args, 0)?.unwrap_or_default();
    let member = string_arg(args, 1)?.unwrap_or_default();
    let raw_kind = args.get(2).and_then(number).map_or(0, |k| k as i32);
    let kind = CallKind::try_from(raw_kind)
        .map_err(|err| Exception::throw_type(ctx, &format!("__resolveBinding: {err}")))?;
    let is_static = args.get(3).and_then(Value::as_bool).unwrap_or(false);

    let mut rt = interop
        .try_borrow_mut()
        .map_err(|_| Exception::throw_internal(ctx, "re-entrant host dispatch"))?;
    rt.resolve_binding_id(&type_name, &member, kind, is_static)
        .map_err(|err| Exception::throw_type(ctx, &format!("__resolveBinding: {err}")))
}

/// `__zaInvoke{arity}(bindingId, ...args)`. Without an arity every trailing
/// argument is passed.
fn za_invoke<'js>(
    ctx: &Ctx<'js>,
    interop: &RefCell<InteropRuntime>,
    args: &[Value<'js>],
    arity: Option<usize>,
) -> rquickjs::Result<Value<'js>> {
    let Some((first, rest)) = args.split_first() else {
        return Err(Exception::throw_type(ctx, "__zaInvoke requires bindingId"));
    };
    let Some(id) = number(first).map(|id| id as i32) else {
        return Err(Exception::throw_type(ctx, "bindingId must be an integer"));
    };
    let positional = match arity {
        Some(n) if rest.len() < n => {
            return Err(Exception::throw_type(
                ctx,
                &format!("__zaInvoke{n} requires bindingId + {n} args"),
            ));
        }
        Some(n) => &rest[..n],
        None => rest,
    };

    let mut stack: [InteropValue<'static>; STACK_ARGS] = Default::default();
    let mut heap = Vec::new();
    let slots = convert_args(
        ctx,
        positional.len(),
        positional.iter().cloned().map(Ok),
        &mut stack,
        &mut heap,
    )?;

    let mut result = InteropValue::Null;
    let handled = {
        let mut rt = interop
            .try_borrow_mut()
            .map_err(|_| Exception::throw_internal(ctx, "re-entrant host dispatch"))?;
        rt.dispatch_by_id(id, slots, &mut result)
    };

    if !handled {
        return Err(Exception::throw_type(ctx, &format!("No host binding with id {id}")));
    }
    from_interop(ctx, &result)
}

fn console_function<'js>(ctx: &Ctx<'js>, log: fn(&str)) -> rquickjs::Result<Function<'js>> {
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
            let mut line = String::new();
            for (i, arg) in args.0.iter().enumerate() {
                if i > 0 {
                    line.push(' ');
                }
                line.push_str(&describe(&ctx, arg)?);
            }
            log(&line);
            Ok(())
        },
    )
}

/// Install the host globals into `ctx`.
pub(crate) fn install<'js>(
    ctx: &Ctx<'js>,
    interop: Rc<RefCell<InteropRuntime>>,
    callbacks: Callbacks,
) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let resolver = interop.clone();
    globals.set(
        "__resolveBinding",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<i32> {
                resolve_binding(&ctx, &resolver, &args.0)
            },
        )?,
    )?;

    for arity in (0..=STACK_ARGS).map(Some).chain([None]) {
        let name = match arity {
            Some(n) => format!("__zaInvoke{n}"),
            None => "__zaInvoke".to_string(),
        };
        let dispatcher = interop.clone();
        globals.set(
            name.as_str(),
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
                    za_invoke(&ctx, &dispatcher, &args.0, arity)
                },
            )?,
        )?;
    }

    let dispatcher = interop.clone();
    globals.set(
        "__invoke",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
                invoke(&ctx, &dispatcher, &args.0)
            },
        )?,
    )?;

    globals.set(
        "__releaseHandle",
        Function::new(ctx.clone(), move |value: Value<'js>| -> bool {
            let Some(handle) = handle_of(&value) else {
                return false;
            };
            match interop.try_borrow_mut() {
                Ok(mut rt) => rt.release_handle(handle),
                Err(_) => {
                    warn!("Handle {} released during dispatch; ignored", handle);
                    false
                }
            }
        })?,
    )?;

    let table = callbacks.clone();
    globals.set(
        "__registerCallback",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, func: Function<'js>| -> rquickjs::Result<i32> {
                let saved = Persistent::save(&ctx, func);
                let id = table
                    .try_borrow_mut()
                    .map_err(|_| Exception::throw_internal(&ctx, "callback table busy"))?
                    .register(saved)
                    .map_err(|err| Exception::throw_range(&ctx, &err.to_string()))?;
                debug!("Registered script callback {}", id);
                Ok(id)
            },
        )?,
    )?;

    globals.set(
        "__unregisterCallback",
        Function::new(ctx.clone(), move |id: i32| -> bool {
            callbacks
                .try_borrow_mut()
                .map(|mut table| table.remove(id))
                .unwrap_or(false)
        })?,
    )?;

    let console = Object::new(ctx.clone())?;
    console.set("log", console_function(ctx, |line| info!(target: "script", "{}", line))?)?;
    console.set("info", console_function(ctx, |line| info!(target: "script", "{}", line))?)?;
    console.set("warn", console_function(ctx, |line| warn!(target: "script", "{}", line))?)?;
    console.set("error", console_function(ctx, |line| error!(target: "script", "{}", line))?)?;
    globals.set("console", console)?;

    Ok(())
}
