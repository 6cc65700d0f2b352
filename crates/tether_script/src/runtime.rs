//! Script runtime management
//!
//! One QuickJS runtime and context wired to an [`InteropRuntime`]. Scripts
//! reach the host through the globals installed by [`crate::ffi`].

use crate::callbacks::CallbackTable;
use crate::config::ScriptConfig;
use crate::error::ScriptError;
use crate::ffi::{self, Callbacks};
use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Function, Runtime, Value};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use tether_interop::{InteropRuntime, InteropValue};
use tracing::{debug, error, info};

/// Script execution context
pub struct ScriptRuntime {
    context: Context,
    runtime: Runtime,
    interop: Rc<RefCell<InteropRuntime>>,
    callbacks: Callbacks,
    config: ScriptConfig,
}

/// `message` plus stack of the pending exception, cut to `limit` bytes.
fn format_exception(ctx: &Ctx<'_>, limit: usize) -> String {
    let caught = ctx.catch();
    let mut text = match caught.as_object() {
        Some(object) => {
            let message: Option<String> = object.get("message").ok();
            let stack: Option<String> = object.get("stack").ok();
            match (message, stack) {
                (Some(message), Some(stack)) if !stack.is_empty() => format!("{message}\n{stack}"),
                (Some(message), _) => message,
                _ => ffi::describe(ctx, &caught).unwrap_or_default(),
            }
        }
        None => ffi::describe(ctx, &caught).unwrap_or_default(),
    };

    if text.len() > limit {
        let mut cut = limit;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

impl ScriptRuntime {
    pub fn new(interop: Rc<RefCell<InteropRuntime>>, config: ScriptConfig) -> Result<Self, ScriptError> {
        let runtime = Runtime::new()?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        let context = Context::full(&runtime)?;
        let callbacks: Callbacks = Rc::new(RefCell::new(CallbackTable::new(config.max_callbacks)));

        context.with(|ctx| ffi::install(&ctx, interop.clone(), callbacks.clone()))?;
        info!("Script runtime ready");

        Ok(Self {
            context,
            runtime,
            interop,
            callbacks,
            config,
        })
    }

    pub fn interop(&self) -> &Rc<RefCell<InteropRuntime>> {
        &self.interop
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Run `f` inside the context, turning a thrown exception into
    /// [`ScriptError::Exception`].
    fn with_ctx<R>(
        &self,
        f: impl for<'js> FnOnce(&Ctx<'js>) -> rquickjs::Result<R>,
    ) -> Result<R, ScriptError> {
        let limit = self.config.exception_message_limit;
        self.context.with(|ctx| match f(&ctx) {
            Ok(value) => Ok(value),
            Err(rquickjs::Error::Exception) => {
                let message = format_exception(&ctx, limit);
                error!("Script exception: {}", message);
                Err(ScriptError::Exception(message))
            }
            Err(err) => Err(err.into()),
        })
    }

    /// Evaluate `source` and return its completion value as text.
    pub fn eval(&self, source: &str) -> Result<String, ScriptError> {
        self.with_ctx(|ctx| {
            let value: Value = ctx.eval(source)?;
            ffi::describe(ctx, &value)
        })
    }

    pub fn execute(&self, source: &str) -> Result<(), ScriptError> {
        self.with_ctx(|ctx| ctx.eval::<(), _>(source))
    }

    pub fn execute_file(&self, path: &Path) -> Result<(), ScriptError> {
        let source = std::fs::read_to_string(path)?;
        debug!("Executing {}", path.display());
        self.execute(&source)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.context.with(|ctx| {
            ctx.globals()
                .get::<_, Value>(name)
                .map(|value| value.is_function())
                .unwrap_or(false)
        })
    }

    /// Call a global function with interop arguments.
    pub fn call_function(
        &self,
        name: &str,
        args: &[InteropValue<'_>],
    ) -> Result<InteropValue<'static>, ScriptError> {
        let mut missing = false;
        let result = self.with_ctx(|ctx| {
            let value: Value = ctx.globals().get(name)?;
            let Some(func) = value.as_function() else {
                missing = true;
                return Ok(InteropValue::Null);
            };
            call_with(ctx, func, args)
        })?;
        if missing {
            return Err(ScriptError::NotAFunction(name.to_string()));
        }
        Ok(result)
    }

    /// Host-to-script call of a callback registered with `__registerCallback`.
    pub fn invoke_callback(
        &self,
        id: i32,
        args: &[InteropValue<'_>],
    ) -> Result<InteropValue<'static>, ScriptError> {
        let saved = self
            .callbacks
            .borrow()
            .get(id)
            .cloned()
            .ok_or(ScriptError::UnknownCallback(id))?;
        self.with_ctx(|ctx| {
            let func = saved.restore(ctx)?;
            call_with(ctx, &func, args)
        })
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Drain pending jobs (promise reactions). Returns how many ran.
    pub fn tick(&self) -> Result<usize, ScriptError> {
        let mut ran = 0;
        loop {
            if self.config.max_jobs_per_tick.is_some_and(|max| ran >= max) {
                break;
            }
            match self.runtime.execute_pending_job() {
                Ok(true) => ran += 1,
                Ok(false) => break,
                Err(_) => {
                    let limit = self.config.exception_message_limit;
                    let message = self.context.with(|ctx| format_exception(&ctx, limit));
                    error!("Pending job failed: {}", message);
                    return Err(ScriptError::Job(message));
                }
            }
        }
        Ok(ran)
    }

    pub fn run_gc(&self) {
        self.runtime.run_gc();
    }
}

fn call_with<'js>(
    ctx: &Ctx<'js>,
    func: &Function<'js>,
    args: &[InteropValue<'_>],
) -> rquickjs::Result<InteropValue<'static>> {
    let values = args
        .iter()
        .map(|arg| ffi::from_interop(ctx, arg))
        .collect::<rquickjs::Result<Vec<_>>>()?;
    let out: Value = func.call((Rest(values),))?;
    ffi::to_interop(ctx, &out)
}

impl Drop for ScriptRuntime {
    fn drop(&mut self) {
        // saved functions must go before the engine does
        self.callbacks.borrow_mut().clear();
    }
}
