//! Call frame over a fixed argument list

use tether_sdk::{CallFrame, ScriptEnv, ScriptValue};

/// A recorded script → native call
#[derive(Debug, Clone)]
pub struct FakeFrame {
    args: Vec<ScriptValue>,
    holder: ScriptValue,
    this: ScriptValue,
    undefined: ScriptValue,
    /// Value passed to `set_return`
    pub returned: Option<ScriptValue>,
    /// Message passed to `throw_error`
    pub error: Option<String>,
}

impl FakeFrame {
    /// Frame with `args`; holder and `this` start out `undefined`
    pub fn new(env: &dyn ScriptEnv, args: Vec<ScriptValue>) -> Self {
        let undefined = env.create_undefined();
        Self {
            args,
            holder: undefined,
            this: undefined,
            undefined,
            returned: None,
            error: None,
        }
    }

    /// Set the holder (the receiver of an instance or extension call)
    pub fn with_holder(mut self, holder: ScriptValue) -> Self {
        self.holder = holder;
        self
    }

    /// Set `this` of a constructor call
    pub fn with_this(mut self, this: ScriptValue) -> Self {
        self.this = this;
        self
    }
}

impl CallFrame for FakeFrame {
    fn arg_count(&self) -> usize {
        self.args.len()
    }

    fn arg(&self, index: usize) -> ScriptValue {
        self.args.get(index).copied().unwrap_or(self.undefined)
    }

    fn holder(&self) -> ScriptValue {
        self.holder
    }

    fn this(&self) -> ScriptValue {
        self.this
    }

    fn set_return(&mut self, val: ScriptValue) {
        self.returned = Some(val);
    }

    fn throw_error(&mut self, message: &str) {
        self.error = Some(message.to_owned());
    }
}
