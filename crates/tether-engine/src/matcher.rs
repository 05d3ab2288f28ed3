//! Argument matcher
//!
//! Decides whether a script call's arguments are compatible with one
//! overload. Only the predicates are consulted; nothing is converted.

use tether_sdk::{
    CallFrame, MethodDescriptor, ParameterDescriptor, ScriptValue, TypeDescriptor, TypeKind,
};

use crate::bridge::Session;
use crate::resolve::Effective;

impl Session<'_> {
    /// Whether `frame`'s arguments fit `method`.
    ///
    /// Arity must be exact unless the method has defaulted or variadic
    /// parameters, in which case every required parameter must be supplied.
    pub fn matches(&self, method: &MethodDescriptor, frame: &dyn CallFrame) -> bool {
        let argc = frame.arg_count();
        let start = method.first_script_param();
        let declared = method.params.len().saturating_sub(start);
        if method.optional_count() == 0 && !method.has_variadic() {
            if argc != declared {
                tracing::trace!(method = %method.name, argc, declared, "arity mismatch");
                return false;
            }
        } else if argc < method.required_count() {
            tracing::trace!(method = %method.name, argc, required = method.required_count(), "too few arguments");
            return false;
        }

        let last = method.params.len().saturating_sub(1);
        for (index, param) in method.params.iter().enumerate().skip(start) {
            let js_index = index - start;
            if index == last && method.has_variadic() {
                let element = param.ty.element().unwrap_or(&param.ty);
                for rest in js_index..argc.max(js_index + 1) {
                    if !self.parameter_accepts(param, element, frame.arg(rest), true) {
                        tracing::trace!(method = %method.name, index, "variadic element rejected");
                        return false;
                    }
                }
                continue;
            }
            if !self.parameter_accepts(param, &param.ty, frame.arg(js_index), param.has_default) {
                tracing::trace!(method = %method.name, index, param = %param.name, "argument rejected");
                return false;
            }
        }
        true
    }

    fn parameter_accepts(
        &self,
        param: &ParameterDescriptor,
        ty: &TypeDescriptor,
        val: ScriptValue,
        optional: bool,
    ) -> bool {
        if optional && self.env.is_undefined(val) {
            return true;
        }
        if param.by_ref {
            return self.env.is_object(val);
        }
        self.value_compatible(ty, val)
    }

    fn value_compatible(&self, ty: &TypeDescriptor, val: ScriptValue) -> bool {
        let env = self.env;
        if let (TypeKind::Nullable, Some(wrapped)) = (ty.kind, ty.element()) {
            return env.is_null(val) || env.is_undefined(val) || self.value_compatible(wrapped, val);
        }
        match self.effective(ty) {
            Err(err) => {
                tracing::warn!(type_name = %ty.name, %err, "cannot resolve parameter type");
                false
            }
            Ok(Effective::Primitive(tag)) => self.codec().accepts(env, tag, val),
            Ok(Effective::Reference) => {
                if env.is_function(val) && !self.rt.is_delegate(ty.class) {
                    return false;
                }
                if ty.is_any_object() {
                    return true;
                }
                match env.native_object_class(val) {
                    Some(class) => self.rt.is_assignable_from(ty.class, class),
                    None => true,
                }
            }
            Ok(Effective::Value) => match env.native_object_class(val) {
                Some(class) => self.rt.is_assignable_from(ty.class, class),
                None => false,
            },
        }
    }
}
