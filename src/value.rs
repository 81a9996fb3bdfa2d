// ABOUTME: Runtime value sum type and the callable/class/instance data it carries

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Runtime sum type (spec §3.3). Numbers are IEEE-754 binary64, strings are
/// immutable and compared by content, callables/instances/classes have
/// reference identity and are shared by `Rc`.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<String>),
    Callable(Callable),
    Instance(Rc<Instance>),
}

#[derive(Clone)]
pub enum Callable {
    Function(Rc<Function>),
    Native(Rc<NativeFunction>),
    Class(Rc<Class>),
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(func) => write!(f, "<fn {}>", func.name.as_deref().unwrap_or("anonymous")),
            Callable::Native(native) => write!(f, "<native fn {}>", native.name),
            Callable::Class(class) => write!(f, "<class {}>", class.name),
        }
    }
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(func) => func.params.len(),
            Callable::Native(native) => native.arity,
            Callable::Class(class) => class
                .find_method("init")
                .map(|init| init.params.len())
                .unwrap_or(0),
        }
    }
}

/// A user-defined function or lambda: parameter list, body, the environment
/// it closed over at definition time, and whether it is a class initializer
/// (spec §3.5).
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<Vec<crate::ast::Stmt>>,
    pub closure: Rc<Environment>,
    pub is_initializer: bool,
}

impl Function {
    pub fn from_decl(decl: &FunctionDecl, closure: Rc<Environment>, is_initializer: bool) -> Self {
        Function {
            name: decl.name.as_ref().map(|t| t.lexeme.clone()),
            params: decl.params.iter().map(|t| t.lexeme.clone()).collect(),
            body: Rc::new(decl.body.clone()),
            closure,
            is_initializer,
        }
    }

    /// Returns a copy of this function whose closure defines `this` as the
    /// given instance (spec §4.5, "Method binding").
    pub fn bind(&self, instance: Rc<Instance>) -> Function {
        let env = Environment::with_parent(self.closure.clone());
        env.define("this", Value::Instance(instance));
        Function {
            name: self.name.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            closure: env,
            is_initializer: self.is_initializer,
        }
    }
}

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value]) -> Value,
}

/// Method table and (unused, per spec §3.5/§9) superclass slot.
pub struct Class {
    pub name: String,
    pub methods: HashMap<String, Rc<Function>>,
    pub superclass: Option<Rc<Class>>,
}

impl Class {
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        self.methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|sup| sup.find_method(name))
        })
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub fields: std::cell::RefCell<HashMap<String, Value>>,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Callable(Callable::Function(func)) => {
                write!(f, "<fn {}>", func.name.as_deref().unwrap_or("anonymous"))
            }
            Value::Callable(Callable::Native(native)) => write!(f, "<native fn {}>", native.name),
            Value::Callable(Callable::Class(class)) => write!(f, "{}", class.name),
            Value::Instance(instance) => write!(f, "{} instance", instance.class.name),
        }
    }
}

impl Value {
    /// `Nil` and `Bool(false)` are false; everything else is true (spec §4.5).
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Across different types values are unequal; `Nil == Nil`; same-type
    /// numbers/strings/booleans compare by value; callables/instances compare
    /// by reference identity (spec §4.5).
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
            (Value::Callable(Callable::Function(x)), Value::Callable(Callable::Function(y))) => {
                Rc::ptr_eq(x, y)
            }
            (Value::Callable(Callable::Native(x)), Value::Callable(Callable::Native(y))) => {
                Rc::ptr_eq(x, y)
            }
            (Value::Callable(Callable::Class(x)), Value::Callable(Callable::Class(y))) => {
                Rc::ptr_eq(x, y)
            }
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Callable(_) => "callable",
            Value::Instance(_) => "instance",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_the_standard_rule() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(Rc::new(String::new())).is_truthy());
    }

    #[test]
    fn equality_is_reflexive_and_unequal_across_types() {
        assert!(Value::values_equal(&Value::Nil, &Value::Nil));
        assert!(Value::values_equal(
            &Value::Number(1.0),
            &Value::Number(1.0)
        ));
        assert!(!Value::values_equal(&Value::Number(0.0), &Value::Nil));
        assert!(!Value::values_equal(
            &Value::Number(1.0),
            &Value::String(Rc::new("1".to_string()))
        ));
    }

    #[test]
    fn whole_numbers_display_without_decimal() {
        assert_eq!(format!("{}", Value::Number(42.0)), "42");
        assert_eq!(format!("{}", Value::Number(2.5)), "2.5");
    }
}
