//! Declared callables discovered in a module.

use serde::{Deserialize, Serialize};

/// A module-level or class-level function.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// Parameter names in declaration order.
    pub args: Vec<String>,
}

impl Function {
    /// A function without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// A class and the methods declared on it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub methods: Vec<Function>,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: Function) -> Self {
        self.methods.push(method);
        self
    }

    /// Look up a method by name.
    pub fn method(&self, name: &str) -> Option<&Function> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Anything a module declares that tests can be generated for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Definition {
    Function(Function),
    Class(Class),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Self::Function(f) => &f.name,
            Self::Class(c) => &c.name,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(f) => Some(f),
            Self::Class(_) => None,
        }
    }

    pub fn as_class(&self) -> Option<&Class> {
        match self {
            Self::Class(c) => Some(c),
            Self::Function(_) => None,
        }
    }

    /// Whether a captured callable name refers to this definition.
    ///
    /// Functions match by exact name. Classes match their own name
    /// (construction) and `Class.method` names.
    pub fn matches_callable(&self, callable: &str) -> bool {
        match self {
            Self::Function(f) => f.name == callable,
            Self::Class(c) => {
                callable == c.name
                    || callable
                        .strip_prefix(c.name.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            }
        }
    }
}

impl From<Function> for Definition {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<Class> for Definition {
    fn from(c: Class) -> Self {
        Self::Class(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_builder() {
        let f = Function::new("add").with_args(["a", "b"]);
        assert_eq!(f.name, "add");
        assert_eq!(f.args, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn class_method_lookup() {
        let c = Class::new("Stack")
            .with_method(Function::new("push").with_args(["self", "item"]))
            .with_method(Function::new("pop").with_args(["self"]));
        assert_eq!(c.method("pop").unwrap().args, vec!["self".to_string()]);
        assert!(c.method("peek").is_none());
    }

    #[test]
    fn callable_matching() {
        let func: Definition = Function::new("run").into();
        assert!(func.matches_callable("run"));
        assert!(!func.matches_callable("runner"));

        let class: Definition = Class::new("Stack").into();
        assert!(class.matches_callable("Stack"));
        assert!(class.matches_callable("Stack.push"));
        assert!(!class.matches_callable("StackFrame.push"));
    }

    #[test]
    fn serde_is_tagged() {
        let def: Definition = Function::new("f").into();
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["kind"], "function");
        assert_eq!(json["name"], "f");
        let back: Definition = serde_json::from_value(json).unwrap();
        assert_eq!(back, def);
    }
}
