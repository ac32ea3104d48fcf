//! Method registry and dispatch.
//!
//! The registry maps procedure names to typed handlers. It is assembled once
//! with [`MethodRegistryBuilder`] and is read-only afterwards, so a single
//! instance can be shared across every connection.
//!
//! The conventional introspection methods are answered by the registry itself:
//!
//! | Method | Result |
//! |---|---|
//! | `system.listMethods` | sorted names of every callable method |
//! | `system.methodSignature` | `[[return, param, ...], ...]` for a method |
//! | `system.methodHelp` | help text for a method |
//! | `system.multicall` | results of several calls in one request |

use crate::error::{Fault, Result, XmlRpcError};
use crate::procedures;
use crate::value::Value;
use std::collections::BTreeMap;
use tracing::trace;

pub const LIST_METHODS: &str = "system.listMethods";
pub const METHOD_SIGNATURE: &str = "system.methodSignature";
pub const METHOD_HELP: &str = "system.methodHelp";
pub const MULTICALL: &str = "system.multicall";

/// A procedure implementation.
pub type Handler = fn(&[Value]) -> Result<Value>;

/// A signature: return type first, then parameter types.
pub type Signature = &'static [&'static str];

#[derive(Clone)]
struct MethodInfo {
    signatures: &'static [Signature],
    help: &'static str,
    handler: Handler,
}

/// Builder for an immutable [`MethodRegistry`].
///
/// # Example
///
/// ```rust
/// use xmlrpc_core::{MethodRegistry, Value};
///
/// fn echo(params: &[Value]) -> xmlrpc_core::Result<Value> {
///     Ok(Value::Array(params.to_vec()))
/// }
///
/// let registry = MethodRegistry::builder()
///     .register("echo", &[&["array"]], "Return the arguments.", echo)
///     .with_introspection(true)
///     .build();
/// assert!(registry.list_methods().contains(&"echo".to_string()));
/// ```
#[derive(Default)]
pub struct MethodRegistryBuilder {
    methods: BTreeMap<String, MethodInfo>,
    introspection: bool,
    multicall: bool,
}

impl MethodRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a procedure. A later registration under the same name wins.
    pub fn register(
        mut self,
        name: impl Into<String>,
        signatures: &'static [Signature],
        help: &'static str,
        handler: Handler,
    ) -> Self {
        self.methods.insert(
            name.into(),
            MethodInfo {
                signatures,
                help,
                handler,
            },
        );
        self
    }

    /// Answer `system.listMethods`, `system.methodSignature` and `system.methodHelp`.
    ///
    /// Default: `false`
    pub fn with_introspection(mut self, enable: bool) -> Self {
        self.introspection = enable;
        self
    }

    /// Answer `system.multicall`.
    ///
    /// Default: `false`
    pub fn with_multicall(mut self, enable: bool) -> Self {
        self.multicall = enable;
        self
    }

    pub fn build(self) -> MethodRegistry {
        MethodRegistry {
            methods: self.methods,
            introspection: self.introspection,
            multicall: self.multicall,
        }
    }
}

/// Read-only mapping from method name to handler.
pub struct MethodRegistry {
    methods: BTreeMap<String, MethodInfo>,
    introspection: bool,
    multicall: bool,
}

const ARITHMETIC_SIGNATURES: &[Signature] = &[
    &["int", "int", "int"],
    &["i8", "i8", "i8"],
    &["double", "double", "double"],
];

impl MethodRegistry {
    pub fn builder() -> MethodRegistryBuilder {
        MethodRegistryBuilder::new()
    }

    /// The fixture endpoint: five procedures plus introspection and multicall.
    pub fn fixture() -> Self {
        Self::builder()
            .register(
                "add",
                ARITHMETIC_SIGNATURES,
                "add(a, b) => a + b for two numbers.",
                procedures::add,
            )
            .register(
                "subtract",
                ARITHMETIC_SIGNATURES,
                "subtract(a, b) => a - b for two numbers.",
                procedures::subtract,
            )
            .register(
                "index",
                &[&["value", "array", "int"], &["string", "string", "int"]],
                "index(a, i) => element i of array or string a. Negative i counts from the end.",
                procedures::index,
            )
            .register(
                "upper",
                &[&["string", "string"]],
                "upper(s) => s with every character upper-cased.",
                procedures::upper,
            )
            .register(
                "title",
                &[&["string", "string"]],
                "title(s) => s with the first letter of each word upper-cased and the rest lower-cased.",
                procedures::title,
            )
            .with_introspection(true)
            .with_multicall(true)
            .build()
    }

    fn system_methods(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.introspection {
            names.extend([LIST_METHODS, METHOD_HELP, METHOD_SIGNATURE]);
        }
        if self.multicall {
            names.push(MULTICALL);
        }
        names
    }

    /// Sorted names of every callable method, including `system.*` ones.
    pub fn list_methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .keys()
            .cloned()
            .chain(self.system_methods().into_iter().map(String::from))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn system_info(name: &str) -> Option<(Signature, &'static str)> {
        const LIST_METHODS_SIG: Signature = &["array"];
        const METHOD_SIGNATURE_SIG: Signature = &["array", "string"];
        const METHOD_HELP_SIG: Signature = &["string", "string"];
        const MULTICALL_SIG: Signature = &["array", "array"];

        match name {
            LIST_METHODS => Some((
                LIST_METHODS_SIG,
                "Return an array of every method supported by the server.",
            )),
            METHOD_SIGNATURE => Some((
                METHOD_SIGNATURE_SIG,
                "Return an array of signatures for the named method.",
            )),
            METHOD_HELP => Some((METHOD_HELP_SIG, "Return help text for the named method.")),
            MULTICALL => Some((
                MULTICALL_SIG,
                "Run an array of {methodName, params} calls; return [result] or a fault struct per call.",
            )),
            _ => None,
        }
    }

    fn lookup_system(&self, name: &str) -> Option<(Signature, &'static str)> {
        if self.system_methods().iter().any(|m| *m == name) {
            Self::system_info(name)
        } else {
            None
        }
    }

    /// Signatures of `name`, as an array of arrays of type names.
    pub fn method_signature(&self, name: &str) -> Result<Value> {
        let signatures: Vec<Signature> = match self.methods.get(name) {
            Some(info) => info.signatures.to_vec(),
            None => match self.lookup_system(name) {
                Some((signature, _)) => vec![signature],
                None => return Err(XmlRpcError::MethodNotFound(name.to_string())),
            },
        };
        Ok(Value::Array(
            signatures
                .into_iter()
                .map(|sig| Value::Array(sig.iter().map(|t| Value::from(*t)).collect()))
                .collect(),
        ))
    }

    /// Help text of `name`.
    pub fn method_help(&self, name: &str) -> Result<Value> {
        match self.methods.get(name) {
            Some(info) => Ok(Value::from(info.help)),
            None => self
                .lookup_system(name)
                .map(|(_, help)| Value::from(help))
                .ok_or_else(|| XmlRpcError::MethodNotFound(name.to_string())),
        }
    }

    /// Dispatch a call by name.
    pub fn dispatch(&self, method: &str, params: &[Value]) -> Result<Value> {
        if let Some(info) = self.methods.get(method) {
            return (info.handler)(params);
        }

        match method {
            LIST_METHODS if self.introspection => {
                expect_no_args(method, params)?;
                Ok(Value::Array(
                    self.list_methods().into_iter().map(Value::from).collect(),
                ))
            }
            METHOD_SIGNATURE if self.introspection => {
                self.method_signature(expect_name_arg(method, params)?)
            }
            METHOD_HELP if self.introspection => self.method_help(expect_name_arg(method, params)?),
            MULTICALL if self.multicall => self.multicall(params),
            _ => Err(XmlRpcError::MethodNotFound(method.to_string())),
        }
    }

    fn multicall(&self, params: &[Value]) -> Result<Value> {
        let calls = match params {
            [Value::Array(calls)] => calls,
            [other] => {
                return Err(XmlRpcError::TypeMismatch {
                    method: MULTICALL.to_string(),
                    expected: "array".to_string(),
                    actual: other.type_name().to_string(),
                })
            }
            _ => {
                return Err(XmlRpcError::ArgumentCount {
                    method: MULTICALL.to_string(),
                    expected: 1,
                    given: params.len(),
                })
            }
        };

        let results = calls
            .iter()
            .map(|call| match self.multicall_one(call) {
                Ok(value) => Value::Array(vec![value]),
                Err(e) => fault_value(&e.to_fault()),
            })
            .collect();
        Ok(Value::Array(results))
    }

    fn multicall_one(&self, call: &Value) -> Result<Value> {
        let method = call
            .get("methodName")
            .and_then(Value::as_str)
            .ok_or_else(|| XmlRpcError::protocol("multicall entry is missing methodName"))?;
        let params: &[Value] = match call.get("params") {
            Some(Value::Array(params)) => params.as_slice(),
            None => &[],
            Some(other) => {
                return Err(XmlRpcError::protocol(format!(
                    "multicall params must be an array, saw {}",
                    other.type_name()
                )))
            }
        };
        if method == MULTICALL {
            return Err(XmlRpcError::protocol("recursive system.multicall forbidden"));
        }
        trace!("multicall entry {}", method);
        self.dispatch(method, params)
    }
}

fn expect_no_args(method: &str, params: &[Value]) -> Result<()> {
    if params.is_empty() {
        Ok(())
    } else {
        Err(XmlRpcError::ArgumentCount {
            method: method.to_string(),
            expected: 0,
            given: params.len(),
        })
    }
}

fn expect_name_arg<'a>(method: &str, params: &'a [Value]) -> Result<&'a str> {
    match params {
        [Value::String(name)] => Ok(name.as_str()),
        [other] => Err(XmlRpcError::TypeMismatch {
            method: method.to_string(),
            expected: "string".to_string(),
            actual: other.type_name().to_string(),
        }),
        _ => Err(XmlRpcError::ArgumentCount {
            method: method.to_string(),
            expected: 1,
            given: params.len(),
        }),
    }
}

/// A fault as the `{faultCode, faultString}` struct used inside multicall results.
pub fn fault_value(fault: &Fault) -> Value {
    let mut members = BTreeMap::new();
    members.insert("faultCode".to_string(), Value::integer(fault.code));
    members.insert("faultString".to_string(), Value::from(fault.message.as_str()));
    Value::Struct(members)
}
