use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{GatewayError, Result};

/// One declared value of an enumeration. Exactly one instance exists per
/// declared name; it is shared by `Arc` and compared by identity.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumMember {
    enum_name: String,
    name: String,
    value: i64,
    write_name: bool,
}

impl EnumMember {
    pub fn enum_name(&self) -> &str {
        &self.enum_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn write_name(&self) -> bool {
        self.write_name
    }

    pub fn to_json(&self) -> Value {
        if self.write_name {
            Value::String(self.name.clone())
        } else {
            Value::from(self.value)
        }
    }
}

/// An immutable enumeration with lookup maps built at declaration.
#[derive(Debug)]
pub struct EnumType {
    name: String,
    write_name: bool,
    members: Vec<Arc<EnumMember>>,
    by_name: HashMap<String, usize>,
    by_value: HashMap<i64, usize>,
}

impl EnumType {
    /// Declare an enum whose ordinals are the positions of `names`.
    pub fn from_names<I, S>(name: &str, names: I, write_name: bool) -> Result<Arc<Self>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pairs = names
            .into_iter()
            .enumerate()
            .map(|(idx, n)| (n.into(), idx as i64));
        Self::from_ordinals(name, pairs, write_name)
    }

    /// Declare an enum with explicit ordinals. Duplicate names or ordinals
    /// are rejected.
    pub fn from_ordinals<I, S>(name: &str, pairs: I, write_name: bool) -> Result<Arc<Self>>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut ty = Self::empty(name, write_name);
        for (member, value) in pairs {
            let member = member.into();
            if ty.by_name.contains_key(&member) {
                return Err(GatewayError::Config(format!(
                    "enum {name} declares '{member}' twice"
                )));
            }
            if let Some(&existing) = ty.by_value.get(&value) {
                return Err(GatewayError::Config(format!(
                    "enum {name}: '{member}' reuses ordinal {value} of '{}'",
                    ty.members[existing].name
                )));
            }
            ty.push(member, value);
        }
        Ok(Arc::new(ty))
    }

    /// Used by [`gateway_enum!`](crate::gateway_enum); the compiler already
    /// rejects duplicate variants and discriminants there.
    #[doc(hidden)]
    pub fn __from_declaration(name: &str, pairs: &[(&str, i64)], write_name: bool) -> Arc<Self> {
        let mut ty = Self::empty(name, write_name);
        for (member, value) in pairs {
            ty.push((*member).to_string(), *value);
        }
        Arc::new(ty)
    }

    fn empty(name: &str, write_name: bool) -> Self {
        Self {
            name: name.to_string(),
            write_name,
            members: Vec::new(),
            by_name: HashMap::new(),
            by_value: HashMap::new(),
        }
    }

    fn push(&mut self, member: String, value: i64) {
        let idx = self.members.len();
        self.by_name.insert(member.clone(), idx);
        self.by_value.insert(value, idx);
        self.members.push(Arc::new(EnumMember {
            enum_name: self.name.clone(),
            name: member,
            value,
            write_name: self.write_name,
        }));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write_name(&self) -> bool {
        self.write_name
    }

    pub fn members(&self) -> &[Arc<EnumMember>] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<EnumMember>> {
        self.by_name.get(name).map(|&idx| self.members[idx].clone())
    }

    pub fn by_value(&self, value: i64) -> Option<Arc<EnumMember>> {
        self.by_value.get(&value).map(|&idx| self.members[idx].clone())
    }

    /// Resolve a raw JSON value: strings by name, integers by ordinal.
    /// Anything else, or a miss, yields [`EnumValue::Unknown`].
    pub fn resolve(&self, raw: &Value) -> EnumValue {
        let found = match raw {
            Value::String(name) => self.by_name(name),
            Value::Number(n) => n.as_i64().and_then(|v| self.by_value(v)),
            _ => None,
        };
        match found {
            Some(member) => EnumValue::Known(member),
            None => {
                log::warn!("{}: unknown value {}", self.name, raw);
                EnumValue::Unknown {
                    enum_name: self.name.clone(),
                    raw: raw.clone(),
                }
            }
        }
    }
}

/// A decoded enum field.
#[derive(Debug, Clone)]
pub enum EnumValue {
    Known(Arc<EnumMember>),
    /// A value the declaration does not know. Carries the raw input.
    Unknown { enum_name: String, raw: Value },
}

impl EnumValue {
    pub fn enum_name(&self) -> &str {
        match self {
            Self::Known(member) => member.enum_name(),
            Self::Unknown { enum_name, .. } => enum_name,
        }
    }

    /// The declared name, or a diagnostic `UNKNOWN(<raw>)` name.
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Self::Known(member) => Cow::Borrowed(member.name()),
            Self::Unknown { raw, .. } => Cow::Owned(format!("UNKNOWN({raw})")),
        }
    }

    pub fn ordinal(&self) -> Option<i64> {
        match self {
            Self::Known(member) => Some(member.value()),
            Self::Unknown { .. } => None,
        }
    }

    pub fn member(&self) -> Option<&Arc<EnumMember>> {
        match self {
            Self::Known(member) => Some(member),
            Self::Unknown { .. } => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }

    /// True when this is the declared member called `name`.
    pub fn is(&self, name: &str) -> bool {
        self.member().is_some_and(|m| m.name() == name)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Known(member) => member.to_json(),
            Self::Unknown { raw, .. } => raw.clone(),
        }
    }

    /// Map onto a compile-time enum declared with [`gateway_enum!`](crate::gateway_enum).
    pub fn resolve<E: GatewayEnum>(&self) -> Resolved<E> {
        match self {
            Self::Known(member) if member.enum_name() == E::ENUM_NAME => E::from_ordinal(member.value())
                .map(Resolved::Known)
                .unwrap_or_else(|| Resolved::Unknown(member.to_json())),
            other => Resolved::Unknown(other.to_json()),
        }
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Known(a), Self::Known(b)) => Arc::ptr_eq(a, b),
            (
                Self::Unknown { enum_name: a, raw: ra },
                Self::Unknown { enum_name: b, raw: rb },
            ) => a == b && ra == rb,
            _ => false,
        }
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Typed view of an [`EnumValue`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<E> {
    Known(E),
    Unknown(Value),
}

/// A Rust enum mirroring a portal enumeration. Implemented by
/// [`gateway_enum!`](crate::gateway_enum).
pub trait GatewayEnum: Sized + Copy + 'static {
    const ENUM_NAME: &'static str;
    const WRITE_NAME: bool;

    fn variants() -> &'static [Self];
    fn name(self) -> &'static str;
    fn ordinal(self) -> i64;

    /// The runtime descriptor, built once.
    fn enum_type() -> Arc<EnumType>;

    fn from_ordinal(value: i64) -> Option<Self> {
        Self::variants().iter().copied().find(|v| v.ordinal() == value)
    }

    fn by_name(name: &str) -> Option<Self> {
        Self::enum_type()
            .by_name(name)
            .and_then(|m| Self::from_ordinal(m.value()))
    }

    fn by_value(value: i64) -> Option<Self> {
        Self::enum_type()
            .by_value(value)
            .and_then(|m| Self::from_ordinal(m.value()))
    }

    /// The shared member for this variant.
    fn member(self) -> Option<Arc<EnumMember>> {
        Self::enum_type().by_value(self.ordinal())
    }
}

/// Declare a portal enum as a Rust enum with a static descriptor.
///
/// ```
/// gateway::gateway_enum! {
///     /// Lifecycle of an experiment.
///     pub enum ExperimentState(write_name = true) {
///         CREATED = 0,
///         VALIDATED = 1,
///         SCHEDULED = 2,
///     }
/// }
///
/// use gateway::model::GatewayEnum;
/// assert_eq!(ExperimentState::by_name("VALIDATED"), Some(ExperimentState::VALIDATED));
/// ```
#[macro_export]
macro_rules! gateway_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $ty:ident (write_name = $write_name:literal) {
            $($variant:ident = $ordinal:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i64)]
        $vis enum $ty {
            $($variant = $ordinal),+
        }

        impl $crate::model::GatewayEnum for $ty {
            const ENUM_NAME: &'static str = stringify!($ty);
            const WRITE_NAME: bool = $write_name;

            fn variants() -> &'static [Self] {
                &[$(Self::$variant),+]
            }

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }

            fn ordinal(self) -> i64 {
                self as i64
            }

            fn enum_type() -> ::std::sync::Arc<$crate::model::EnumType> {
                static TYPE: $crate::__private::Lazy<::std::sync::Arc<$crate::model::EnumType>> =
                    $crate::__private::Lazy::new(|| {
                        $crate::model::EnumType::__from_declaration(
                            stringify!($ty),
                            &[$((stringify!($variant), $ordinal)),+],
                            $write_name,
                        )
                    });
                TYPE.clone()
            }
        }
    };
}
