//! Argument capture for cache key rendering.
//!
//! Call arguments are captured through `serde::Serialize` into
//! `serde_json::Value`s. A receiver, when present, is simply argument 0.
//! Arguments that fail to serialize are remembered as unsupported and only
//! reported if a template actually references them.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A captured argument slot: either a renderable value or the reason it
/// could not be captured.
type Slot = std::result::Result<Value, String>;

fn capture<T: Serialize + ?Sized>(value: &T) -> Slot {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Ordered positional arguments plus named arguments of a single call.
#[derive(Debug, Clone, Default)]
pub struct ArgList {
    positional: Vec<Slot>,
    named: BTreeMap<String, Slot>,
}

impl ArgList {
    /// Empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the arguments of a call.
    pub fn collect<A: KeyArgs + ?Sized>(args: &A) -> Result<Self> {
        let mut list = Self::new();
        args.collect_into(&mut list)?;
        Ok(list)
    }

    /// Capture the arguments of a method call; `receiver` becomes argument 0.
    pub fn with_receiver<R, A>(receiver: &R, args: &A) -> Result<Self>
    where
        R: Serialize + ?Sized,
        A: KeyArgs + ?Sized,
    {
        let mut list = Self::new();
        list.push(receiver);
        args.collect_into(&mut list)?;
        Ok(list)
    }

    /// Append a positional argument.
    pub fn push<T: Serialize + ?Sized>(&mut self, value: &T) {
        self.positional.push(capture(value));
    }

    /// Insert a named argument, replacing any previous value under `name`.
    pub fn insert<T: Serialize + ?Sized>(&mut self, name: impl Into<String>, value: &T) {
        self.named.insert(name.into(), capture(value));
    }

    /// Number of positional arguments.
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Resolve positional argument `index`.
    ///
    /// # Errors
    /// - `Error::KeyFormatError` if fewer than `index + 1` arguments were supplied
    /// - `Error::UnsupportedArgumentTypeError` if the argument failed to serialize
    pub fn positional(&self, index: usize) -> Result<&Value> {
        match self.positional.get(index) {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(Error::UnsupportedArgumentTypeError(format!(
                "positional argument {} cannot be used in a cache key: {}",
                index, reason
            ))),
            None => Err(Error::KeyFormatError(format!(
                "positional argument {} referenced but only {} supplied",
                index,
                self.positional.len()
            ))),
        }
    }

    /// Resolve named argument `name`.
    ///
    /// # Errors
    /// - `Error::KeyFormatError` if no argument named `name` was supplied
    /// - `Error::UnsupportedArgumentTypeError` if the argument failed to serialize
    pub fn named(&self, name: &str) -> Result<&Value> {
        match self.named.get(name) {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(Error::UnsupportedArgumentTypeError(format!(
                "named argument '{}' cannot be used in a cache key: {}",
                name, reason
            ))),
            None => Err(Error::KeyFormatError(format!(
                "named argument '{}' referenced but not supplied",
                name
            ))),
        }
    }
}

/// Types that can be captured as the argument list of a cached call.
///
/// Implemented for `()`, for tuples of up to eight `Serialize` values, for
/// [`Named`] and for [`ArgList`] itself.
pub trait KeyArgs {
    /// Append this call's arguments to `list`.
    fn collect_into(&self, list: &mut ArgList) -> Result<()>;
}

impl KeyArgs for () {
    fn collect_into(&self, _list: &mut ArgList) -> Result<()> {
        Ok(())
    }
}

impl KeyArgs for ArgList {
    fn collect_into(&self, list: &mut ArgList) -> Result<()> {
        list.positional.extend(self.positional.iter().cloned());
        list.named
            .extend(self.named.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

macro_rules! tuple_key_args {
    ($($ty:ident => $idx:tt),+) => {
        impl<$($ty: Serialize),+> KeyArgs for ($($ty,)+) {
            fn collect_into(&self, list: &mut ArgList) -> Result<()> {
                $( list.push(&self.$idx); )+
                Ok(())
            }
        }
    };
}

tuple_key_args!(A => 0);
tuple_key_args!(A => 0, B => 1);
tuple_key_args!(A => 0, B => 1, C => 2);
tuple_key_args!(A => 0, B => 1, C => 2, D => 3);
tuple_key_args!(A => 0, B => 1, C => 2, D => 3, E => 4);
tuple_key_args!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);
tuple_key_args!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6);
tuple_key_args!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6, H => 7);

/// Positional arguments together with named ones.
///
/// `named` must serialize to a map or struct; each entry becomes a named
/// argument addressable as `{name}` in a template.
///
/// ```
/// use cached_result::args::{ArgList, Named};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Page { page: u32 }
///
/// let list = ArgList::collect(&Named::new(("users",), Page { page: 2 })).unwrap();
/// assert_eq!(list.named("page").unwrap(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Named<A, N> {
    pub args: A,
    pub named: N,
}

impl<A, N> Named<A, N> {
    pub fn new(args: A, named: N) -> Self {
        Named { args, named }
    }
}

impl<A: KeyArgs, N: Serialize> KeyArgs for Named<A, N> {
    fn collect_into(&self, list: &mut ArgList) -> Result<()> {
        self.args.collect_into(list)?;

        let named = serde_json::to_value(&self.named).map_err(|e| {
            Error::UnsupportedArgumentTypeError(format!(
                "named arguments cannot be captured: {}",
                e
            ))
        })?;

        match named {
            Value::Object(map) => {
                for (name, value) in map {
                    list.named.insert(name, Ok(value));
                }
                Ok(())
            }
            Value::Null => Ok(()),
            other => Err(Error::UnsupportedArgumentTypeError(format!(
                "named arguments must serialize to a map, got {}",
                other
            ))),
        }
    }
}
