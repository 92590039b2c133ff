//! Command argument building.
//!
//! Every argument crosses the wire as a bulk string; [`ToArg`] renders a
//! domain value into its canonical byte form. Integers go through `itoa`
//! and floats through `ryu`, so numeric arguments round-trip at full
//! precision without allocating intermediate `String`s via `format!`.

use bytes::Bytes;

/// Renders a value as the byte payload of a bulk-string argument.
pub trait ToArg {
    fn to_arg(&self) -> Bytes;
}

/// References render like the value they point at, so slices of owned
/// pairs and iterators of borrowed keys both feed [`CommandArgs`]
/// without copies at the call site.
impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Bytes {
        (**self).to_arg()
    }
}

impl ToArg for str {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Bytes {
        self.clone()
    }
}

impl ToArg for [u8] {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for i64 {
    fn to_arg(&self) -> Bytes {
        let mut buf = itoa::Buffer::new();
        Bytes::copy_from_slice(buf.format(*self).as_bytes())
    }
}

impl ToArg for u64 {
    fn to_arg(&self) -> Bytes {
        let mut buf = itoa::Buffer::new();
        Bytes::copy_from_slice(buf.format(*self).as_bytes())
    }
}

impl ToArg for usize {
    fn to_arg(&self) -> Bytes {
        let mut buf = itoa::Buffer::new();
        Bytes::copy_from_slice(buf.format(*self).as_bytes())
    }
}

impl ToArg for f64 {
    fn to_arg(&self) -> Bytes {
        let mut buf = ryu::Buffer::new();
        Bytes::copy_from_slice(buf.format(*self).as_bytes())
    }
}

/// Builder for a command's argv: the uppercase verb followed by its
/// arguments, each rendered through [`ToArg`].
#[derive(Debug, Clone)]
pub struct CommandArgs {
    argv: Vec<Bytes>,
}

impl CommandArgs {
    /// Starts a command. The verb is the literal wire name, uppercase
    /// by convention (`"XADD"`, `"GET"`, …).
    pub fn new(verb: &'static str) -> CommandArgs {
        CommandArgs {
            argv: vec![Bytes::from_static(verb.as_bytes())],
        }
    }

    /// Builds a command from raw tokens, uppercasing the verb as the
    /// wire form requires. `None` when `tokens` is empty.
    pub fn from_tokens(tokens: &[String]) -> Option<CommandArgs> {
        let (verb, rest) = tokens.split_first()?;
        let mut argv = Vec::with_capacity(tokens.len());
        argv.push(Bytes::from(verb.to_ascii_uppercase().into_bytes()));
        for token in rest {
            argv.push(Bytes::copy_from_slice(token.as_bytes()));
        }
        Some(CommandArgs { argv })
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl ToArg) -> CommandArgs {
        self.argv.push(arg.to_arg());
        self
    }

    /// Appends every item of an iterator.
    pub fn args<T: ToArg>(mut self, args: impl IntoIterator<Item = T>) -> CommandArgs {
        for arg in args {
            self.argv.push(arg.to_arg());
        }
        self
    }

    /// Appends `name value` when the option is set.
    pub fn opt(self, name: &'static str, value: Option<impl ToArg>) -> CommandArgs {
        match value {
            Some(v) => self.arg(name).arg(v),
            None => self,
        }
    }

    /// Appends a bare flag token when `set` is true.
    pub fn flag(self, name: &'static str, set: bool) -> CommandArgs {
        if set {
            self.arg(name)
        } else {
            self
        }
    }

    /// The verb, as sent on the wire.
    pub fn verb(&self) -> &[u8] {
        &self.argv[0]
    }

    pub fn into_argv(self) -> Vec<Bytes> {
        self.argv
    }
}
