//! Calls into functions exported by native shared libraries.
//!
//! A [`NativeFunction`] is built once per `extern` declaration: it opens the
//! library, resolves the symbol and prepares a libffi call interface for the
//! declared signature. Each call then converts script values into argument
//! slots that live exactly as long as the call, invokes the symbol, and turns
//! the raw return back into a [`Value`].
//!
//! Nothing checks that the declared signature matches the real one. A wrong
//! declaration has the same consequences as calling the function from C with
//! the wrong prototype.

use std::{
    ffi::{CStr, CString},
    fmt, mem,
    os::raw::{c_char, c_int, c_long, c_longlong, c_short},
};

use libffi::{
    middle::{Arg, Cif, CodePtr, Type},
    raw::ffi_sarg,
};
use libloading::Library;
use tracing::{debug, trace};

use crate::{diagnostics::RuntimeError, value::Value};

/// Native representation used for one parameter or the return of a declared
/// function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Only valid as a return type.
    Void,
    Short,
    Int,
    Long,
    LongLong,
    Float,
    Double,
    /// A pointer to a NUL-terminated byte string.
    Text,
}

impl TypeTag {
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Void => "void",
            TypeTag::Short => "short",
            TypeTag::Int => "int",
            TypeTag::Long => "long",
            TypeTag::LongLong => "long long",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::Text => "string",
        }
    }

    /// Looks up a single-word type name as written in declarations.
    /// `long long` is two words and is assembled by the parser.
    pub fn from_name(name: &str) -> Option<Self> {
        let tag = match name {
            "void" => TypeTag::Void,
            "short" => TypeTag::Short,
            "int" => TypeTag::Int,
            "long" => TypeTag::Long,
            "float" => TypeTag::Float,
            "double" => TypeTag::Double,
            "string" => TypeTag::Text,
            _ => return None,
        };
        Some(tag)
    }

    fn ffi_type(self) -> Type {
        match self {
            TypeTag::Void => Type::void(),
            TypeTag::Short => Type::c_short(),
            TypeTag::Int => Type::c_int(),
            TypeTag::Long => Type::c_long(),
            TypeTag::LongLong => Type::c_longlong(),
            TypeTag::Float => Type::f32(),
            TypeTag::Double => Type::f64(),
            TypeTag::Text => Type::pointer(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a declaration says about a native function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSignature {
    /// Path of the shared library; empty means the running process.
    pub library: String,
    pub symbol: String,
    pub return_type: TypeTag,
    pub parameters: Vec<TypeTag>,
}

impl NativeSignature {
    pub fn new(
        library: impl Into<String>,
        symbol: impl Into<String>,
        parameters: Vec<TypeTag>,
        return_type: TypeTag,
    ) -> Self {
        Self {
            library: library.into(),
            symbol: symbol.into(),
            return_type,
            parameters,
        }
    }
}

/// A declared native function together with the library handle that keeps its
/// code mapped. The handle is closed when this value is dropped, so the type
/// is not `Clone`.
pub struct NativeFunction {
    signature: NativeSignature,
    cif: Cif,
    code: CodePtr,
    // Declared last so the library is closed after everything pointing into it.
    _library: Library,
}

impl NativeFunction {
    pub fn load(signature: NativeSignature) -> Result<Self, RuntimeError> {
        let library =
            open_library(&signature.library).map_err(|source| RuntimeError::LibraryLoad {
                path: signature.library.clone(),
                source,
            })?;

        // SAFETY: the symbol is only ever called through `cif`, which is built
        // from the declared signature. The pointer is copied out of the
        // `Symbol` but never outlives `library`, which moves into `Self`.
        let code = unsafe { library.get::<unsafe extern "C" fn()>(signature.symbol.as_bytes()) }
            .map(|symbol| CodePtr::from_fun(*symbol))
            .map_err(|source| RuntimeError::SymbolResolve {
                library: signature.library.clone(),
                symbol: signature.symbol.clone(),
                source,
            })?;

        let cif = prepare_cif(&signature)?;
        debug!(
            library = %signature.library,
            symbol = %signature.symbol,
            parameters = signature.parameters.len(),
            returns = %signature.return_type,
            "bound native function"
        );
        Ok(Self {
            signature,
            cif,
            code,
            _library: library,
        })
    }

    pub fn name(&self) -> &str {
        &self.signature.symbol
    }

    pub fn signature(&self) -> &NativeSignature {
        &self.signature
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        let parameters = &self.signature.parameters;
        if args.len() != parameters.len() {
            return Err(RuntimeError::Arity {
                name: self.signature.symbol.clone(),
                expected: parameters.len(),
                actual: args.len(),
            });
        }

        let slots = parameters
            .iter()
            .zip(args)
            .map(|(tag, value)| ArgSlot::marshal(*tag, value, &self.signature.symbol))
            .collect::<Result<Vec<_>, _>>()?;
        let ffi_args: Vec<Arg> = slots.iter().map(ArgSlot::as_arg).collect();

        trace!(symbol = %self.signature.symbol, arguments = args.len(), "calling native function");
        self.invoke(&ffi_args)
    }

    fn invoke(&self, args: &[Arg]) -> Result<Value, RuntimeError> {
        // SAFETY (all calls below): `cif` describes the declared signature and
        // every `Arg` points into a slot of the matching type that outlives the
        // call. Whether the declaration is truthful is up to the script.
        let value = match self.signature.return_type {
            TypeTag::Void => {
                unsafe { self.cif.call::<()>(self.code, args) };
                Value::int(0)
            }
            TypeTag::Short => Value::int(unsafe { self.call_integer::<c_short>(args) }),
            TypeTag::Int => Value::int(unsafe { self.call_integer::<c_int>(args) }),
            TypeTag::Long => Value::int(unsafe { self.call_integer::<c_long>(args) }),
            TypeTag::LongLong => Value::int(unsafe { self.call_integer::<c_longlong>(args) }),
            TypeTag::Float => {
                let raw = unsafe { self.cif.call::<f32>(self.code, args) };
                Value::float(f64::from(raw))
            }
            TypeTag::Double => Value::float(unsafe { self.cif.call::<f64>(self.code, args) }),
            TypeTag::Text => {
                let pointer = unsafe { self.cif.call::<*const c_char>(self.code, args) };
                if pointer.is_null() {
                    return Err(RuntimeError::NullText {
                        name: self.signature.symbol.clone(),
                    });
                }
                // SAFETY: non-null, and a `string` return promises a
                // NUL-terminated buffer. Its bytes are copied, never freed.
                let text = unsafe { CStr::from_ptr(pointer) };
                Value::text(text.to_bytes())
            }
        };
        Ok(value)
    }

    /// libffi widens integer returns narrower than a register to `ffi_sarg`
    /// and expects a buffer of at least that size, so those are read through
    /// the wide type and narrowed afterwards.
    unsafe fn call_integer<T: NativeInt>(&self, args: &[Arg]) -> i64 {
        if mem::size_of::<T>() < mem::size_of::<ffi_sarg>() {
            let register: ffi_sarg = unsafe { self.cif.call(self.code, args) };
            T::narrow(register).widen()
        } else {
            let raw: T = unsafe { self.cif.call(self.code, args) };
            raw.widen()
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

fn open_library(path: &str) -> Result<Library, libloading::Error> {
    if path.is_empty() {
        return this_process();
    }
    // SAFETY: loading runs the library's initializers; trusting the library
    // is part of declaring it.
    unsafe { Library::new(path) }
}

#[cfg(unix)]
fn this_process() -> Result<Library, libloading::Error> {
    Ok(libloading::os::unix::Library::this().into())
}

#[cfg(windows)]
fn this_process() -> Result<Library, libloading::Error> {
    libloading::os::windows::Library::this().map(Library::from)
}

fn prepare_cif(signature: &NativeSignature) -> Result<Cif, RuntimeError> {
    if let Some(index) = signature
        .parameters
        .iter()
        .position(|tag| *tag == TypeTag::Void)
    {
        return Err(RuntimeError::Signature {
            name: signature.symbol.clone(),
            reason: format!("parameter {} is void, which is only valid as a return type", index + 1),
        });
    }
    Ok(Cif::new(
        signature.parameters.iter().map(|tag| tag.ffi_type()),
        signature.return_type.ffi_type(),
    ))
}

/// Storage for one marshaled argument, alive for the duration of one call.
enum ArgSlot {
    Short(c_short),
    Int(c_int),
    Long(c_long),
    LongLong(c_longlong),
    Float(f32),
    Double(f64),
    Text {
        // Owns the bytes `pointer` refers to.
        _buffer: CString,
        pointer: *const c_char,
    },
}

impl ArgSlot {
    fn marshal(tag: TypeTag, value: &Value, name: &str) -> Result<Self, RuntimeError> {
        let slot = match tag {
            TypeTag::Short => ArgSlot::Short(value.to_short()?),
            TypeTag::Int => ArgSlot::Int(value.to_int()?),
            TypeTag::Long => ArgSlot::Long(value.to_long()?),
            TypeTag::LongLong => ArgSlot::LongLong(value.to_long_long()?),
            TypeTag::Float => ArgSlot::Float(value.to_float()?),
            TypeTag::Double => ArgSlot::Double(value.to_double()?),
            TypeTag::Text => {
                let buffer =
                    CString::new(value.to_text()?).map_err(|_| RuntimeError::InteriorNul {
                        name: name.to_string(),
                    })?;
                let pointer = buffer.as_ptr();
                ArgSlot::Text {
                    _buffer: buffer,
                    pointer,
                }
            }
            TypeTag::Void => {
                return Err(RuntimeError::UnsupportedArgument {
                    name: name.to_string(),
                    tag,
                });
            }
        };
        Ok(slot)
    }

    fn as_arg(&self) -> Arg {
        match self {
            ArgSlot::Short(value) => Arg::new(value),
            ArgSlot::Int(value) => Arg::new(value),
            ArgSlot::Long(value) => Arg::new(value),
            ArgSlot::LongLong(value) => Arg::new(value),
            ArgSlot::Float(value) => Arg::new(value),
            ArgSlot::Double(value) => Arg::new(value),
            ArgSlot::Text { pointer, .. } => Arg::new(pointer),
        }
    }
}

/// Signed integer widths a native call can return.
trait NativeInt: Copy {
    fn narrow(register: ffi_sarg) -> Self;
    fn widen(self) -> i64;
}

macro_rules! native_int {
    ($($ty:ty),*) => {
        $(
            impl NativeInt for $ty {
                fn narrow(register: ffi_sarg) -> Self {
                    register as $ty
                }

                fn widen(self) -> i64 {
                    self as i64
                }
            }
        )*
    };
}

native_int!(i16, i32, i64);
