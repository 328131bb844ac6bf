//! irbind - handle interning for native IR library bindings
//!
//! Keeps a Rust object model in step with a native, C-ABI IR library whose
//! objects are opaque handles:
//!
//! - Each native handle maps to exactly one wrapper (`Arc<Value>`,
//!   `Arc<IrType>`) for its whole native lifetime
//! - A value handle is classified into its concrete class from the kind tag
//!   the native library reports
//! - Native deletion and replace-all-uses-with notifications are applied to
//!   the caches through `extern "C"` callbacks that never unwind
//!
//! # Example
//!
//! ```ignore
//! use irbind::{views::Function, Context};
//!
//! let context = Context::create(library)?;
//! let function: Function = context.resolve(handle)?;
//! for edge in context.uses_of(&function)? {
//!     let edge = edge?;
//!     println!("{:?} used by {:?}", edge.value().handle(), edge.user().class());
//! }
//! context.dispose();
//! ```

#![warn(missing_docs)]

mod callback;
mod context;
mod context_cache;
pub mod dispatch;
mod error;
mod interning;
mod options;
mod type_cache;
mod types;
mod uses;
mod value;
mod value_cache;

pub use context::{resolve, Context};
pub use context_cache::ContextCache;
pub use error::{InteropError, InteropResult};
pub use interning::HandleInterningMap;
pub use options::{ConcurrencyPolicy, ContextOptions};
pub use type_cache::TypeCache;
pub use types::{IrType, TypeClass};
pub use uses::{Operands, Use, Uses};
pub use value::{views, Value, ValueClass, ValueType};
pub use value_cache::{CacheStats, ValueCache};

pub use irbind_sys as sys;
