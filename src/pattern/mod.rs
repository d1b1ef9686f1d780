//! # Pattern Module
//!
//! Path Pattern Compiler: turns a human-authored template such as
//! `/user/<id:int>` into a [`CompiledPattern`] that can match concrete paths
//! (extracting typed [`PathValue`]s) and build concrete paths in reverse.
//!
//! ## Template syntax
//!
//! Templates are `/`-delimited. A segment wrapped in `<` `>` is a capture:
//!
//! | Segment            | Converter | Expression            | Native value |
//! |--------------------|-----------|-----------------------|--------------|
//! | `<name>`           | `string`  | `[^/]+`               | `Str`        |
//! | `<id:int>`         | `int`     | `[0-9]+`              | `Int(i64)`   |
//! | `<ratio:float>`    | `float`   | `[0-9]+\.[0-9]+`      | `Float(f64)` |
//! | `<slug:re:[a-z-]+>`| inline    | as written            | `Str`        |
//!
//! Additional converters can be added through [`ConverterRegistry`].
//!
//! ## Example
//!
//! ```rust
//! use routeweave::pattern::{CompiledPattern, PathArgs};
//!
//! let pattern = CompiledPattern::parse("/a/<x:int>/<y:int>").unwrap();
//! let params = pattern.match_path("/a/3/4").unwrap();
//! assert_eq!(params.get_int("x"), Some(3));
//! assert_eq!(params.get_int("y"), Some(4));
//!
//! let path = pattern.build_path(&PathArgs::new().with("x", 3).with("y", "4")).unwrap();
//! assert_eq!(path, "/a/3/4");
//! ```

mod compile;
mod converter;
mod params;

pub use compile::{CompiledPattern, PathSegment};
pub use converter::{Converter, ConverterRegistry, DEFAULT_CONVERTER, INLINE_CONVERTER};
pub use params::{PathArgs, PathParams, PathValue, MAX_INLINE_PARAMS};
