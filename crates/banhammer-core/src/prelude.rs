pub use banhammer_types::prelude::*;

// vim: ts=4
