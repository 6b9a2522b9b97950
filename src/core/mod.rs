// Core modules implementing dependency resolution and error modeling.
pub mod cache;
pub mod closure;
pub mod error;
pub mod pe;
pub mod prefix;
pub mod system;
pub mod validate;
