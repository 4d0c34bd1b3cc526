//! The spaces. Each module implements one region policy; all of them
//! implement the [`Space`](space::Space) trait for uniform inspection.

pub mod largeobjectspace;
pub mod newspace;
pub mod pagedspace;
pub mod readonlyspace;
pub mod space;
