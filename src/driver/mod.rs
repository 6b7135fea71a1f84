//! Recorded command streams shared by the device core and backends.

pub mod command;

pub use command::{Command, CommandEncoder, CommandSink, EncoderKind, Op};
