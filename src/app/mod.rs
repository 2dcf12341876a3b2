//! Console front end: commands, prompts, display and the session loop.

pub mod commands;
pub mod dispatcher;
pub mod display;
pub mod input;
pub mod runner;
pub mod startup;

pub use dispatcher::Dispatcher;
pub use display::{ConsoleSink, DisplayLine, DisplaySink, MemorySink};
pub use input::{InputSource, ScriptedInput, StdinInput};
pub use runner::{Pipeline, Session};
