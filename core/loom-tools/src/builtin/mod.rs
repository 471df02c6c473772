mod bash;
mod edit;
mod glob;
mod grep;
mod read;
mod task;
mod write;

pub use bash::BashTool;
pub use edit::EditTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use read::ReadTool;
pub use task::TaskTool;
pub use write::WriteTool;
