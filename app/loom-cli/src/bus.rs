use loom_loop::EventBus;
use loom_protocol::LoopEvent;
use loom_protocol::Part;
use std::io::Write;
use std::sync::Mutex;

/// Prints the parts of the running assistant turn to stdout as they
/// arrive. This is the one place in the workspace allowed to write to
/// stdout directly, per the specification's logging section — everywhere
/// else uses `tracing`.
#[derive(Default)]
pub struct ConsoleEventBus {
    last_text_len: Mutex<usize>,
}

impl EventBus for ConsoleEventBus {
    fn publish(&self, event: LoopEvent) {
        match event {
            LoopEvent::PartUpdated { part, .. } => self.print_part(&part),
            LoopEvent::ToolProgress { message, .. } => println!("  … {message}"),
            LoopEvent::PermissionRequested { request, .. } => {
                println!("  [permission requested] {}", request.description)
            }
            LoopEvent::StepFinished { .. } => {
                println!();
                *self.last_text_len.lock().unwrap_or_else(|e| e.into_inner()) = 0;
            }
            LoopEvent::Compacted { reason, .. } => println!("  [history compacted: {reason:?}]"),
            LoopEvent::SessionDiff { summary, .. } => {
                println!(
                    "  [diff +{} -{} across {} file(s)]",
                    summary.added_lines,
                    summary.deleted_lines,
                    summary.files.len()
                )
            }
            LoopEvent::Error { message, .. } => println!("\n  [error] {message}"),
            LoopEvent::StepStarted { .. } => {}
        }
    }
}

impl ConsoleEventBus {
    fn print_part(&self, part: &Part) {
        match part {
            Part::Text { text } => {
                let mut last_len = self.last_text_len.lock().unwrap_or_else(|e| e.into_inner());
                let new_suffix = text.get(*last_len..).unwrap_or(text);
                print!("{new_suffix}");
                let _ = std::io::stdout().flush();
                *last_len = text.len();
            }
            Part::Tool { name, state, .. } => {
                println!("\n  [tool {name}: {state:?}]");
            }
            _ => {}
        }
    }
}
