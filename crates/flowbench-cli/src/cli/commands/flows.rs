use flowbench_core::config::Pacing;
use flowbench_core::FlowRegistry;

use crate::exit_codes::SUCCESS;

/// One line per registered flow: identifier, then reporting name.
pub fn run() -> i32 {
    for id in FlowRegistry::standard(&Pacing::default()).ids() {
        println!("{}\t{}", id.as_str(), id.display_name());
    }
    SUCCESS
}
