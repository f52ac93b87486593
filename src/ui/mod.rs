pub mod icons;
pub mod output;
pub mod progress;
pub mod progress_message;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    banner, diagnostic, dim, error, header, human_bytes, info, muted, phase, section, status, success,
    summary_row, timing, tree_line, warn,
};
pub use progress::{ProgressManager, Spinner};
pub use progress_message::{ProgressMessage, ProgressPhase};
pub use table::{module_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
