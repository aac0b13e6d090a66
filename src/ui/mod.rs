pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{error, header, info, plan_step, row_cleared, section, success, warn};
pub use table::{dataset_table, stats_table, TableBuilder};
pub use theme::{err_theme, theme, Theme};
