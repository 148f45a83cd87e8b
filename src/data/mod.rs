pub mod bar;
pub mod loader;

pub use bar::{Bar, BarError};
pub use loader::{filter_by_symbol, load_csv, load_csv_filtered, load_data_root, BarFilter, Interval};
