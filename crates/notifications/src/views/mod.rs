mod dashboard;

pub use dashboard::{DashboardSnapshot, DashboardView, StockLevel};
