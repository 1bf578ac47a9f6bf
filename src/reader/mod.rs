//! 分页 flash 读取核心模块

pub mod address;
pub mod link_manager;
pub mod pipeline;
pub mod plan;
mod session;

pub use address::{PAGE_SIZE, PageIndex, Window, page_index, window_address};
pub use link_manager::{Endpoint, LinkFactory};
pub use pipeline::{Pipeline, PipelineError, ReadSummary, read_range};
pub use plan::{Burst, ReadPlan, SegmentError, Step, Width};
pub use session::Session;
