mod attachment;
mod batch;
mod history;
mod template;
mod workflow;

pub use attachment::{Cookie, HeaderGroup, Proxy, ProxyScheme};
pub use batch::{BatchItem, BatchTask, ItemStatus, SaveField, TaskStatus};
pub use history::History;
pub use template::{ExtractType, Template};
pub use workflow::Workflow;
