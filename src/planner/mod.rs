//! 规划层：自然语言 + 工具目录 → 单个工具调用计划

pub mod adapter;
pub mod plan;
pub mod schema;

pub use adapter::PlannerAdapter;
pub use plan::{parse_plan, PendingAction, Plan};
pub use schema::plan_schema_json;
