pub mod checklist;
pub mod client;
pub mod funnel;
