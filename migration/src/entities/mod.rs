pub mod ad;
pub mod visit_log;
pub mod visit_sequence;
