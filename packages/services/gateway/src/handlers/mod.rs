//! Gateway 핸들러

pub mod dispatch;
pub mod docs;
pub mod health;
