pub mod meeting;
pub mod sync_run;
