pub mod match_record;
pub mod odds;
pub mod upstream;
