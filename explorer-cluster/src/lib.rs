pub mod member;
pub mod membership_tracker;
