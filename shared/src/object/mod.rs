pub mod object_id;
pub mod tracked_object;
pub mod value;
