mod item;

pub use item::{is_usable_title, timestamp, PriceDrop, TrackedItem, UserId, PLACEHOLDER_TITLE};
