/// Reader and writer abstractions shared by the item implementations.
pub mod item;
