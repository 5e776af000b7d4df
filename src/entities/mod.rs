pub mod app_setting;
pub mod article;
pub mod category;
pub mod order;
pub mod order_item;
