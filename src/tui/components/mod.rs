pub mod widget_card;

pub use widget_card::WidgetCard;
