mod fill;
mod order;
mod order_status;
mod order_type;
mod position;
mod protection;
mod side;

pub use fill::Fill;
pub use order::{Order, OrderId};
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use position::Position;
pub use protection::ProtectiveLevels;
pub use side::Side;
