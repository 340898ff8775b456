pub mod orders;

pub use orders::Entity as Orders;
