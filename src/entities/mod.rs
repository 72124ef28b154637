//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod cart;
pub mod cart_item;
pub mod category;
pub mod discount;
pub mod product;
pub mod product_image;
pub mod promotion;
pub mod subcategory;
pub mod subscriber;
pub mod used_promotion;

// Re-export specific types to avoid conflicts
pub use cart::{Column as CartColumn, Entity as Cart, Model as CartModel};
pub use cart_item::{Column as CartItemColumn, Entity as CartItem, Model as CartItemModel};
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use discount::{Column as DiscountColumn, Entity as Discount, Model as DiscountModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use product_image::{
    Column as ProductImageColumn, Entity as ProductImage, Model as ProductImageModel,
};
pub use promotion::{Column as PromotionColumn, Entity as Promotion, Model as PromotionModel};
pub use subcategory::{
    Column as SubcategoryColumn, Entity as Subcategory, Model as SubcategoryModel,
};
pub use subscriber::{
    Column as SubscriberColumn, Entity as Subscriber, Model as SubscriberModel,
};
pub use used_promotion::{
    Column as UsedPromotionColumn, Entity as UsedPromotion, Model as UsedPromotionModel,
};
