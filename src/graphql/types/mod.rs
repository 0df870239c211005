pub mod cart;
pub mod catalog;
pub mod contact;
pub mod content;
pub mod order;

pub use cart::{Cart, CartItem, CartPayload};
pub use catalog::{
    Category, CategoryPayload, DeletePayload, Product, ProductImage, ProductImagePayload,
    ProductInput, ProductPayload, ProductUpdateInput,
};
pub use contact::{ContactMessage, ContactMessagePayload};
pub use content::{SiteContent, SiteContentPayload, SiteSettings, SiteSettingsPayload};
pub use order::{Order, OrderInput, OrderItem, OrderPayload};
