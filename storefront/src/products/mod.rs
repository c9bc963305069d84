//! Products: a product row, its category association and its images
//!
//! [`ProductRepository`] implements [`Repository`](crate::repository::Repository)
//! for [`Product`]:
//!
//! - `find_many` searches title and description, filters by category and
//!   creation day, sorts by `id`, `title`, `price`, `created_at` or `updated_at`
//! - `insert` writes the product, its category association and its images in
//!   one transaction
//! - `update` applies present fields, reassigns the category, and replaces
//!   the image set when one is given
//! - `delete` removes images, association and product in one transaction,
//!   then the image files

mod model;
mod repository;

pub use model::{Category, Image, NewImage, NewProduct, Product, ProductUpdate};
pub use repository::{ProductRepository, PRODUCT_SHAPE};
