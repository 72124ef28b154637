//! Catalog business logic - Categories, subcategories, products and their images.
//!
//! The catalog is read-mostly: the cart engine only needs current price, stock and
//! active flag of a product. Lookups that take an id return inactive rows too, so
//! a caller can tell "inactive" apart from "absent"; slug lookups are storefront
//! lookups and only return active rows.

use crate::{
    entities::{
        Category, Product, ProductImage, Subcategory, category, product, product_image,
        subcategory,
    },
    errors::{Error, Result, is_unique_violation},
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// Builds a URL slug: lowercase ASCII alphanumerics joined by single hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn resolve_slug(name: &str, slug: Option<&str>) -> Result<String> {
    let slug = match slug {
        Some(explicit) if !explicit.trim().is_empty() => slugify(explicit),
        _ => slugify(name),
    };
    if slug.is_empty() {
        return Err(Error::validation(format!(
            "Cannot derive a slug from '{name}'"
        )));
    }
    Ok(slug)
}

fn validate_name(kind: &str, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{kind} name cannot be empty")));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Creates a category. The slug is derived from the name when not supplied.
///
/// # Errors
/// Returns `Validation` for an empty name and `AlreadyExists` when the name or
/// slug is taken.
pub async fn create_category(
    db: &DatabaseConnection,
    name: &str,
    slug: Option<&str>,
    sort_order: i32,
) -> Result<category::Model> {
    let name = validate_name("Category", name)?;
    let slug = resolve_slug(&name, slug)?;

    let model = category::ActiveModel {
        name: Set(name),
        slug: Set(slug.clone()),
        is_active: Set(true),
        sort_order: Set(sort_order),
        ..Default::default()
    };
    let category = model.insert(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            Error::AlreadyExists {
                entity: "category",
                key: slug,
            }
        } else {
            e.into()
        }
    })?;
    info!("Created category '{}' ({})", category.name, category.slug);
    Ok(category)
}

/// Finds an active category by slug.
pub async fn get_category_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<Option<category::Model>> {
    Category::find()
        .filter(category::Column::Slug.eq(slug))
        .filter(category::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists active categories in display order.
pub async fn list_active_categories(db: &DatabaseConnection) -> Result<Vec<category::Model>> {
    Category::find()
        .filter(category::Column::IsActive.eq(true))
        .order_by_asc(category::Column::SortOrder)
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Shows or hides a category.
pub async fn set_category_active(
    db: &DatabaseConnection,
    category_id: i64,
    is_active: bool,
) -> Result<category::Model> {
    let mut category: category::ActiveModel = Category::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("category", category_id))?
        .into();
    category.is_active = Set(is_active);
    category.update(db).await.map_err(Into::into)
}

/// One node of the category tree.
#[derive(Debug, Clone)]
pub struct CategoryNode {
    /// The category itself
    pub category: category::Model,
    /// Active subcategories in display order
    pub subcategories: Vec<subcategory::Model>,
    /// Number of products in the category, any state
    pub products_count: u64,
}

/// Builds the full tree of active categories and their active subcategories.
pub async fn category_tree(db: &DatabaseConnection) -> Result<Vec<CategoryNode>> {
    let categories = list_active_categories(db).await?;
    let mut tree = Vec::with_capacity(categories.len());
    for category in categories {
        let subcategories = Subcategory::find()
            .filter(subcategory::Column::CategoryId.eq(category.id))
            .filter(subcategory::Column::IsActive.eq(true))
            .order_by_asc(subcategory::Column::SortOrder)
            .order_by_asc(subcategory::Column::Name)
            .all(db)
            .await?;
        let products_count = Product::find()
            .filter(product::Column::CategoryId.eq(category.id))
            .count(db)
            .await?;
        tree.push(CategoryNode {
            category,
            subcategories,
            products_count,
        });
    }
    Ok(tree)
}

// ---------------------------------------------------------------------------
// Subcategories
// ---------------------------------------------------------------------------

/// Creates a subcategory under an existing category.
pub async fn create_subcategory(
    db: &DatabaseConnection,
    category_id: i64,
    name: &str,
    slug: Option<&str>,
    sort_order: i32,
) -> Result<subcategory::Model> {
    let name = validate_name("Subcategory", name)?;
    let slug = resolve_slug(&name, slug)?;

    Category::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("category", category_id))?;

    let model = subcategory::ActiveModel {
        name: Set(name),
        slug: Set(slug.clone()),
        category_id: Set(category_id),
        is_active: Set(true),
        sort_order: Set(sort_order),
        ..Default::default()
    };
    model.insert(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            Error::AlreadyExists {
                entity: "subcategory",
                key: slug,
            }
        } else {
            e.into()
        }
    })
}

/// Finds an active subcategory by slug.
pub async fn get_subcategory_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<Option<subcategory::Model>> {
    Subcategory::find()
        .filter(subcategory::Column::Slug.eq(slug))
        .filter(subcategory::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists active subcategories, optionally restricted to one active category.
///
/// An unknown or inactive category slug yields an empty list.
pub async fn list_active_subcategories(
    db: &DatabaseConnection,
    category_slug: Option<&str>,
) -> Result<Vec<subcategory::Model>> {
    let mut query = Subcategory::find().filter(subcategory::Column::IsActive.eq(true));
    if let Some(slug) = category_slug {
        let Some(category) = get_category_by_slug(db, slug).await? else {
            return Ok(Vec::new());
        };
        query = query.filter(subcategory::Column::CategoryId.eq(category.id));
    }
    query
        .order_by_asc(subcategory::Column::SortOrder)
        .order_by_asc(subcategory::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Input for [`create_product`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Display name
    pub name: String,
    /// Explicit slug; derived from the name when `None`
    pub slug: Option<String>,
    /// Optional description
    pub description: Option<String>,
    /// Unit price, non-negative
    pub price: Decimal,
    /// Initial stock, non-negative
    pub stock: i32,
    /// Optional unique SKU
    pub sku: Option<String>,
    /// Owning category
    pub category_id: i64,
    /// Optional subcategory, must belong to `category_id`
    pub subcategory_id: Option<i64>,
    /// Highlight on the storefront
    pub is_featured: bool,
}

impl NewProduct {
    /// A product with no description, SKU or subcategory.
    pub fn new(name: impl Into<String>, price: Decimal, stock: i32, category_id: i64) -> Self {
        Self {
            name: name.into(),
            slug: None,
            description: None,
            price,
            stock,
            sku: None,
            category_id,
            subcategory_id: None,
            is_featured: false,
        }
    }
}

/// Creates a product after validating its fields.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or the price or stock is negative
/// - The category or subcategory does not exist, or the subcategory belongs to
///   another category
/// - The slug or SKU is already taken (`AlreadyExists`)
pub async fn create_product(db: &DatabaseConnection, new: NewProduct) -> Result<product::Model> {
    let name = validate_name("Product", &new.name)?;
    if new.price < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Product price cannot be negative: {}",
            new.price
        )));
    }
    if new.stock < 0 {
        return Err(Error::validation(format!(
            "Product stock cannot be negative: {}",
            new.stock
        )));
    }
    let slug = resolve_slug(&name, new.slug.as_deref())?;

    Category::find_by_id(new.category_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("category", new.category_id))?;
    if let Some(subcategory_id) = new.subcategory_id {
        let subcategory = Subcategory::find_by_id(subcategory_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("subcategory", subcategory_id))?;
        if subcategory.category_id != new.category_id {
            return Err(Error::validation(format!(
                "Subcategory '{}' does not belong to category {}",
                subcategory.slug, new.category_id
            )));
        }
    }

    let now = Utc::now();
    let model = product::ActiveModel {
        name: Set(name),
        slug: Set(slug.clone()),
        description: Set(new.description),
        price: Set(new.price.round_dp(2)),
        stock: Set(new.stock),
        sku: Set(new.sku.filter(|sku| !sku.trim().is_empty())),
        category_id: Set(new.category_id),
        subcategory_id: Set(new.subcategory_id),
        is_active: Set(true),
        is_featured: Set(new.is_featured),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let product = model.insert(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            Error::AlreadyExists {
                entity: "product",
                key: slug,
            }
        } else {
            e.into()
        }
    })?;
    info!(
        "Created product '{}' (ID: {}) price {} stock {}",
        product.name, product.id, product.price, product.stock
    );
    Ok(product)
}

/// Retrieves a product by id regardless of its active flag.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an active product by slug.
pub async fn get_active_product_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<Option<product::Model>> {
    Product::find()
        .filter(product::Column::Slug.eq(slug))
        .filter(product::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductOrdering {
    /// Alphabetical
    #[default]
    NameAsc,
    /// Reverse alphabetical
    NameDesc,
    /// Cheapest first
    PriceAsc,
    /// Most expensive first
    PriceDesc,
    /// Oldest first
    CreatedAsc,
    /// Newest first
    CreatedDesc,
}

impl ProductOrdering {
    /// Parses the storefront's `ordering` parameter (`name`, `-price`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "name" => Some(Self::NameAsc),
            "-name" => Some(Self::NameDesc),
            "price" => Some(Self::PriceAsc),
            "-price" => Some(Self::PriceDesc),
            "created_at" => Some(Self::CreatedAsc),
            "-created_at" => Some(Self::CreatedDesc),
            _ => None,
        }
    }
}

/// Filters for [`list_products`]. Only active products are ever listed.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Restrict to a category slug
    pub category_slug: Option<String>,
    /// Restrict to a subcategory slug
    pub subcategory_slug: Option<String>,
    /// Case-insensitive substring of the name
    pub search: Option<String>,
    /// Inclusive lower price bound
    pub min_price: Option<Decimal>,
    /// Inclusive upper price bound
    pub max_price: Option<Decimal>,
    /// Only featured products
    pub featured_only: bool,
    /// Result order
    pub ordering: ProductOrdering,
}

/// Lists active products matching a filter.
///
/// Category and subcategory slugs that match nothing yield an empty list.
pub async fn list_products(
    db: &DatabaseConnection,
    filter: &ProductFilter,
) -> Result<Vec<product::Model>> {
    let mut query = Product::find().filter(product::Column::IsActive.eq(true));

    if let Some(slug) = &filter.category_slug {
        let Some(category) = Category::find()
            .filter(category::Column::Slug.eq(slug.as_str()))
            .one(db)
            .await?
        else {
            return Ok(Vec::new());
        };
        query = query.filter(product::Column::CategoryId.eq(category.id));
    }
    if let Some(slug) = &filter.subcategory_slug {
        let Some(subcategory) = Subcategory::find()
            .filter(subcategory::Column::Slug.eq(slug.as_str()))
            .one(db)
            .await?
        else {
            return Ok(Vec::new());
        };
        query = query.filter(product::Column::SubcategoryId.eq(subcategory.id));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(product::Column::Name.contains(search));
    }
    if let Some(min_price) = filter.min_price {
        query = query.filter(product::Column::Price.gte(min_price));
    }
    if let Some(max_price) = filter.max_price {
        query = query.filter(product::Column::Price.lte(max_price));
    }
    if filter.featured_only {
        query = query.filter(product::Column::IsFeatured.eq(true));
    }

    query = match filter.ordering {
        ProductOrdering::NameAsc => query.order_by_asc(product::Column::Name),
        ProductOrdering::NameDesc => query.order_by_desc(product::Column::Name),
        ProductOrdering::PriceAsc => query.order_by_asc(product::Column::Price),
        ProductOrdering::PriceDesc => query.order_by_desc(product::Column::Price),
        ProductOrdering::CreatedAsc => query.order_by_asc(product::Column::CreatedAt),
        ProductOrdering::CreatedDesc => query.order_by_desc(product::Column::CreatedAt),
    };

    let products = query.order_by_asc(product::Column::Id).all(db).await?;
    debug!("Product listing matched {} rows", products.len());
    Ok(products)
}

/// Active featured products, alphabetically.
pub async fn featured_products(db: &DatabaseConnection) -> Result<Vec<product::Model>> {
    list_products(
        db,
        &ProductFilter {
            featured_only: true,
            ..Default::default()
        },
    )
    .await
}

/// Active products created within the last `days` days, newest first.
pub async fn new_arrivals(db: &DatabaseConnection, days: i64) -> Result<Vec<product::Model>> {
    let since = Utc::now() - Duration::days(days);
    Product::find()
        .filter(product::Column::IsActive.eq(true))
        .filter(product::Column::CreatedAt.gte(since))
        .order_by_desc(product::Column::CreatedAt)
        .order_by_desc(product::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Active products of an active category.
pub async fn products_in_category(
    db: &DatabaseConnection,
    category_slug: &str,
) -> Result<Vec<product::Model>> {
    let category = get_category_by_slug(db, category_slug)
        .await?
        .ok_or_else(|| Error::not_found("category", category_slug))?;
    Product::find()
        .filter(product::Column::CategoryId.eq(category.id))
        .filter(product::Column::IsActive.eq(true))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Active products of an active subcategory.
pub async fn products_in_subcategory(
    db: &DatabaseConnection,
    subcategory_slug: &str,
) -> Result<Vec<product::Model>> {
    let subcategory = get_subcategory_by_slug(db, subcategory_slug)
        .await?
        .ok_or_else(|| Error::not_found("subcategory", subcategory_slug))?;
    Product::find()
        .filter(product::Column::SubcategoryId.eq(subcategory.id))
        .filter(product::Column::IsActive.eq(true))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Replaces a product's stock count.
///
/// Existing cart items are not touched; they are re-validated against the new
/// stock on their next write.
pub async fn update_stock(
    db: &DatabaseConnection,
    product_id: i64,
    stock: i32,
) -> Result<product::Model> {
    if stock < 0 {
        return Err(Error::validation(format!(
            "Product stock cannot be negative: {stock}"
        )));
    }
    let mut product: product::ActiveModel = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?
        .into();
    product.stock = Set(stock);
    product.updated_at = Set(Utc::now());
    let product = product.update(db).await?;
    info!("Stock for product {} set to {}", product.id, product.stock);
    Ok(product)
}

/// Activates or deactivates a product.
pub async fn set_product_active(
    db: &DatabaseConnection,
    product_id: i64,
    is_active: bool,
) -> Result<product::Model> {
    let mut product: product::ActiveModel = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?
        .into();
    product.is_active = Set(is_active);
    product.updated_at = Set(Utc::now());
    product.update(db).await.map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Makes `image_id` the only main image of `product_id`.
///
/// Sibling main images are demoted in the same transaction, so readers never
/// see two main images or none when one was requested.
pub async fn set_main_image(
    db: &DatabaseConnection,
    product_id: i64,
    image_id: i64,
) -> Result<product_image::Model> {
    let txn = db.begin().await?;

    let image = ProductImage::find_by_id(image_id)
        .filter(product_image::Column::ProductId.eq(product_id))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("product image", image_id))?;

    ProductImage::update_many()
        .col_expr(product_image::Column::IsMain, Expr::value(false))
        .filter(product_image::Column::ProductId.eq(product_id))
        .filter(product_image::Column::Id.ne(image_id))
        .exec(&txn)
        .await?;

    let mut image: product_image::ActiveModel = image.into();
    image.is_main = Set(true);
    let image = image.update(&txn).await?;

    txn.commit().await?;
    debug!("Image {} is now main for product {}", image.id, product_id);
    Ok(image)
}

/// Attaches an image to a product. A main image demotes the previous one.
pub async fn add_image(
    db: &DatabaseConnection,
    product_id: i64,
    path: &str,
    is_main: bool,
    sort_order: i32,
) -> Result<product_image::Model> {
    if path.trim().is_empty() {
        return Err(Error::validation("Image path cannot be empty"));
    }
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?;

    let model = product_image::ActiveModel {
        product_id: Set(product_id),
        image: Set(path.trim().to_string()),
        is_main: Set(false),
        sort_order: Set(sort_order),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let image = model.insert(db).await?;
    if is_main {
        return set_main_image(db, product_id, image.id).await;
    }
    Ok(image)
}

/// Attaches several images at once: the first becomes main, order follows the input.
pub async fn add_images(
    db: &DatabaseConnection,
    product_id: i64,
    paths: &[&str],
) -> Result<Vec<product_image::Model>> {
    if paths.is_empty() {
        return Err(Error::validation("At least one image is required"));
    }
    let mut images = Vec::with_capacity(paths.len());
    for (position, path) in paths.iter().enumerate() {
        let sort_order = i32::try_from(position)
            .map_err(|_| Error::validation("Too many images in one upload"))?;
        images.push(add_image(db, product_id, path, position == 0, sort_order).await?);
    }
    Ok(images)
}

/// Images of a product in display order, optionally only the main one.
pub async fn list_images(
    db: &DatabaseConnection,
    product_id: i64,
    main_only: bool,
) -> Result<Vec<product_image::Model>> {
    let mut query = ProductImage::find().filter(product_image::Column::ProductId.eq(product_id));
    if main_only {
        query = query.filter(product_image::Column::IsMain.eq(true));
    }
    query
        .order_by_asc(product_image::Column::SortOrder)
        .order_by_asc(product_image::Column::CreatedAt)
        .order_by_asc(product_image::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The main image of a product, falling back to the first image in display order.
pub async fn main_image(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Option<product_image::Model>> {
    let images = list_images(db, product_id, false).await?;
    let main = images.iter().position(|image| image.is_main);
    Ok(match main {
        Some(position) => images.into_iter().nth(position),
        None => images.into_iter().next(),
    })
}
