//! Catalog domain types: categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use senmarket_core::{CategoryId, ProductId, format_vnd};

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A category with the number of active products in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub product_count: i64,
}

/// A product as shown in listings and detail pages.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    /// Sale price when set and lower than the list price, otherwise the list
    /// price. Computed by the `effective_price` column.
    pub effective_price: Decimal,
    pub effective_price_formatted: String,
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    /// Mean rating rounded to one decimal, `None` without reviews.
    pub average_rating: Option<Decimal>,
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Formatted price pair for display.
    #[must_use]
    pub fn price_label(&self) -> String {
        format_vnd(self.effective_price)
    }
}

/// Fields an administrator supplies when creating or editing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub category_id: Option<CategoryId>,
    pub name: String,
    /// Generated from `name` when omitted.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock: i32,
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

/// Product listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    Rating,
}

impl ProductSort {
    /// `ORDER BY` clause for this sort. Ties are broken by id for stable paging.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.effective_price ASC, p.id ASC",
            Self::PriceDesc => "p.effective_price DESC, p.id DESC",
            Self::Name => "p.name ASC, p.id ASC",
            Self::Rating => "average_rating DESC NULLS LAST, review_count DESC, p.id DESC",
        }
    }
}

/// Product listing filters.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    /// Admin listings also show hidden products.
    pub include_inactive: bool,
}

/// Turn a display name into a URL slug.
///
/// Vietnamese diacritics are folded to ASCII (`Áo thun` → `ao-thun`).
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        let folded = fold_vietnamese(ch);
        if folded.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(folded);
        } else {
            pending_dash = true;
        }
    }

    slug
}

fn fold_vietnamese(ch: char) -> char {
    match ch {
        'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ' | 'ẩ'
        | 'ẫ' | 'ậ' => 'a',
        'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 'e',
        'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 'i',
        'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ' | 'ở'
        | 'ỡ' | 'ợ' => 'o',
        'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 'u',
        'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
        'đ' => 'd',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_vietnamese() {
        assert_eq!(slugify("Áo thun nam"), "ao-thun-nam");
        assert_eq!(slugify("Điện thoại & Phụ kiện"), "dien-thoai-phu-kien");
        assert_eq!(slugify("  Giày   Thể Thao!! "), "giay-the-thao");
    }

    #[test]
    fn test_slugify_keeps_digits() {
        assert_eq!(slugify("iPhone 15 Pro Max"), "iphone-15-pro-max");
    }

    #[test]
    fn test_price_sorts_use_effective_price_column() {
        for sort in [ProductSort::PriceAsc, ProductSort::PriceDesc] {
            assert!(sort.order_by().starts_with("p.effective_price "));
            assert!(!sort.order_by().contains("sale_price"));
        }
    }

    #[test]
    fn test_sort_deserializes_from_query_value() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap_or_default();
        assert_eq!(sort, ProductSort::PriceDesc);
    }
}
