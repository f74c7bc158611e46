//! Demo data for local development.
//!
//! Inserts a handful of categories, products and one coupon. Every insert
//! is `ON CONFLICT DO NOTHING` on its unique key, so reruns are harmless.

use sqlx::PgPool;

use super::{CliError, connect};

/// Whole đồng.
type Amount = i64;

/// (name, slug, description)
const CATEGORIES: &[(&str, &str, &str)] = &[
    ("Thời trang", "thoi-trang", "Quần áo và phụ kiện"),
    ("Điện tử", "dien-tu", "Điện thoại, tai nghe và thiết bị thông minh"),
    ("Nhà cửa", "nha-cua", "Đồ gia dụng và trang trí"),
];

/// (category slug, name, slug, price, sale price, stock)
const PRODUCTS: &[(&str, &str, &str, Amount, Option<Amount>, i32)] = &[
    ("thoi-trang", "Áo thun cotton", "ao-thun-cotton", 199_000, Some(159_000), 120),
    ("thoi-trang", "Nón lá Huế", "non-la-hue", 85_000, None, 40),
    ("thoi-trang", "Áo dài lụa", "ao-dai-lua", 850_000, Some(790_000), 12),
    ("dien-tu", "Tai nghe không dây", "tai-nghe-khong-day", 1_290_000, Some(990_000), 30),
    ("dien-tu", "Sạc dự phòng 10000mAh", "sac-du-phong-10000mah", 450_000, None, 55),
    ("nha-cua", "Bình gốm Bát Tràng", "binh-gom-bat-trang", 320_000, None, 18),
    ("nha-cua", "Đèn lồng Hội An", "den-long-hoi-an", 150_000, Some(120_000), 60),
];

/// Insert demo data.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    let categories = seed_categories(&pool).await?;
    let products = seed_products(&pool).await?;
    let coupons = seed_coupon(&pool).await?;

    tracing::info!("Seeding complete!");
    tracing::info!("  Categories inserted: {categories}");
    tracing::info!("  Products inserted: {products}");
    tracing::info!("  Coupons inserted: {coupons}");
    Ok(())
}

async fn seed_categories(pool: &PgPool) -> Result<u64, CliError> {
    let mut inserted = 0;
    for (name, slug, description) in CATEGORIES {
        inserted += sqlx::query(
            "INSERT INTO shop.category (name, slug, description) VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO NOTHING",
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .execute(pool)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

async fn seed_products(pool: &PgPool) -> Result<u64, CliError> {
    let mut inserted = 0;
    for (category, name, slug, price, sale_price, stock) in PRODUCTS {
        inserted += sqlx::query(
            r"
            INSERT INTO shop.product (category_id, name, slug, description, price, sale_price, stock)
            SELECT c.id, $2, $3, $4, $5::numeric, $6::numeric, $7
            FROM shop.category c WHERE c.slug = $1
            ON CONFLICT (slug) DO NOTHING
            ",
        )
        .bind(category)
        .bind(name)
        .bind(slug)
        .bind(format!("{name} - hàng mẫu để thử giao diện"))
        .bind(price)
        .bind(sale_price)
        .bind(stock)
        .execute(pool)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

/// `GIAM10`: 10% off orders from 200.000 ₫, capped at 50.000 ₫, 100 uses.
async fn seed_coupon(pool: &PgPool) -> Result<u64, CliError> {
    let result = sqlx::query(
        r"
        INSERT INTO shop.coupon (code, kind, value, max_discount, min_order_amount, usage_limit)
        VALUES ('GIAM10', 'percentage', 10, 50000, 200000, 100)
        ON CONFLICT (code) DO NOTHING
        ",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_products_reference_seeded_categories() {
        for (category, ..) in PRODUCTS {
            assert!(CATEGORIES.iter().any(|(_, slug, _)| slug == category), "{category}");
        }
    }

    #[test]
    fn test_sale_prices_are_discounts() {
        for (_, name, _, price, sale_price, stock) in PRODUCTS {
            assert!(sale_price.is_none_or(|sale| sale < *price), "{name}");
            assert!(*stock >= 0);
        }
    }
}
